//! Session ownership and bootstrap.
//!
//! One [`Session`] owns everything a run needs: the capture backend and
//! the outbound endpoint, plus the transmitter and poll settings. There
//! is no process-wide socket or scratch buffer; when the session ends,
//! so do its resources.
//!
//! Teardown is the invariant this module guards: backend disposal and
//! endpoint shutdown run on every exit path, each attempted even if the
//! other fails, at most once, with a `Drop` backstop for panics.

mod driver;

pub use driver::SessionStats;

use crate::capture::CaptureBackend;
use crate::config::{AppConfig, PollConfig};
use crate::error::Result;
use crate::streaming::Transmitter;
use crate::transport::{StreamEndpoint, TcpEndpoint};

/// One live bridge session: exclusive owner of a capture backend and a
/// stream endpoint for its whole duration
pub struct Session {
    backend: Box<dyn CaptureBackend>,
    endpoint: Box<dyn StreamEndpoint>,
    channels: Vec<String>,
    transmitter: Transmitter,
    poll: PollConfig,
    torn_down: bool,
}

impl Session {
    /// Assemble a session from already-acquired parts.
    ///
    /// Used directly by tests with scripted backends and mock endpoints;
    /// production code goes through [`bootstrap`].
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        endpoint: Box<dyn StreamEndpoint>,
        channels: Vec<String>,
        transmitter: Transmitter,
        poll: PollConfig,
    ) -> Self {
        Self {
            backend,
            endpoint,
            channels,
            transmitter,
            poll,
            torn_down: false,
        }
    }

    /// Release both resources.
    ///
    /// Idempotent; later calls are no-ops. Disposal and shutdown are
    /// attempted independently so a failure in one cannot leak the
    /// other, and failures are logged rather than propagated; at
    /// teardown time there is nobody left to retry.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Err(e) = self.backend.dispose() {
            log::warn!("Capture disposal failed: {}", e);
        }
        if let Err(e) = self.endpoint.shutdown() {
            log::warn!("Endpoint shutdown failed: {}", e);
        }
        log::debug!("Session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Prepare a session from configuration: validate, configure the
/// capture's variable list and downsampling, install trigger watchers,
/// connect the consumer endpoint, and arm the capture.
///
/// On any failure the backend is disposed (and the endpoint, if already
/// connected, shut down) before the error propagates. A failed
/// bootstrap leaks nothing.
pub fn bootstrap(config: &AppConfig, mut backend: Box<dyn CaptureBackend>) -> Result<Session> {
    let prepared = (|| -> Result<(Transmitter, TcpEndpoint)> {
        config.validate()?;
        let transmitter = Transmitter::new(config.stream.max_unit)?;

        log::info!(
            "Configuring capture: {} channels, downsampling {}",
            config.capture.channels.len(),
            config.capture.downsampling
        );
        backend.configure(&config.capture.channels, config.capture.downsampling)?;
        backend.set_start_trigger(&config.capture.start_trigger)?;
        backend.set_stop_trigger(&config.capture.stop_trigger)?;

        let mut endpoint = TcpEndpoint::connect(
            &config.stream.remote_address,
            config.stream.connect_timeout(),
        )?;

        log::info!("Arming capture");
        if let Err(e) = backend.start() {
            if let Err(s) = endpoint.shutdown() {
                log::warn!("Endpoint shutdown after failed start: {}", s);
            }
            return Err(e);
        }

        Ok((transmitter, endpoint))
    })();

    match prepared {
        Ok((transmitter, endpoint)) => Ok(Session::new(
            backend,
            Box::new(endpoint),
            config.capture.channels.clone(),
            transmitter,
            config.poll.clone(),
        )),
        Err(e) => {
            if let Err(d) = backend.dispose() {
                log::warn!("Capture disposal after failed bootstrap: {}", d);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::scripted::ScriptedBackend;

    #[test]
    fn test_bootstrap_disposes_backend_on_invalid_config() {
        let backend = ScriptedBackend::new();
        let handle = backend.clone();

        let mut config = AppConfig::bench_defaults();
        config.capture.channels.clear();

        assert!(bootstrap(&config, Box::new(backend)).is_err());
        assert_eq!(handle.dispose_calls(), 1);
        assert_eq!(handle.start_calls(), 0);
    }

    #[test]
    fn test_bootstrap_disposes_backend_on_connect_failure() {
        let backend = ScriptedBackend::new();
        let handle = backend.clone();

        let mut config = AppConfig::bench_defaults();
        // Bind-then-drop to get a port nothing listens on
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        config.stream.remote_address = format!("127.0.0.1:{}", port);
        config.stream.connect_timeout_ms = 200;

        assert!(bootstrap(&config, Box::new(backend)).is_err());
        // Configuration happened, the capture was never armed, and the
        // backend was released
        assert!(handle.configured().is_some());
        assert_eq!(handle.start_calls(), 0);
        assert_eq!(handle.dispose_calls(), 1);
    }

    #[test]
    fn test_bootstrap_installs_triggers_and_arms() {
        let backend = ScriptedBackend::new();
        let handle = backend.clone();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = AppConfig::bench_defaults();
        config.stream.remote_address = listener.local_addr().unwrap().to_string();

        let session = bootstrap(&config, Box::new(backend)).unwrap();
        assert_eq!(handle.start_calls(), 1);
        let (channels, downsampling) = handle.configured().unwrap();
        assert_eq!(channels, config.capture.channels);
        assert_eq!(downsampling, 1);
        assert_eq!(
            handle.start_trigger().unwrap().condition,
            "posedge(CaptureTrigger,0.5)"
        );

        drop(session);
        assert_eq!(handle.dispose_calls(), 1);
    }
}
