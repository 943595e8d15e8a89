//! Configuration for the capture bridge.
//!
//! Loads configuration from a TOML file: the channel list and triggers
//! for the capture, the consumer endpoint and send-unit bound for the
//! stream, poll timing, and backend selection.

use crate::capture::TriggerSpec;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub stream: StreamConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Capture configuration: what to record and when to start/stop
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Ordered list of channel variable paths; this order is the record
    /// layout on the wire
    pub channels: Vec<String>,
    /// Keep every Nth raw sample (1 = keep everything)
    #[serde(default = "default_downsampling")]
    pub downsampling: u32,
    /// Watcher that flips the capture from armed to running
    pub start_trigger: TriggerSpec,
    /// Watcher that finishes the capture
    pub stop_trigger: TriggerSpec,
}

/// Outbound stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Consumer address, e.g. "192.0.2.10:1030"
    pub remote_address: String,
    /// Maximum bytes per socket write; fits within a 1 KiB send buffer
    /// at the default
    #[serde(default = "default_max_unit")]
    pub max_unit: usize,
    /// TCP connect timeout in milliseconds (0 = OS default blocking
    /// connect)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl StreamConfig {
    /// Connect timeout as a `Duration`, `None` when disabled
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Poll-loop timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// State poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// How long the capture may stay idle before arming
    #[serde(default = "default_armed_timeout_ms")]
    pub armed_timeout_ms: u64,
    /// How long the start trigger may take to fire once armed
    #[serde(default = "default_running_timeout_ms")]
    pub running_timeout_ms: u64,
    /// Upper bound on the whole running phase (0 = unbounded; the stop
    /// trigger decides)
    #[serde(default)]
    pub finished_timeout_ms: u64,
}

impl PollConfig {
    /// Poll interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Armed-wait deadline
    pub fn armed_timeout(&self) -> Duration {
        Duration::from_millis(self.armed_timeout_ms)
    }

    /// Running-wait deadline
    pub fn running_timeout(&self) -> Duration {
        Duration::from_millis(self.running_timeout_ms)
    }

    /// Running-phase bound, `None` when unbounded
    pub fn finished_timeout(&self) -> Option<Duration> {
        match self.finished_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            armed_timeout_ms: default_armed_timeout_ms(),
            running_timeout_ms: default_running_timeout_ms(),
            finished_timeout_ms: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log output (stdout or stderr)
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stderr".to_string(),
        }
    }
}

/// Capture backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend type ("sim" or "replay")
    pub kind: String,
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: "sim".to_string(),
            sim: SimConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

/// Simulated backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    /// Raw sample production rate
    pub sample_rate_hz: f64,
    /// Seconds between arming and the simulated start trigger
    pub trigger_delay_s: f64,
    /// Seconds of running capture before the simulated stop trigger
    pub capture_duration_s: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10_000.0,
            trigger_delay_s: 0.5,
            capture_duration_s: 5.0,
        }
    }
}

/// Replay backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Path to a wire-format recording
    pub path: String,
    /// Rows handed out per incremental fetch
    pub batch_samples: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: "capture.raw".to_string(),
            batch_samples: 256,
        }
    }
}

fn default_downsampling() -> u32 {
    1
}

fn default_max_unit() -> usize {
    988
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_interval_ms() -> u64 {
    20
}

fn default_armed_timeout_ms() -> u64 {
    10_000
}

fn default_running_timeout_ms() -> u64 {
    30_000
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration shaped after a PMSM current-control bench:
    /// d/q currents plus trajectory bookkeeping, manual trigger variable,
    /// consumer on port 1030.
    ///
    /// Suitable for development against the simulated backend. Production
    /// runs should use a proper TOML configuration file.
    pub fn bench_defaults() -> Self {
        let mut defines = std::collections::HashMap::new();
        defines.insert(
            "CaptureTrigger".to_string(),
            "bench/trajectory/manual_trigger".to_string(),
        );

        Self {
            capture: CaptureConfig {
                channels: vec![
                    "bench/I_dq/I_d".to_string(),
                    "bench/I_dq/I_q".to_string(),
                    "bench/trajectory/idx".to_string(),
                    "bench/trajectory/reset".to_string(),
                ],
                downsampling: 1,
                start_trigger: TriggerSpec {
                    condition: "posedge(CaptureTrigger,0.5)".to_string(),
                    defines: defines.clone(),
                    delay_s: 0.0,
                },
                stop_trigger: TriggerSpec {
                    condition: "negedge(CaptureTrigger,0.5)".to_string(),
                    defines,
                    delay_s: 0.0,
                },
            },
            stream: StreamConfig {
                remote_address: "127.0.0.1:1030".to_string(),
                max_unit: default_max_unit(),
                connect_timeout_ms: default_connect_timeout_ms(),
            },
            poll: PollConfig::default(),
            logging: LoggingConfig::default(),
            backend: BackendConfig::default(),
        }
    }

    /// Reject configurations the session cannot run with.
    ///
    /// Called by the bootstrap before any resource is acquired.
    pub fn validate(&self) -> Result<()> {
        if self.capture.channels.is_empty() {
            return Err(Error::Config("capture.channels is empty".into()));
        }
        if self.capture.downsampling == 0 {
            return Err(Error::Config("capture.downsampling must be >= 1".into()));
        }
        if self.stream.max_unit == 0 {
            return Err(Error::Config("stream.max_unit must be >= 1".into()));
        }
        if self.poll.interval_ms == 0 {
            // Zero would busy-spin against the platform's state register
            return Err(Error::Config("poll.interval_ms must be >= 1".into()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::bench_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::bench_defaults();
        assert_eq!(config.capture.channels.len(), 4);
        assert_eq!(config.capture.downsampling, 1);
        assert_eq!(config.stream.remote_address, "127.0.0.1:1030");
        assert_eq!(config.stream.max_unit, 988);
        assert_eq!(config.poll.interval_ms, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::bench_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[capture.start_trigger]"));
        assert!(toml_string.contains("[stream]"));
        assert!(toml_string.contains("[poll]"));
        assert!(toml_string.contains("max_unit = 988"));
        assert!(toml_string.contains("posedge(CaptureTrigger,0.5)"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[capture]
channels = ["bench/I_dq/I_d", "bench/I_dq/I_q"]
downsampling = 20

[capture.start_trigger]
condition = "posedge(Trig,0.5)"
defines = { Trig = "bench/start" }

[capture.stop_trigger]
condition = "negedge(Trig,0.5)"
defines = { Trig = "bench/start" }

[stream]
remote_address = "192.0.2.7:1030"

[poll]
interval_ms = 5

[backend]
kind = "replay"

[backend.replay]
path = "runs/last.raw"
batch_samples = 128
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.capture.channels.len(), 2);
        assert_eq!(config.capture.downsampling, 20);
        assert_eq!(config.stream.max_unit, 988); // default
        assert_eq!(config.poll.interval_ms, 5);
        assert_eq!(config.poll.armed_timeout_ms, 10_000); // default
        assert_eq!(config.backend.kind, "replay");
        assert_eq!(config.backend.replay.batch_samples, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::bench_defaults();
        config.capture.channels.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::bench_defaults();
        config.stream.max_unit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::bench_defaults();
        config.poll.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_accessors() {
        let mut config = AppConfig::bench_defaults();
        assert_eq!(config.poll.finished_timeout(), None);
        config.poll.finished_timeout_ms = 1_500;
        assert_eq!(
            config.poll.finished_timeout(),
            Some(Duration::from_millis(1_500))
        );
        config.stream.connect_timeout_ms = 0;
        assert_eq!(config.stream.connect_timeout(), None);
    }
}
