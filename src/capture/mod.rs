//! Capture backend abstraction.
//!
//! The bridge never talks to platform hardware directly. Trigger
//! installation, lifecycle state, and the incremental fetch all go
//! through the [`CaptureBackend`] trait, so alternate backends
//! (simulated, file replay, other vendors) substitute without touching
//! the poll loop.
//!
//! Key types for backend implementers:
//! - [`CaptureState`]: externally driven lifecycle, observed by polling
//! - [`FetchBatch`]: per-channel samples accumulated since the last fetch
//! - [`TriggerSpec`]: condition string + variable bindings + delay

pub mod replay;
pub mod scripted;
pub mod sim;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Capture lifecycle state as reported by the platform.
///
/// Transitions are driven on the platform side (trigger watchers); the
/// bridge only observes them by polling. The derived ordering follows
/// the lifecycle: `Idle < Armed < Running < Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaptureState {
    /// Created but not yet armed
    Idle,
    /// Waiting for the start trigger to fire
    Armed,
    /// Acquiring samples
    Running,
    /// Stop trigger fired, residual samples may remain
    Finished,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Idle => "idle",
            CaptureState::Armed => "armed",
            CaptureState::Running => "running",
            CaptureState::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Start/stop trigger watcher specification.
///
/// The condition is an opaque expression over symbols (e.g.
/// `posedge(CaptureTrigger,0.5)`); `defines` binds each symbol to a
/// platform variable path. The delay shifts the effective trigger point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerSpec {
    /// Trigger condition expression
    pub condition: String,
    /// Trigger delay in seconds (negative = pre-trigger)
    #[serde(default)]
    pub delay_s: f64,
    /// Symbol -> platform variable path bindings
    ///
    /// Declared last so TOML serialization emits the scalar fields
    /// before this sub-table.
    #[serde(default)]
    pub defines: HashMap<String, String>,
}

/// Incremental fetch result: for each channel, the samples newly observed
/// since the previous fetch.
///
/// All channels of one batch are supposed to hold the same number of
/// samples (one per elapsed tick). That is a platform promise the
/// extractor validates rather than trusts.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    values: HashMap<String, Vec<f64>>,
}

impl FetchBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the new-sample vector for a channel
    pub fn insert(&mut self, channel: impl Into<String>, samples: Vec<f64>) {
        self.values.insert(channel.into(), samples);
    }

    /// Samples for one channel, if present
    pub fn channel(&self, id: &str) -> Option<&[f64]> {
        self.values.get(id).map(Vec::as_slice)
    }

    /// True if no channel carries any new sample
    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }

    /// Number of channels present in this batch
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }
}

/// Capture control interface consumed by the bridge.
///
/// Mirrors the platform surface: variable-list configuration, trigger
/// installation, start, state polling, incremental fetch, disposal.
/// Implementations report platform faults as
/// [`Error::VendorProtocol`](crate::error::Error::VendorProtocol).
pub trait CaptureBackend: Send {
    /// Set the ordered channel list and downsampling factor.
    ///
    /// Must be called before `start`. Only every `downsampling`-th raw
    /// sample is retained (factor 1 keeps everything).
    fn configure(&mut self, channels: &[String], downsampling: u32) -> Result<()>;

    /// Install the start trigger watcher
    fn set_start_trigger(&mut self, trigger: &TriggerSpec) -> Result<()>;

    /// Install the stop trigger watcher
    fn set_stop_trigger(&mut self, trigger: &TriggerSpec) -> Result<()>;

    /// Arm the capture. The transition to `Running` is driven by the
    /// start trigger, not by this call.
    fn start(&mut self) -> Result<()>;

    /// Current lifecycle state
    fn state(&mut self) -> Result<CaptureState>;

    /// Fetch samples accumulated since the previous fetch.
    ///
    /// With `flush` set the platform also hands over any samples still
    /// buffered on its side (used for the final drain).
    fn fetch(&mut self, flush: bool) -> Result<FetchBatch>;

    /// Release platform resources. Must be idempotent: the bridge calls
    /// this on every exit path and a second call must be a no-op.
    fn dispose(&mut self) -> Result<()>;
}

/// Create a capture backend based on configuration
pub fn create_backend(config: &AppConfig) -> Result<Box<dyn CaptureBackend>> {
    match config.backend.kind.as_str() {
        "sim" => Ok(Box::new(sim::SimBackend::new(config.backend.sim.clone()))),
        "replay" => {
            let replay = replay::ReplayBackend::open(
                &config.backend.replay.path,
                config.capture.channels.len(),
                config.backend.replay.batch_samples,
            )?;
            Ok(Box::new(replay))
        }
        other => Err(Error::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_empty() {
        let mut batch = FetchBatch::new();
        assert!(batch.is_empty());

        batch.insert("a", vec![]);
        assert!(batch.is_empty());

        batch.insert("b", vec![1.0]);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_batch_channel_lookup() {
        let mut batch = FetchBatch::new();
        batch.insert("bench/I_dq/I_d", vec![0.5, 0.6]);

        assert_eq!(batch.channel("bench/I_dq/I_d"), Some(&[0.5, 0.6][..]));
        assert_eq!(batch.channel("bench/I_dq/I_q"), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CaptureState::Armed.to_string(), "armed");
        assert_eq!(CaptureState::Finished.to_string(), "finished");
    }
}
