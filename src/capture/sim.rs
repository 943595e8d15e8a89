//! Simulated capture backend.
//!
//! Generates deterministic waveforms for the configured channels so the
//! whole bridge can run without a testbench attached. Timing is driven by
//! wall-clock: arming happens at `start()`, the start trigger fires after
//! `trigger_delay_s`, and the capture finishes `capture_duration_s`
//! later. Channel `c` carries `sin(2π·f·t + c·π/2)` so adjacent channels
//! are phase-shifted copies (the d/q current pair of a motor bench looks
//! exactly like this).

use crate::capture::{CaptureBackend, CaptureState, FetchBatch, TriggerSpec};
use crate::config::SimConfig;
use crate::error::{Error, Result};
use std::f64::consts::FRAC_PI_2;
use std::f64::consts::TAU;
use std::time::Instant;

/// Vendor code: operation on a disposed capture
const FAULT_DISPOSED: i32 = 101;
/// Vendor code: fetch/start before configuration completed
const FAULT_NOT_READY: i32 = 102;
/// Vendor code: reconfiguration while the capture is armed
const FAULT_ACTIVE: i32 = 103;

/// Frequency of the generated waveforms
const SIGNAL_HZ: f64 = 50.0;

/// Simulated capture session
pub struct SimBackend {
    config: SimConfig,
    channels: Vec<String>,
    downsampling: u32,
    start_trigger: Option<TriggerSpec>,
    stop_trigger: Option<TriggerSpec>,
    armed_at: Option<Instant>,
    /// Extra delay from the start trigger spec, on top of the simulated
    /// trigger condition delay
    trigger_delay_s: f64,
    /// Retained samples already handed out by previous fetches
    delivered: u64,
    disposed: bool,
}

impl SimBackend {
    /// Create a simulated capture from its configuration
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            channels: Vec::new(),
            downsampling: 1,
            start_trigger: None,
            stop_trigger: None,
            armed_at: None,
            trigger_delay_s: 0.0,
            delivered: 0,
            disposed: false,
        }
    }

    fn check_live(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::vendor(FAULT_DISPOSED, "capture already disposed"));
        }
        Ok(())
    }

    /// Seconds from arming until the start trigger fires
    fn run_after_s(&self) -> f64 {
        (self.config.trigger_delay_s + self.trigger_delay_s).max(0.0)
    }

    /// Seconds the capture has spent in `Running`, saturating at the
    /// configured duration
    fn running_elapsed_s(&self, armed_at: Instant) -> f64 {
        let elapsed = armed_at.elapsed().as_secs_f64() - self.run_after_s();
        elapsed.clamp(0.0, self.config.capture_duration_s)
    }

    /// Waveform value for one retained sample of one channel
    fn sample_value(&self, channel_idx: usize, retained_idx: u64) -> f64 {
        let raw_idx = retained_idx * u64::from(self.downsampling);
        let t = raw_idx as f64 / self.config.sample_rate_hz;
        (TAU * SIGNAL_HZ * t + channel_idx as f64 * FRAC_PI_2).sin()
    }
}

impl CaptureBackend for SimBackend {
    fn configure(&mut self, channels: &[String], downsampling: u32) -> Result<()> {
        self.check_live()?;
        if self.armed_at.is_some() {
            return Err(Error::vendor(FAULT_ACTIVE, "configure while capture armed"));
        }
        if channels.is_empty() {
            return Err(Error::InvalidParameter("channel list is empty".into()));
        }
        if downsampling == 0 {
            return Err(Error::InvalidParameter("downsampling must be >= 1".into()));
        }
        self.channels = channels.to_vec();
        self.downsampling = downsampling;
        Ok(())
    }

    fn set_start_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
        self.check_live()?;
        self.trigger_delay_s = trigger.delay_s;
        self.start_trigger = Some(trigger.clone());
        Ok(())
    }

    fn set_stop_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
        self.check_live()?;
        self.stop_trigger = Some(trigger.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.check_live()?;
        if self.channels.is_empty() {
            return Err(Error::vendor(FAULT_NOT_READY, "start before configure"));
        }
        if self.start_trigger.is_none() || self.stop_trigger.is_none() {
            return Err(Error::vendor(FAULT_NOT_READY, "start before triggers installed"));
        }
        self.armed_at = Some(Instant::now());
        self.delivered = 0;
        Ok(())
    }

    fn state(&mut self) -> Result<CaptureState> {
        self.check_live()?;
        let Some(armed_at) = self.armed_at else {
            return Ok(CaptureState::Idle);
        };
        let elapsed = armed_at.elapsed().as_secs_f64();
        if elapsed < self.run_after_s() {
            Ok(CaptureState::Armed)
        } else if elapsed < self.run_after_s() + self.config.capture_duration_s {
            Ok(CaptureState::Running)
        } else {
            Ok(CaptureState::Finished)
        }
    }

    fn fetch(&mut self, _flush: bool) -> Result<FetchBatch> {
        // The simulator never buffers on its side, so `flush` changes
        // nothing: every fetch drains everything produced so far.
        self.check_live()?;
        let Some(armed_at) = self.armed_at else {
            return Err(Error::vendor(FAULT_NOT_READY, "fetch before start"));
        };

        let raw_available = (self.running_elapsed_s(armed_at) * self.config.sample_rate_hz) as u64;
        let retained = raw_available / u64::from(self.downsampling);
        let fresh = retained.saturating_sub(self.delivered);

        let mut batch = FetchBatch::new();
        for (ch_idx, channel) in self.channels.iter().enumerate() {
            let samples: Vec<f64> = (0..fresh)
                .map(|k| self.sample_value(ch_idx, self.delivered + k))
                .collect();
            batch.insert(channel.clone(), samples);
        }
        self.delivered = retained;
        Ok(batch)
    }

    fn dispose(&mut self) -> Result<()> {
        self.disposed = true;
        Ok(())
    }
}
