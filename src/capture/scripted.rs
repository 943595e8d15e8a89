//! Scripted capture backend for unit testing.
//!
//! Plays back a queued sequence of states and fetch results, and records
//! every call made against it, so poll-loop tests can assert exact
//! interaction sequences without timing dependence.

use crate::capture::{CaptureBackend, CaptureState, FetchBatch, TriggerSpec};
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted capture backend
///
/// Clones share the same script and call record, so a test can keep one
/// handle while the session owns the other.
#[derive(Clone)]
pub struct ScriptedBackend {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    states: VecDeque<CaptureState>,
    /// Last state handed out; repeated once the script runs dry
    last_state: CaptureState,
    fetches: VecDeque<Result<FetchBatch>>,
    state_polls: usize,
    /// Flush flag of each fetch call, in order
    fetch_flags: Vec<bool>,
    configured: Option<(Vec<String>, u32)>,
    start_trigger: Option<TriggerSpec>,
    stop_trigger: Option<TriggerSpec>,
    start_calls: usize,
    dispose_calls: usize,
}

impl ScriptedBackend {
    /// Create a backend with an empty script
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                states: VecDeque::new(),
                last_state: CaptureState::Idle,
                fetches: VecDeque::new(),
                state_polls: 0,
                fetch_flags: Vec::new(),
                configured: None,
                start_trigger: None,
                stop_trigger: None,
                start_calls: 0,
                dispose_calls: 0,
            })),
        }
    }

    /// Queue states to report, one per `state()` call. The last queued
    /// state repeats once the queue is exhausted.
    pub fn push_states(&self, states: &[CaptureState]) {
        let mut inner = self.inner.lock().unwrap();
        inner.states.extend(states.iter().copied());
    }

    /// Queue a successful fetch result
    pub fn push_batch(&self, batch: FetchBatch) {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push_back(Ok(batch));
    }

    /// Queue a failing fetch
    pub fn push_fetch_error(&self, err: crate::error::Error) {
        let mut inner = self.inner.lock().unwrap();
        inner.fetches.push_back(Err(err));
    }

    /// Number of `dispose()` calls so far
    pub fn dispose_calls(&self) -> usize {
        self.inner.lock().unwrap().dispose_calls
    }

    /// Number of `start()` calls so far
    pub fn start_calls(&self) -> usize {
        self.inner.lock().unwrap().start_calls
    }

    /// Number of `state()` polls so far
    pub fn state_polls(&self) -> usize {
        self.inner.lock().unwrap().state_polls
    }

    /// Flush flags of all fetch calls, in call order
    pub fn fetch_flags(&self) -> Vec<bool> {
        self.inner.lock().unwrap().fetch_flags.clone()
    }

    /// Channel list and downsampling passed to `configure`, if any
    pub fn configured(&self) -> Option<(Vec<String>, u32)> {
        self.inner.lock().unwrap().configured.clone()
    }

    /// Installed start trigger, if any
    pub fn start_trigger(&self) -> Option<TriggerSpec> {
        self.inner.lock().unwrap().start_trigger.clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for ScriptedBackend {
    fn configure(&mut self, channels: &[String], downsampling: u32) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.configured = Some((channels.to_vec(), downsampling));
        Ok(())
    }

    fn set_start_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
        self.inner.lock().unwrap().start_trigger = Some(trigger.clone());
        Ok(())
    }

    fn set_stop_trigger(&mut self, trigger: &TriggerSpec) -> Result<()> {
        self.inner.lock().unwrap().stop_trigger = Some(trigger.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.inner.lock().unwrap().start_calls += 1;
        Ok(())
    }

    fn state(&mut self) -> Result<CaptureState> {
        let mut inner = self.inner.lock().unwrap();
        inner.state_polls += 1;
        if let Some(state) = inner.states.pop_front() {
            inner.last_state = state;
        }
        Ok(inner.last_state)
    }

    fn fetch(&mut self, flush: bool) -> Result<FetchBatch> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_flags.push(flush);
        inner
            .fetches
            .pop_front()
            .unwrap_or_else(|| Ok(FetchBatch::new()))
    }

    fn dispose(&mut self) -> Result<()> {
        self.inner.lock().unwrap().dispose_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_stick_after_script_ends() {
        let mut backend = ScriptedBackend::new();
        backend.push_states(&[CaptureState::Armed, CaptureState::Finished]);

        assert_eq!(backend.state().unwrap(), CaptureState::Armed);
        assert_eq!(backend.state().unwrap(), CaptureState::Finished);
        assert_eq!(backend.state().unwrap(), CaptureState::Finished);
        assert_eq!(backend.state_polls(), 3);
    }

    #[test]
    fn test_fetch_records_flush_flags() {
        let mut backend = ScriptedBackend::new();
        let mut batch = FetchBatch::new();
        batch.insert("ch", vec![1.0]);
        backend.push_batch(batch);

        assert!(!backend.fetch(false).unwrap().is_empty());
        assert!(backend.fetch(true).unwrap().is_empty());
        assert_eq!(backend.fetch_flags(), vec![false, true]);
    }
}
