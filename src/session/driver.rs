//! Capture poll loop and state machine driver.
//!
//! Three stages, all observed by polling the backend on the configured
//! interval: wait for the capture to arm, wait for the start trigger to
//! fire, then fetch-until-finished. Each `Running` observation pairs
//! with exactly one incremental fetch, and every non-empty batch flows
//! through extract, encode, and transmit before the next poll. There is
//! no queue between fetch and send, so transmission latency adds
//! directly to the polling period. Backpressure from a stalled consumer
//! blocks the socket write; the platform's own capture buffering absorbs
//! the backlog up to its capacity.
//!
//! Nothing is retried: a fetch or transmit failure is fatal to the
//! session and propagates after teardown.

use super::Session;
use crate::capture::{CaptureState, FetchBatch};
use crate::error::{Error, Result};
use crate::streaming;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Fetch calls issued (including the final drain)
    pub fetches: u64,
    /// Non-empty batches transmitted
    pub batches: u64,
    /// Samples (rows) transmitted
    pub samples: u64,
    /// Payload bytes accepted by the transport
    pub bytes: u64,
    /// Bounded writes issued
    pub chunks: u64,
    /// True if the run ended on the cancellation token
    pub cancelled: bool,
}

/// Outcome of one state wait
enum Wait {
    Reached(CaptureState),
    Cancelled,
}

impl Session {
    /// Drive the capture to completion, streaming every fetched batch.
    ///
    /// `cancel` is the cooperative cancellation token (typically set by
    /// the Ctrl-C handler); a cancelled run takes the same teardown path
    /// as a fatal error and returns its stats with `cancelled` set.
    ///
    /// Teardown is unconditional: whatever happens inside the loop, the
    /// backend is disposed and the endpoint shut down exactly once
    /// before this returns.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<SessionStats> {
        let result = self.run_inner(cancel);
        self.teardown();

        match result {
            Ok(mut stats) => {
                stats.bytes = self.transmitter.bytes_sent();
                stats.chunks = self.transmitter.chunks_sent();
                if stats.cancelled {
                    log::info!("Session cancelled by shutdown request");
                }
                log::info!(
                    "Session done: {} fetches, {} batches, {} samples, {} bytes in {} chunks",
                    stats.fetches,
                    stats.batches,
                    stats.samples,
                    stats.bytes,
                    stats.chunks
                );
                Ok(stats)
            }
            Err(e) => {
                log::error!("Session aborted: {}", e);
                Err(e)
            }
        }
    }

    fn run_inner(&mut self, cancel: &AtomicBool) -> Result<SessionStats> {
        let mut stats = SessionStats::default();

        log::info!("Waiting for capture to arm...");
        match self.wait_for(CaptureState::Armed, cancel)? {
            Wait::Cancelled => {
                stats.cancelled = true;
                return Ok(stats);
            }
            Wait::Reached(_) => {}
        }

        log::info!("Waiting for start trigger...");
        let mut state = match self.wait_for(CaptureState::Running, cancel)? {
            Wait::Cancelled => {
                stats.cancelled = true;
                return Ok(stats);
            }
            Wait::Reached(state) => state,
        };

        log::info!("Capture running, streaming to consumer");
        let running_since = Instant::now();
        loop {
            if state == CaptureState::Finished {
                // One flushing fetch drains whatever the platform still
                // buffers past the stop trigger
                let residual = self.backend.fetch(true)?;
                stats.fetches += 1;
                self.pipe(&residual, &mut stats)?;
                log::debug!("Capture finished, residual batch drained");
                break;
            }

            let batch = self.backend.fetch(false)?;
            stats.fetches += 1;
            self.pipe(&batch, &mut stats)?;

            if cancel.load(Ordering::Relaxed) {
                stats.cancelled = true;
                break;
            }
            if let Some(limit) = self.poll.finished_timeout() {
                if running_since.elapsed() >= limit {
                    return Err(Error::StateTimeout {
                        state: CaptureState::Finished,
                        waited_ms: running_since.elapsed().as_millis() as u64,
                    });
                }
            }

            thread::sleep(self.poll.interval());
            state = self.backend.state()?;
        }

        Ok(stats)
    }

    /// Poll until the lifecycle reaches `target`, or anything past it
    /// (a short capture can overtake the poller between two looks).
    fn wait_for(&mut self, target: CaptureState, cancel: &AtomicBool) -> Result<Wait> {
        let timeout = match target {
            CaptureState::Armed => self.poll.armed_timeout(),
            _ => self.poll.running_timeout(),
        };
        let started = Instant::now();

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Ok(Wait::Cancelled);
            }

            let state = self.backend.state()?;
            if state >= target {
                log::debug!("Capture state: {}", state);
                return Ok(Wait::Reached(state));
            }

            if started.elapsed() >= timeout {
                return Err(Error::StateTimeout {
                    state: target,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            thread::sleep(self.poll.interval());
        }
    }

    /// Extract → encode → transmit one batch. Empty batches are skipped
    /// (an incremental fetch between two samples legitimately returns
    /// nothing).
    fn pipe(&mut self, batch: &FetchBatch, stats: &mut SessionStats) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let frame = streaming::extract(batch, &self.channels)?;
        let payload = streaming::encode(&frame);
        self.transmitter
            .transmit(self.endpoint.as_mut(), &payload)?;

        stats.batches += 1;
        stats.samples += frame.sample_count() as u64;
        log::trace!(
            "Streamed batch: {} samples, {} bytes",
            frame.sample_count(),
            payload.len()
        );
        Ok(())
    }
}
