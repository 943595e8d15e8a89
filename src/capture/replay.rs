//! File-replay capture backend.
//!
//! Replays a previous session's recording against the bridge. The file
//! layout is exactly what goes on the wire: back-to-back little-endian
//! float32 values, rows of one value per channel, no framing. Channel
//! count comes from configuration; a file whose size is not a whole
//! number of records is rejected as a platform fault.

use crate::capture::{CaptureBackend, CaptureState, FetchBatch, TriggerSpec};
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Vendor code: recording truncated mid-record
const FAULT_TRUNCATED: i32 = 201;
/// Vendor code: operation out of lifecycle order
const FAULT_NOT_READY: i32 = 202;
/// Vendor code: operation on a disposed capture
const FAULT_DISPOSED: i32 = 203;

/// Capture backend replaying a recorded wire-format file
#[derive(Debug)]
pub struct ReplayBackend {
    /// Row-major samples, one f32 per channel per row
    values: Vec<f32>,
    channel_count: usize,
    /// Rows handed out per fetch (before the final drain)
    batch_rows: usize,
    channels: Vec<String>,
    downsampling: u32,
    /// Next row to serve, in retained (post-downsampling) rows
    cursor: usize,
    started: bool,
    /// One `Armed` observation is reported before the replayed trigger
    /// "fires"
    armed_seen: bool,
    disposed: bool,
}

impl ReplayBackend {
    /// Open a recording.
    ///
    /// `channel_count` must match the recording's layout; `batch_rows`
    /// bounds how many rows one incremental fetch returns.
    pub fn open<P: AsRef<Path>>(path: P, channel_count: usize, batch_rows: usize) -> Result<Self> {
        if channel_count == 0 {
            return Err(Error::InvalidParameter("channel count must be >= 1".into()));
        }
        if batch_rows == 0 {
            return Err(Error::InvalidParameter("batch_samples must be >= 1".into()));
        }

        let bytes = fs::read(path.as_ref())?;
        let record_size = channel_count * 4;
        if bytes.len() % record_size != 0 {
            return Err(Error::vendor(
                FAULT_TRUNCATED,
                format!(
                    "recording {} is {} bytes, not a multiple of the {}-byte record",
                    path.as_ref().display(),
                    bytes.len(),
                    record_size
                ),
            ));
        }

        let values = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            values,
            channel_count,
            batch_rows,
            channels: Vec::new(),
            downsampling: 1,
            cursor: 0,
            started: false,
            armed_seen: false,
            disposed: false,
        })
    }

    fn check_live(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::vendor(FAULT_DISPOSED, "capture already disposed"));
        }
        Ok(())
    }

    /// Total rows in the recording before downsampling
    fn raw_rows(&self) -> usize {
        self.values.len() / self.channel_count
    }

    /// Rows remaining after downsampling
    fn retained_rows(&self) -> usize {
        self.raw_rows().div_ceil(self.downsampling as usize)
    }

    fn row(&self, retained_idx: usize) -> &[f32] {
        let raw_idx = retained_idx * self.downsampling as usize;
        let start = raw_idx * self.channel_count;
        &self.values[start..start + self.channel_count]
    }
}

impl CaptureBackend for ReplayBackend {
    fn configure(&mut self, channels: &[String], downsampling: u32) -> Result<()> {
        self.check_live()?;
        if channels.len() != self.channel_count {
            return Err(Error::InvalidParameter(format!(
                "recording holds {} channels, {} requested",
                self.channel_count,
                channels.len()
            )));
        }
        if downsampling == 0 {
            return Err(Error::InvalidParameter("downsampling must be >= 1".into()));
        }
        self.channels = channels.to_vec();
        self.downsampling = downsampling;
        Ok(())
    }

    fn set_start_trigger(&mut self, _trigger: &TriggerSpec) -> Result<()> {
        // Replay has no live variables to watch; the recorded data already
        // starts at the original trigger point.
        self.check_live()
    }

    fn set_stop_trigger(&mut self, _trigger: &TriggerSpec) -> Result<()> {
        self.check_live()
    }

    fn start(&mut self) -> Result<()> {
        self.check_live()?;
        if self.channels.is_empty() {
            return Err(Error::vendor(FAULT_NOT_READY, "start before configure"));
        }
        self.started = true;
        self.cursor = 0;
        self.armed_seen = false;
        Ok(())
    }

    fn state(&mut self) -> Result<CaptureState> {
        self.check_live()?;
        if !self.started {
            return Ok(CaptureState::Idle);
        }
        if !self.armed_seen {
            self.armed_seen = true;
            return Ok(CaptureState::Armed);
        }
        if self.cursor >= self.retained_rows() {
            Ok(CaptureState::Finished)
        } else {
            Ok(CaptureState::Running)
        }
    }

    fn fetch(&mut self, flush: bool) -> Result<FetchBatch> {
        self.check_live()?;
        if !self.started {
            return Err(Error::vendor(FAULT_NOT_READY, "fetch before start"));
        }

        let remaining = self.retained_rows() - self.cursor;
        let rows = if flush {
            remaining
        } else {
            remaining.min(self.batch_rows)
        };

        let mut columns = vec![Vec::with_capacity(rows); self.channel_count];
        for r in 0..rows {
            for (c, column) in columns.iter_mut().enumerate() {
                column.push(f64::from(self.row(self.cursor + r)[c]));
            }
        }
        self.cursor += rows;

        let mut batch = FetchBatch::new();
        for (channel, column) in self.channels.iter().zip(columns) {
            batch.insert(channel.clone(), column);
        }
        Ok(batch)
    }

    fn dispose(&mut self) -> Result<()> {
        self.disposed = true;
        Ok(())
    }
}
