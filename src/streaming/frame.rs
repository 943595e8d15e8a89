//! Frame assembly and binary encoding.
//!
//! # Wire format
//!
//! The stream carries back-to-back little-endian IEEE-754 float32 values
//! with no framing and no metadata:
//!
//! ```text
//! ┌────────┬────────┬─────┬────────┐ ┌────────┬──
//! │ ch 0   │ ch 1   │ ... │ ch C-1 │ │ ch 0   │ ...
//! │ 4 B LE │ 4 B LE │     │ 4 B LE │ │ 4 B LE │
//! └────────┴────────┴─────┴────────┘ └────────┴──
//!   record = one sample across all C channels
//! ```
//!
//! Records appear in strict temporal order. The consumer knows the
//! channel count and order out-of-band (configuration); encoding N
//! samples over C channels always yields exactly N·C·4 bytes.
//!
//! NaN and infinity pass through bit-for-bit: this is raw telemetry, and
//! sanity checking belongs to the consumer, not the encoder.

use crate::capture::FetchBatch;
use crate::error::{Error, Result};

/// One time-ordered batch of multi-channel samples, row-major.
///
/// Transient: assembled from a fetch, encoded, and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    channel_count: usize,
    /// Row-major values: sample 0 channels, sample 1 channels, ...
    values: Vec<f32>,
}

impl Frame {
    /// Number of channels per sample
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Number of samples (rows)
    pub fn sample_count(&self) -> usize {
        self.values.len() / self.channel_count
    }

    /// True if the frame holds no samples
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate rows, each one sample across all channels
    pub fn rows(&self) -> std::slice::Chunks<'_, f32> {
        self.values.chunks(self.channel_count)
    }
}

/// Assemble a frame from one fetch result.
///
/// Retrieves each requested channel's new-sample vector and interleaves
/// them row-major, preserving the requested channel order. Fails with
/// [`Error::MissingChannel`] if a channel is absent and with
/// [`Error::InconsistentBatchLength`] if the per-channel sample counts
/// disagree, a platform-side shape violation that must surface instead
/// of being masked by truncation.
pub fn extract(batch: &FetchBatch, channels: &[String]) -> Result<Frame> {
    if channels.is_empty() {
        return Err(Error::InvalidParameter("channel list is empty".into()));
    }

    let mut columns: Vec<&[f64]> = Vec::with_capacity(channels.len());
    for channel in channels {
        let samples = batch
            .channel(channel)
            .ok_or_else(|| Error::MissingChannel(channel.clone()))?;
        columns.push(samples);
    }

    let expected = columns[0].len();
    for (channel, column) in channels.iter().zip(&columns) {
        if column.len() != expected {
            return Err(Error::InconsistentBatchLength {
                channel: channel.clone(),
                expected,
                actual: column.len(),
            });
        }
    }

    let mut values = Vec::with_capacity(expected * channels.len());
    for row in 0..expected {
        for column in &columns {
            values.push(column[row] as f32);
        }
    }

    Ok(Frame {
        channel_count: channels.len(),
        values,
    })
}

/// Encode a frame into its wire representation.
///
/// Pure and deterministic: C consecutive 4-byte little-endian f32 values
/// per row, rows concatenated in sample order.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frame.values.len() * 4);
    for value in &frame.values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Reconstruct a frame from wire bytes.
///
/// The consumer-side inverse of [`encode`]; also used to read recordings
/// back. The byte count must be a whole number of `channel_count`-wide
/// records.
pub fn decode(bytes: &[u8], channel_count: usize) -> Result<Frame> {
    if channel_count == 0 {
        return Err(Error::InvalidParameter("channel count must be >= 1".into()));
    }
    let record_size = channel_count * 4;
    if bytes.len() % record_size != 0 {
        return Err(Error::InvalidParameter(format!(
            "{} bytes is not a multiple of the {}-byte record",
            bytes.len(),
            record_size
        )));
    }

    let values = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(Frame {
        channel_count,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(entries: &[(&str, &[f64])]) -> FetchBatch {
        let mut batch = FetchBatch::new();
        for (channel, samples) in entries {
            batch.insert(*channel, samples.to_vec());
        }
        batch
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_interleaves_in_channel_order() {
        let batch = batch(&[("I_d", &[1.0, 2.0]), ("I_q", &[3.0, 4.0])]);
        let frame = extract(&batch, &channels(&["I_d", "I_q"])).unwrap();

        assert_eq!(frame.sample_count(), 2);
        assert_eq!(frame.channel_count(), 2);
        let rows: Vec<&[f32]> = frame.rows().collect();
        assert_eq!(rows, vec![&[1.0f32, 3.0][..], &[2.0f32, 4.0][..]]);
    }

    #[test]
    fn test_extract_missing_channel() {
        let batch = batch(&[("I_d", &[1.0])]);
        let err = extract(&batch, &channels(&["I_d", "I_q"])).unwrap_err();
        match err {
            Error::MissingChannel(name) => assert_eq!(name, "I_q"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_extract_inconsistent_lengths() {
        let batch = batch(&[("a", &[1.0, 2.0, 3.0, 4.0, 5.0]), ("b", &[1.0, 2.0, 3.0, 4.0])]);
        let err = extract(&batch, &channels(&["a", "b"])).unwrap_err();
        match err {
            Error::InconsistentBatchLength {
                channel,
                expected,
                actual,
            } => {
                assert_eq!(channel, "b");
                assert_eq!(expected, 5);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_extract_empty_channel_list() {
        let batch = batch(&[("a", &[1.0])]);
        assert!(matches!(
            extract(&batch, &[]).unwrap_err(),
            Error::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_extract_empty_batch_gives_empty_frame() {
        let batch = batch(&[("a", &[]), ("b", &[])]);
        let frame = extract(&batch, &channels(&["a", "b"])).unwrap();
        assert!(frame.is_empty());
        assert_eq!(encode(&frame).len(), 0);
    }

    #[test]
    fn test_encode_two_by_two_is_sixteen_bytes() {
        let batch = batch(&[("I_d", &[1.0, 2.0]), ("I_q", &[3.0, 4.0])]);
        let frame = extract(&batch, &channels(&["I_d", "I_q"])).unwrap();
        let bytes = encode(&frame);

        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &3.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[12..16], &4.0f32.to_le_bytes());

        let decoded = decode(&bytes, 2).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_roundtrip_preserves_bit_patterns() {
        let batch = batch(&[(
            "raw",
            &[
                0.0,
                -0.0,
                f64::NAN,
                f64::INFINITY,
                f64::NEG_INFINITY,
                1.5e-40, // subnormal once narrowed to f32
                123.456,
            ],
        )]);
        let frame = extract(&batch, &channels(&["raw"])).unwrap();
        let decoded = decode(&encode(&frame), 1).unwrap();

        let original: Vec<u32> = frame.values.iter().map(|v| v.to_bits()).collect();
        let restored: Vec<u32> = decoded.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        assert!(matches!(
            decode(&[0u8; 10], 2).unwrap_err(),
            Error::InvalidParameter(_)
        ));
    }
}
