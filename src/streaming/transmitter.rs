//! Chunked payload transmission.
//!
//! An encoded frame can be arbitrarily large (one long fetch can carry
//! thousands of rows), but the send side works in bounded units: the
//! payload is partitioned into consecutive pieces of exactly `max_unit`
//! bytes plus a possibly shorter final piece, and each piece is written
//! to the endpoint in ascending offset order. No gaps, no overlap, no
//! application-level acknowledgment: "sent" means the transport layer
//! accepted the bytes.

use crate::error::{Error, Result};
use crate::transport::StreamEndpoint;

/// Chunked transmitter with a fixed maximum send unit
#[derive(Debug)]
pub struct Transmitter {
    max_unit: usize,
    bytes_sent: u64,
    chunks_sent: u64,
}

impl Transmitter {
    /// Create a transmitter.
    ///
    /// A zero `max_unit` is a configuration error and is rejected here,
    /// at construction, not at send time.
    pub fn new(max_unit: usize) -> Result<Self> {
        if max_unit == 0 {
            return Err(Error::InvalidParameter("max_unit must be >= 1".into()));
        }
        Ok(Self {
            max_unit,
            bytes_sent: 0,
            chunks_sent: 0,
        })
    }

    /// Create a transmitter whose unit is floored to a whole number of
    /// records, so a record never spans more send units than necessary.
    ///
    /// Fails if `max_unit` cannot hold even one record.
    pub fn aligned_to_record(max_unit: usize, record_size: usize) -> Result<Self> {
        if record_size == 0 {
            return Err(Error::InvalidParameter("record size must be >= 1".into()));
        }
        let aligned = (max_unit / record_size) * record_size;
        if aligned == 0 {
            return Err(Error::InvalidParameter(format!(
                "max_unit {} cannot hold one {}-byte record",
                max_unit, record_size
            )));
        }
        Self::new(aligned)
    }

    /// Configured maximum send unit
    pub fn max_unit(&self) -> usize {
        self.max_unit
    }

    /// Total payload bytes accepted by the transport so far
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Total chunks written so far
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    /// Send one payload as a deterministic sequence of bounded writes.
    ///
    /// A zero-length payload performs zero writes. Errors out with
    /// whatever the endpoint reports (`ConnectionLost` for a broken
    /// peer), leaving the counters at the last accepted chunk.
    pub fn transmit(
        &mut self,
        endpoint: &mut dyn StreamEndpoint,
        payload: &[u8],
    ) -> Result<()> {
        for chunk in payload.chunks(self.max_unit) {
            endpoint.send(chunk)?;
            self.bytes_sent += chunk.len() as u64;
            self.chunks_sent += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockEndpoint;

    #[test]
    fn test_zero_max_unit_rejected_at_construction() {
        assert!(matches!(
            Transmitter::new(0).unwrap_err(),
            Error::InvalidParameter(_)
        ));
    }

    #[test]
    fn test_2000_bytes_at_988() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let mut endpoint = MockEndpoint::new();
        let mut tx = Transmitter::new(988).unwrap();

        tx.transmit(&mut endpoint, &payload).unwrap();

        assert_eq!(endpoint.chunk_sizes(), vec![988, 988, 24]);
        assert_eq!(endpoint.concatenated(), payload);
        assert_eq!(tx.bytes_sent(), 2000);
        assert_eq!(tx.chunks_sent(), 3);
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (len, unit, expected) in [
            (0usize, 4usize, 0usize),
            (1, 4, 1),
            (4, 4, 1),
            (5, 4, 2),
            (8, 4, 2),
            (9, 4, 3),
            (100, 1, 100),
        ] {
            let payload = vec![0xA5u8; len];
            let mut endpoint = MockEndpoint::new();
            let mut tx = Transmitter::new(unit).unwrap();
            tx.transmit(&mut endpoint, &payload).unwrap();

            let sizes = endpoint.chunk_sizes();
            assert_eq!(sizes.len(), expected, "len={} unit={}", len, unit);
            assert_eq!(endpoint.concatenated(), payload);
            // All but the last chunk are full-size
            for s in sizes.iter().take(sizes.len().saturating_sub(1)) {
                assert_eq!(*s, unit);
            }
        }
    }

    #[test]
    fn test_empty_payload_sends_nothing() {
        let mut endpoint = MockEndpoint::new();
        let mut tx = Transmitter::new(64).unwrap();
        tx.transmit(&mut endpoint, &[]).unwrap();
        assert!(endpoint.chunks().is_empty());
        assert_eq!(tx.chunks_sent(), 0);
    }

    #[test]
    fn test_broken_peer_surfaces_connection_lost() {
        let endpoint = MockEndpoint::new();
        endpoint.fail_after(1);
        let mut tx = Transmitter::new(10).unwrap();

        let mut ep = endpoint.clone();
        let err = tx.transmit(&mut ep, &[0u8; 25]).unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
        // The chunk accepted before the break is counted, nothing more
        assert_eq!(tx.bytes_sent(), 10);
        assert_eq!(tx.chunks_sent(), 1);
    }

    #[test]
    fn test_record_alignment_floors_the_unit() {
        // 4 channels of f32 = 16-byte record; 1024 // 16 * 16 = 1024
        let tx = Transmitter::aligned_to_record(1030, 16).unwrap();
        assert_eq!(tx.max_unit(), 1024);

        assert!(Transmitter::aligned_to_record(10, 16).is_err());
    }
}
