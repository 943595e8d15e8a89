//! Mock endpoint for testing

use super::StreamEndpoint;
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};

/// Mock endpoint that records every chunk, preserving boundaries
#[derive(Clone)]
pub struct MockEndpoint {
    inner: Arc<Mutex<MockEndpointInner>>,
}

struct MockEndpointInner {
    chunks: Vec<Vec<u8>>,
    /// Fail with `ConnectionLost` once this many sends have succeeded
    fail_after: Option<usize>,
    shutdown_calls: usize,
}

impl MockEndpoint {
    /// Create a new mock endpoint
    pub fn new() -> Self {
        MockEndpoint {
            inner: Arc::new(Mutex::new(MockEndpointInner {
                chunks: Vec::new(),
                fail_after: None,
                shutdown_calls: 0,
            })),
        }
    }

    /// Make sends fail with `ConnectionLost` after `n` successful sends
    pub fn fail_after(&self, n: usize) {
        self.inner.lock().unwrap().fail_after = Some(n);
    }

    /// All recorded chunks, in emission order
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().chunks.clone()
    }

    /// Recorded chunk sizes, in emission order
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.inner.lock().unwrap().chunks.iter().map(Vec::len).collect()
    }

    /// All recorded bytes concatenated
    pub fn concatenated(&self) -> Vec<u8> {
        self.inner.lock().unwrap().chunks.concat()
    }

    /// Number of `shutdown` calls observed
    pub fn shutdown_calls(&self) -> usize {
        self.inner.lock().unwrap().shutdown_calls
    }
}

impl StreamEndpoint for MockEndpoint {
    fn send(&mut self, chunk: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(n) = inner.fail_after {
            if inner.chunks.len() >= n {
                return Err(Error::ConnectionLost("mock peer closed".into()));
            }
        }
        inner.chunks.push(chunk.to_vec());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.inner.lock().unwrap().shutdown_calls += 1;
        Ok(())
    }
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::new()
    }
}
