//! Error types for the capture bridge

use crate::capture::CaptureState;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Capture bridge error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Configuration value out of range or missing
    #[error("Invalid config: {0}")]
    Config(String),

    /// Requested channel missing from a fetch result
    #[error("Channel not present in fetch result: {0}")]
    MissingChannel(String),

    /// Channel sample counts within one fetch result disagree
    #[error("Inconsistent batch length: channel {channel} has {actual} samples, expected {expected}")]
    InconsistentBatchLength {
        /// Channel whose length disagrees
        channel: String,
        /// Sample count of the first requested channel
        expected: usize,
        /// Sample count actually observed
        actual: usize,
    },

    /// Downstream connection closed or broke mid-stream
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Capture never reached the expected state within the deadline
    #[error("Timed out after {waited_ms} ms waiting for capture state {state}")]
    StateTimeout {
        /// State the loop was waiting for
        state: CaptureState,
        /// Milliseconds spent waiting
        waited_ms: u64,
    },

    /// Platform-reported fault, carrying the vendor code and description
    #[error("Vendor fault {code}: {description}")]
    VendorProtocol {
        /// Vendor-specific error code
        code: i32,
        /// Vendor-supplied description
        description: String,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Backend type not recognized
    #[error("Unknown backend type: {0}")]
    UnknownBackend(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a platform fault with a vendor code
    pub fn vendor(code: i32, description: impl Into<String>) -> Self {
        Error::VendorProtocol {
            code,
            description: description.into(),
        }
    }
}
