//! Error types for train topology information access

use thiserror::Error;

/// Result type for TTI operations
pub type Result<T> = std::result::Result<T, TtiError>;

/// Errors reported by the TTI subsystem
///
/// Only [`TtiError::Param`] and [`TtiError::NoData`] ever reach callers of the
/// query API. The decode classes are logged and dropped by the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TtiError {
    /// Invalid caller argument
    #[error("Parameter error: {0}")]
    Param(String),

    /// Cached data stale or absent, a refresh has been requested
    #[error("No data: {0}")]
    NoData(String),

    /// Record shorter than its fixed size or an array overruns the buffer
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// CRC mismatch
    #[error("Checksum error: expected {expected:#010x}, computed {computed:#010x}")]
    Checksum {
        /// CRC carried on the wire
        expected: u32,
        /// CRC computed over the received bytes
        computed: u32,
    },

    /// Allocation of a variable-length array failed
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Registration with the messaging session failed
    #[error("Init error: {0}")]
    Init(String),

    /// The messaging session refused an operation
    #[error("Transport error: {0}")]
    Transport(String),
}

impl TtiError {
    /// Create a new Param error
    pub fn param(msg: impl Into<String>) -> Self {
        TtiError::Param(msg.into())
    }

    /// Create a new NoData error
    pub fn no_data(msg: impl Into<String>) -> Self {
        TtiError::NoData(msg.into())
    }

    /// Create a new Malformed error
    pub fn malformed(msg: impl Into<String>) -> Self {
        TtiError::Malformed(msg.into())
    }

    /// Create a new Checksum error
    pub fn checksum(expected: u32, computed: u32) -> Self {
        TtiError::Checksum { expected, computed }
    }

    /// Create a new OutOfMemory error
    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        TtiError::OutOfMemory(msg.into())
    }

    /// Create a new Init error
    pub fn init(msg: impl Into<String>) -> Self {
        TtiError::Init(msg.into())
    }

    /// Create a new Transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        TtiError::Transport(msg.into())
    }

    /// True for the "try again later" outcome of a query
    pub fn is_no_data(&self) -> bool {
        matches!(self, TtiError::NoData(_))
    }
}

impl From<std::collections::TryReserveError> for TtiError {
    fn from(err: std::collections::TryReserveError) -> Self {
        TtiError::OutOfMemory(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TtiError::malformed("test");
        assert!(err.to_string().contains("Malformed"));

        let err = TtiError::checksum(0x1234, 0xABCD);
        assert_eq!(
            err.to_string(),
            "Checksum error: expected 0x00001234, computed 0x0000abcd"
        );
    }

    #[test]
    fn test_is_no_data() {
        assert!(TtiError::no_data("op dir").is_no_data());
        assert!(!TtiError::param("label").is_no_data());
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err: TtiError = v.try_reserve_exact(usize::MAX).unwrap_err().into();
        assert!(matches!(err, TtiError::OutOfMemory(_)));
    }
}
