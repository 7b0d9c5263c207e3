#![deny(unsafe_code)]
//! Co-processor RPC error types

/// Failure reported by a co-processor request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NcpError {
    /// The transport is processing another request; retry later
    Busy,
    /// The co-processor rejected the request
    Failed,
    /// No response before the request deadline
    Timeout,
    /// The response could not be parsed
    UnexpectedResponse,
    /// The request is not implemented by the firmware
    Unsupported,
}

/// Result of a co-processor request
pub type NcpResult<T> = Result<T, NcpError>;

impl core::fmt::Display for NcpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => write!(f, "Transport busy"),
            Self::Failed => write!(f, "Request failed"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::UnexpectedResponse => write!(f, "Unexpected response"),
            Self::Unsupported => write!(f, "Request not supported"),
        }
    }
}

impl core::error::Error for NcpError {}
