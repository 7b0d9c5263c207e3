#![deny(unsafe_code)]
//! Driver status types
//!
//! Every public operation returns [`Result`]. Failures reported by the
//! co-processor go through [`translate`], which also notifies the
//! application error callback.

use ncp_hal::NcpError;

use crate::callbacks::AppCallbacks;

/// Driver operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Co-processor transport occupied, the caller should retry
    Busy,
    /// Operation rejected or failed
    Failed,
    /// Event wait or request exceeded its deadline
    Timeout,
    /// Co-processor replied with unexpected data
    UnexpectedResponse,
    /// Feature or address family not supported
    NotSupported,
}

/// Driver operation result
pub type Result<T> = core::result::Result<T, Error>;

impl From<NcpError> for Error {
    fn from(err: NcpError) -> Self {
        match err {
            NcpError::Busy => Self::Busy,
            NcpError::Failed => Self::Failed,
            NcpError::Timeout => Self::Timeout,
            NcpError::UnexpectedResponse => Self::UnexpectedResponse,
            NcpError::Unsupported => Self::NotSupported,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => write!(f, "Busy"),
            Self::Failed => write!(f, "Error"),
            Self::Timeout => write!(f, "Timeout"),
            Self::UnexpectedResponse => write!(f, "Unexpected response"),
            Self::NotSupported => write!(f, "Not supported"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for Error {}

impl embedded_io_async::Error for Error {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::Failed => embedded_io_async::ErrorKind::BrokenPipe,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::UnexpectedResponse => embedded_io_async::ErrorKind::InvalidData,
            Self::NotSupported => embedded_io_async::ErrorKind::Unsupported,
            Self::Busy => embedded_io_async::ErrorKind::Other,
        }
    }
}

/// Convert a co-processor result, reporting failures to the application
///
/// `operation` names the failing request in the error callback.
pub(crate) fn translate<T>(
    callbacks: &dyn AppCallbacks,
    result: core::result::Result<T, NcpError>,
    operation: &'static str,
) -> Result<T> {
    result.map_err(|err| {
        let status = Error::from(err);
        callbacks.error(status, operation);
        status
    })
}

/// Log a failure unless it is a transient [`Error::Busy`]
pub(crate) fn log_failure(err: Error, what: &'static str) {
    if err == Error::Busy {
        debug!("{}: transport busy", what);
    } else {
        error!("{} failed: {:?}", what, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    struct Recorder {
        errors: RefCell<std::vec::Vec<(Error, &'static str)>>,
    }

    impl AppCallbacks for Recorder {
        fn error(&self, status: Error, operation: &'static str) {
            self.errors.borrow_mut().push((status, operation));
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::from(NcpError::Busy), Error::Busy);
        assert_eq!(Error::from(NcpError::Failed), Error::Failed);
        assert_eq!(Error::from(NcpError::Timeout), Error::Timeout);
        assert_eq!(
            Error::from(NcpError::UnexpectedResponse),
            Error::UnexpectedResponse
        );
        assert_eq!(Error::from(NcpError::Unsupported), Error::NotSupported);
    }

    #[test]
    fn test_translate_reports_failures_only() {
        let recorder = Recorder {
            errors: RefCell::new(std::vec::Vec::new()),
        };

        assert_eq!(translate(&recorder, Ok::<u8, NcpError>(7), "ok_call"), Ok(7));
        assert!(recorder.errors.borrow().is_empty());

        let result = translate::<()>(&recorder, Err(NcpError::Busy), "busy_call");
        assert_eq!(result, Err(Error::Busy));
        assert_eq!(recorder.errors.borrow().as_slice(), &[(Error::Busy, "busy_call")]);
    }

    #[test]
    fn test_io_error_kind() {
        use embedded_io_async::{Error as _, ErrorKind};
        assert_eq!(Error::Timeout.kind(), ErrorKind::TimedOut);
        assert_eq!(Error::Failed.kind(), ErrorKind::BrokenPipe);
    }
}
