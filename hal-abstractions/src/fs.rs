#![deny(unsafe_code)]
//! Co-processor filesystem requests

use core::future::Future;

use crate::NcpResult;

/// Filesystem on the co-processor
///
/// Certificates and keys referenced by TLS connections must live here.
pub trait NcpFs {
    /// Size in bytes of `name`, 0 when the file does not exist
    fn file_size(&self, name: &str) -> impl Future<Output = NcpResult<u32>>;

    /// Push the host copy of `name` to the co-processor
    fn write_file(&self, name: &str) -> impl Future<Output = NcpResult<()>>;
}
