#![deny(unsafe_code)]
//! TLS credentials and per-connection TLS setup

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;
use ncp_hal::net::SslAuth;
use ncp_hal::{NcpFs, NcpNet};

use super::socket::{TlsParams, ALPN_MAX_ENTRIES};
use super::Net;
use crate::credentials::{CredentialKind, SecTag};
use crate::error::{log_failure, Result};

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Register a TLS credential under `tag`
    ///
    /// PSK values are stored as given. Certificates and keys are file
    /// names: the file is pushed to the co-processor unless it is already
    /// there with a non-zero size.
    ///
    /// # Errors
    ///
    /// * `Error::Failed` if the tag is out of range or already used, or the
    ///   value is too long
    /// * The translated filesystem failure, in which case the tag stays free
    pub async fn tls_credential_add(
        &self,
        tag: SecTag,
        kind: CredentialKind,
        value: &str,
    ) -> Result<()> {
        self.ensure_ready()?;
        self.with(|tables| tables.credentials.reserve(tag, kind, value))
            .inspect_err(|_| error!("Credential tag {} unavailable", tag))?;

        if kind.is_file() {
            if let Err(err) = self.push_file(value).await {
                log_failure(err, "tls_credential_add");
                self.with(|tables| tables.credentials.abort(tag));
                return Err(err);
            }
        }
        self.with(|tables| tables.credentials.commit(tag));
        debug!("Credential {} added as {:?}", tag, kind);
        Ok(())
    }

    async fn push_file(&self, name: &str) -> Result<()> {
        let size = self.call(self.ncp.file_size(name).await, "file_size").unwrap_or(0);
        if size > 0 {
            return Ok(());
        }
        debug!("Pushing {} to the co-processor", name);
        self.call(self.ncp.write_file(name).await, "write_file")
    }

    /// Free the credential registered under `tag`
    ///
    /// Sockets that already copied it keep their copy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the tag is out of range or not in use.
    pub fn tls_credential_delete(&self, tag: SecTag, kind: CredentialKind) -> Result<()> {
        self.with(|tables| tables.credentials.remove(tag))
            .inspect_err(|_| error!("Credential tag {} not in use", tag))?;
        debug!("Credential {} ({:?}) deleted", tag, kind);
        Ok(())
    }

    /// Push the TLS parameters of a socket to connection `id`
    ///
    /// Order matters to the co-processor: authentication, PSK, ALPN, SNI.
    /// PSK is only offered when no certificate authentication applies.
    pub(super) async fn configure_tls(&self, id: u8, tls: &TlsParams) -> Result<()> {
        let auth = SslAuth {
            mode: tls.auth_mode(),
            certificate: tls.certificate.as_deref(),
            private_key: tls.private_key.as_deref(),
            ca_certificate: tls.ca_certificate.as_deref(),
        };
        self.call(
            self.ncp.set_ssl_configuration(id, &auth).await,
            "set_ssl_configuration",
        )?;

        if auth.mode == 0 {
            if let (Some(psk), Some(identity)) = (&tls.psk, &tls.psk_identity) {
                self.call(self.ncp.set_ssl_psk(id, psk, identity).await, "set_ssl_psk")?;
            }
        }

        // Empty values clear what a previous socket left on this slot
        let protocols: Vec<&str, ALPN_MAX_ENTRIES> =
            tls.alpn.iter().map(|name| name.as_str()).collect();
        self.call(self.ncp.set_ssl_alpn(id, &protocols).await, "set_ssl_alpn")?;
        self.call(
            self.ncp.set_ssl_server_name(id, &tls.server_name).await,
            "set_ssl_server_name",
        )?;
        Ok(())
    }
}
