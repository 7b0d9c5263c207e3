#![deny(unsafe_code)]
//! Data-pull synchronizer
//!
//! The co-processor announces buffered bytes with `SocketData` events.
//! The event task adds them to the connection's `available` counter and
//! raises its data signal. A reader takes the signal, pulls at most
//! `available` bytes, and raises the signal again if bytes remain. The
//! counter, not the signal, says whether more data is buffered.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{with_timeout, Duration};
use ncp_hal::{NcpFs, NcpNet};

use super::Net;
use crate::error::{log_failure, Result};

/// Length of one wait on the data signal
const TAKE_SLICE_MS: u32 = 100;

/// Grace period for an event racing with a short read
const SETTLE_MS: u64 = 3;

impl<N, M> Net<'_, N, M>
where
    N: NcpNet + NcpFs,
    M: RawMutex,
{
    /// Block until data is announced on connection `id`, then pull it
    ///
    /// Returns 0 when nothing arrived within `recv_timeout_ms` or the
    /// connection is down with nothing buffered.
    pub(super) async fn wait_pull_data(
        &self,
        id: u8,
        buf: &mut [u8],
        recv_timeout_ms: u32,
        recv_buf_size: u32,
    ) -> Result<usize> {
        let signals = &self.signals[usize::from(id)];
        let slice = Duration::from_millis(TAKE_SLICE_MS.into());
        let attempts = (recv_timeout_ms / TAKE_SLICE_MS).max(1);

        let mut taken = false;
        for _ in 0..attempts {
            let (connected, available) = self.link_state(id);
            if !connected && available == 0 {
                break;
            }
            if with_timeout(slice, signals.data.wait()).await.is_ok() {
                taken = true;
                break;
            }
        }
        if !taken {
            return Ok(0);
        }

        let mut max_len = buf.len().min(recv_buf_size as usize);
        if (self.link_state(id).1 as usize) < max_len {
            let _ = with_timeout(Duration::from_millis(SETTLE_MS), signals.data.wait()).await;
        }
        let available = self.link_state(id).1;
        max_len = max_len.min(available as usize);
        if max_len == 0 {
            // Nothing pulled, hand the token back to the next reader
            if available > 0 {
                signals.data.signal(());
            }
            return Ok(0);
        }

        let received = self
            .call(
                self.ncp
                    .pull_data(id, &mut buf[..max_len], self.config.pull_timeout_ms)
                    .await,
                "pull_data",
            )
            .inspect_err(|err| log_failure(*err, "pull_data"))?;

        let remaining = self.with(|tables| {
            let Some(conn) = tables.connection_mut(id) else {
                return 0;
            };
            let pulled = u32::try_from(received).unwrap_or(u32::MAX);
            // A short or oversized read leaves the counter unreliable
            if pulled > conn.available || received < max_len {
                conn.available = 0;
            } else {
                conn.available -= pulled;
            }
            conn.available
        });
        if remaining > 0 {
            signals.data.signal(());
        }
        trace!("Connection {}: pulled {}, {} left", id, received, remaining);
        Ok(received)
    }

    /// Liveness and buffered byte count of connection `id`
    fn link_state(&self, id: u8) -> (bool, u32) {
        self.with(|tables| {
            tables
                .connection(id)
                .map_or((false, 0), |conn| (conn.connected, conn.available))
        })
    }
}
