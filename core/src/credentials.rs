#![deny(unsafe_code)]
//! TLS credential store
//!
//! Fixed table of credentials addressed by an application-chosen tag.
//! Certificates and keys are co-processor file names; PSK values are kept
//! verbatim. A slot is reserved before any filesystem request so that two
//! concurrent adds cannot claim the same tag.

use heapless::String;

use crate::config::MAX_CREDENTIALS;
use crate::error::{Error, Result};

/// Longest file name or PSK value held by a slot
pub const CREDENTIAL_MAX_LEN: usize = 64;

/// Owned credential value
pub type Credential = String<CREDENTIAL_MAX_LEN>;

/// Opaque credential handle chosen by the application
pub type SecTag = u32;

/// Role of a credential in the TLS handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CredentialKind {
    CaCertificate,
    /// Certificate presented by this host
    ServerCertificate,
    PrivateKey,
    Psk,
    PskIdentity,
}

impl CredentialKind {
    /// The value names a file stored on the co-processor
    pub fn is_file(self) -> bool {
        !matches!(self, Self::Psk | Self::PskIdentity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Reserved while the file is pushed to the co-processor
    Pending,
    Valid,
}

#[derive(Debug, Clone)]
struct Slot {
    state: SlotState,
    kind: CredentialKind,
    value: Credential,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: SlotState::Free,
            kind: CredentialKind::CaCertificate,
            value: Credential::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CredentialStore {
    slots: [Slot; MAX_CREDENTIALS],
}

impl CredentialStore {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    fn slot_mut(&mut self, tag: SecTag) -> Result<&mut Slot> {
        usize::try_from(tag)
            .ok()
            .and_then(|index| self.slots.get_mut(index))
            .ok_or(Error::Failed)
    }

    /// Claim `tag` for `value`
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the tag is out of range, already in use,
    /// or the value does not fit a slot.
    pub(crate) fn reserve(&mut self, tag: SecTag, kind: CredentialKind, value: &str) -> Result<()> {
        let slot = self.slot_mut(tag)?;
        if slot.state != SlotState::Free {
            return Err(Error::Failed);
        }
        let value = Credential::try_from(value).map_err(|_| Error::Failed)?;
        *slot = Slot {
            state: SlotState::Pending,
            kind,
            value,
        };
        Ok(())
    }

    /// Mark a reserved slot usable
    pub(crate) fn commit(&mut self, tag: SecTag) {
        if let Ok(slot) = self.slot_mut(tag) {
            if slot.state == SlotState::Pending {
                slot.state = SlotState::Valid;
            }
        }
    }

    /// Release a reservation that could not be completed
    pub(crate) fn abort(&mut self, tag: SecTag) {
        if let Ok(slot) = self.slot_mut(tag) {
            if slot.state == SlotState::Pending {
                *slot = Slot::default();
            }
        }
    }

    /// Free a valid credential
    ///
    /// # Errors
    ///
    /// Returns `Error::Failed` if the tag is out of range or not valid.
    pub(crate) fn remove(&mut self, tag: SecTag) -> Result<()> {
        let slot = self.slot_mut(tag)?;
        if slot.state != SlotState::Valid {
            return Err(Error::Failed);
        }
        *slot = Slot::default();
        Ok(())
    }

    /// Copy of a valid credential
    pub(crate) fn get(&self, tag: SecTag) -> Option<(CredentialKind, Credential)> {
        let slot = self.slots.get(usize::try_from(tag).ok()?)?;
        (slot.state == SlotState::Valid).then(|| (slot.kind, slot.value.clone()))
    }

    #[allow(dead_code)]
    pub(crate) fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::default());
    }
}
