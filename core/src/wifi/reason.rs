#![deny(unsafe_code)]
//! Firmware association failure reasons

/// Reason code carried by a `WifiReason` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisconnectReason {
    Successful,
    TxAuthFrameAllocateFailure,
    AuthenticationFailure,
    AuthAlgoFailure,
    TxAssocFrameAllocateFailure,
    AssociateFailure,
    DeauthByApWhenNotConnected,
    DeauthByApWhenConnected,
    HandshakePskTimeout,
    HandshakeTxDeauthFrameTransmitFailure,
    HandshakeTxDeauthFrameAllocateFailure,
    AuthOrAssocResponseTimeout,
    ScanNoBssidAndChannel,
    CreateChannelContextFailure,
    JoinNetworkFailure,
    AddStaFailure,
    BeaconLoss,
    NetworkSecurityMismatch,
    NetworkWepLengthError,
    DisconnectByUserWithDeauth,
    DisconnectByUserNoDeauth,
    PowerSaveTxNullFrameFailure,
    TrafficLoss,
    SwitchChannelFailure,
    AuthOrAssocResponseCfmFailure,
    ReassociateStarting,
    /// Code outside the known range
    Unknown(u32),
}

impl DisconnectReason {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Successful,
            1 => Self::TxAuthFrameAllocateFailure,
            2 => Self::AuthenticationFailure,
            3 => Self::AuthAlgoFailure,
            4 => Self::TxAssocFrameAllocateFailure,
            5 => Self::AssociateFailure,
            6 => Self::DeauthByApWhenNotConnected,
            7 => Self::DeauthByApWhenConnected,
            8 => Self::HandshakePskTimeout,
            9 => Self::HandshakeTxDeauthFrameTransmitFailure,
            10 => Self::HandshakeTxDeauthFrameAllocateFailure,
            11 => Self::AuthOrAssocResponseTimeout,
            12 => Self::ScanNoBssidAndChannel,
            13 => Self::CreateChannelContextFailure,
            14 => Self::JoinNetworkFailure,
            15 => Self::AddStaFailure,
            16 => Self::BeaconLoss,
            17 => Self::NetworkSecurityMismatch,
            18 => Self::NetworkWepLengthError,
            19 => Self::DisconnectByUserWithDeauth,
            20 => Self::DisconnectByUserNoDeauth,
            21 => Self::PowerSaveTxNullFrameFailure,
            22 => Self::TrafficLoss,
            23 => Self::SwitchChannelFailure,
            24 => Self::AuthOrAssocResponseCfmFailure,
            25 => Self::ReassociateStarting,
            other => Self::Unknown(other),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::TxAuthFrameAllocateFailure => "auth frame allocation failure",
            Self::AuthenticationFailure => "authentication failure",
            Self::AuthAlgoFailure => "authentication algorithm failure",
            Self::TxAssocFrameAllocateFailure => "assoc frame allocation failure",
            Self::AssociateFailure => "association failure",
            Self::DeauthByApWhenNotConnected => "deauthenticated by AP before connection",
            Self::DeauthByApWhenConnected => "deauthenticated by AP",
            Self::HandshakePskTimeout => "4-way handshake timeout, wrong password?",
            Self::HandshakeTxDeauthFrameTransmitFailure => "4-way handshake deauth transmit failure",
            Self::HandshakeTxDeauthFrameAllocateFailure => "4-way handshake deauth allocation failure",
            Self::AuthOrAssocResponseTimeout => "auth or assoc response timeout",
            Self::ScanNoBssidAndChannel => "network not found",
            Self::CreateChannelContextFailure => "channel context failure",
            Self::JoinNetworkFailure => "join failure",
            Self::AddStaFailure => "add station failure",
            Self::BeaconLoss => "beacon loss",
            Self::NetworkSecurityMismatch => "security mismatch",
            Self::NetworkWepLengthError => "WEP key length error",
            Self::DisconnectByUserWithDeauth => "disconnected by user with deauth",
            Self::DisconnectByUserNoDeauth => "disconnected by user",
            Self::PowerSaveTxNullFrameFailure => "power save null frame failure",
            Self::TrafficLoss => "traffic loss",
            Self::SwitchChannelFailure => "channel switch failure",
            Self::AuthOrAssocResponseCfmFailure => "auth or assoc confirmation failure",
            Self::ReassociateStarting => "reassociation starting",
            Self::Unknown(_) => "unknown reason",
        }
    }
}

impl core::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown reason {}", code),
            known => f.write_str(known.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(DisconnectReason::from_code(0), DisconnectReason::Successful);
        assert_eq!(DisconnectReason::from_code(16), DisconnectReason::BeaconLoss);
        assert_eq!(
            DisconnectReason::from_code(25),
            DisconnectReason::ReassociateStarting
        );
        assert_eq!(DisconnectReason::from_code(26), DisconnectReason::Unknown(26));
    }

    #[test]
    fn test_display() {
        assert_eq!(DisconnectReason::BeaconLoss.to_string(), "beacon loss");
        assert_eq!(
            DisconnectReason::Unknown(99).to_string(),
            "unknown reason 99"
        );
    }
}
