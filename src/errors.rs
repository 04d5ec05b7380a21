//! Error types surfaced by the network stack.
//!
//! Nothing here is fatal to a [`crate::network::NetworkManager`]: a failure
//! degrades to one session or one control function. Malformed inbound frames
//! are dropped and logged without surfacing an error at all.

/// Synchronous rejection of a [`crate::network::NetworkManager::send`] call.
///
/// Acceptance is not delivery: a send that passes these checks may still fail
/// later, reported through [`crate::network::NetworkEvent::TransferFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The source control function has not finished claiming an address.
    AddressNotClaimed,
    /// The source control function is parked at the null address and must be
    /// explicitly re-claimed before it can send.
    CannotClaim,
    /// The destination partner has not resolved to a bus address.
    DestinationUnresolved,
    /// Payload exceeds the limit of the applicable sub-protocol.
    PayloadTooLarge {
        /// Requested payload length.
        len: usize,
        /// Limit for the selected sub-protocol.
        max: usize,
    },
    /// A session for the same source, destination and PGN is already active.
    SessionInProgress,
    /// The session table is full.
    NoSessionSlot,
    /// The handle does not name an internal control function.
    NotInternal,
}

impl core::fmt::Display for SendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SendError::AddressNotClaimed => write!(f, "source address not yet claimed"),
            SendError::CannotClaim => write!(f, "source control function cannot claim"),
            SendError::DestinationUnresolved => write!(f, "destination unresolved"),
            SendError::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds limit of {max}")
            }
            SendError::SessionInProgress => write!(f, "transport session already active"),
            SendError::NoSessionSlot => write!(f, "no free transport session slot"),
            SendError::NotInternal => write!(f, "handle is not an internal control function"),
        }
    }
}

impl std::error::Error for SendError {}

/// Transport connection abort reasons, with their wire codes.
///
/// Carried in abort control frames and in
/// [`crate::network::NetworkEvent::TransferFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Node is already engaged in a session for this PGN (code 1).
    AlreadyInSession,
    /// Required resources were not available (code 2).
    NoResources,
    /// A required response did not arrive before its deadline (code 3).
    Timeout,
    /// CTS received while a data transfer was in progress (code 4).
    CtsWhileSending,
    /// Retransmit limit reached (code 5).
    RetryLimit,
    /// Data packet received outside an active transfer (code 6).
    UnexpectedPacket,
    /// Data packet sequence number out of order (code 7).
    BadSequence,
    /// Declared message size exceeds the protocol limit (code 9).
    SizeExceeded,
    /// Unexpected data packet offset (code 250, extended transport only).
    UnexpectedOffset,
    /// Any other reason (code 251).
    Other,
}

impl AbortReason {
    /// Wire code for this reason.
    pub fn code(&self) -> u8 {
        match self {
            AbortReason::AlreadyInSession => 1,
            AbortReason::NoResources => 2,
            AbortReason::Timeout => 3,
            AbortReason::CtsWhileSending => 4,
            AbortReason::RetryLimit => 5,
            AbortReason::UnexpectedPacket => 6,
            AbortReason::BadSequence => 7,
            AbortReason::SizeExceeded => 9,
            AbortReason::UnexpectedOffset => 250,
            AbortReason::Other => 251,
        }
    }

    /// Decode a wire code; unknown codes map to [`AbortReason::Other`].
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => AbortReason::AlreadyInSession,
            2 => AbortReason::NoResources,
            3 => AbortReason::Timeout,
            4 => AbortReason::CtsWhileSending,
            5 => AbortReason::RetryLimit,
            6 => AbortReason::UnexpectedPacket,
            7 => AbortReason::BadSequence,
            9 => AbortReason::SizeExceeded,
            250 => AbortReason::UnexpectedOffset,
            _ => AbortReason::Other,
        }
    }
}
