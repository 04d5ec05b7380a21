//! Stack configuration.
//!
//! The timing constants default to the values mandated by the wire
//! specification (ISO 11783-3 / J1939-21). They are load-bearing for
//! interoperability; change them only for testing.

use core::time::Duration;

use crate::address::Address;

/// Configuration for a [`crate::network::NetworkManager`].
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// How long a claiming control function observes the bus for a competing
    /// claim before considering its address authoritative.
    pub claim_settle_window: Duration,
    /// Candidate pool scanned by arbitrary-address-capable functions after
    /// losing arbitration (inclusive bounds, the self-configurable range).
    pub claim_range: (Address, Address),
    /// Receiver: maximum gap between consecutive data packets while more of
    /// the current burst is outstanding (T1).
    pub t1_data_gap: Duration,
    /// Receiver: maximum wait for the first data packet after sending a CTS
    /// (T2).
    pub t2_cts_to_data: Duration,
    /// Sender: maximum wait for a CTS or end-of-message acknowledge after the
    /// last data packet of a burst (T3).
    pub t3_response_wait: Duration,
    /// Sender: maximum time the receiver may hold the connection with CTS(0)
    /// before a fresh CTS must arrive (T4).
    pub t4_cts_hold: Duration,
    /// Minimum interval between broadcast data packets.
    pub bam_packet_interval: Duration,
    /// How many zero-packet (hold) CTS frames a sender tolerates before
    /// aborting.
    pub cts_retry_limit: u8,
    /// Number of data packets granted per CTS when receiving.
    pub cts_packets_per_burst: u8,
    /// Maximum concurrent transport sessions per direction.
    pub max_sessions: usize,
    /// Capacity of the bounded inbound frame queue the boundary writes into.
    pub inbound_queue_depth: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            claim_settle_window: Duration::from_millis(250),
            claim_range: (Address(0x80), Address(0xF7)),
            t1_data_gap: Duration::from_millis(750),
            t2_cts_to_data: Duration::from_millis(1250),
            t3_response_wait: Duration::from_millis(1250),
            t4_cts_hold: Duration::from_millis(1050),
            bam_packet_interval: Duration::from_millis(50),
            cts_retry_limit: 3,
            cts_packets_per_burst: 16,
            max_sessions: 16,
            inbound_queue_depth: 64,
        }
    }
}

impl NetworkConfig {
    /// Reject configurations the protocol cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.claim_range.0.is_valid() || !self.claim_range.1.is_valid() {
            return Err(ConfigError::InvalidClaimRange);
        }
        if self.claim_range.0 > self.claim_range.1 {
            return Err(ConfigError::InvalidClaimRange);
        }
        if self.cts_packets_per_burst == 0 {
            return Err(ConfigError::ZeroBurst);
        }
        if self.max_sessions == 0 || self.inbound_queue_depth == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

/// Rejected [`NetworkConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Claim range bounds are unusable or reversed.
    InvalidClaimRange,
    /// CTS burst size must be at least one packet.
    ZeroBurst,
    /// Session table and inbound queue must have capacity.
    ZeroCapacity,
}
