//! Receive-side session state and reassembly.

use crate::errors::AbortReason;

use super::{Protocol, SessionKey, SEGMENT_BYTES};

/// Result of feeding one data packet into a receive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecvOutcome {
    /// Packet accepted; more of the current burst outstanding.
    Accepted,
    /// Packet accepted and the granted burst is exhausted; a new CTS is due.
    BurstDone,
    /// Packet accepted and the declared byte count has been reached.
    Completed,
    /// Protocol violation; the session must be torn down.
    Violation(AbortReason),
}

/// One inbound multi-packet transfer being reassembled.
#[derive(Debug)]
pub(crate) struct RecvSession<I> {
    pub(crate) protocol: Protocol,
    pub(crate) key: SessionKey,
    /// Declared total, fixed at session creation.
    pub(crate) total_bytes: u32,
    pub(crate) total_packets: u32,
    /// Sender's per-burst limit from the RTS (0xFF = unlimited).
    pub(crate) max_per_burst: u8,
    /// Next absolute data packet expected, 1-based.
    pub(crate) next_packet: u32,
    /// ETP: packets covered before the burst announced by the last offset
    /// frame; 0 for TP, where sequence numbers are absolute.
    pub(crate) offset_base: u32,
    /// Packets left in the granted burst (unused for broadcast).
    pub(crate) burst_remaining: u8,
    /// Whether the session saw an offset frame for the pending burst (ETP).
    pub(crate) offset_seen: bool,
    pub(crate) deadline: I,
    data: Vec<u8>,
}

impl<I: Copy> RecvSession<I> {
    pub(crate) fn new(
        protocol: Protocol,
        key: SessionKey,
        total_bytes: u32,
        total_packets: u32,
        max_per_burst: u8,
        deadline: I,
    ) -> Self {
        Self {
            protocol,
            key,
            total_bytes,
            total_packets,
            max_per_burst,
            next_packet: 1,
            offset_base: 0,
            burst_remaining: 0,
            offset_seen: false,
            deadline,
            data: Vec::with_capacity(total_bytes as usize),
        }
    }

    /// Packets to grant in the next CTS.
    pub(crate) fn next_grant(&self, configured_burst: u8) -> u8 {
        let remaining = self.total_packets - (self.next_packet - 1);
        let grant = u32::from(configured_burst.min(self.max_per_burst));
        grant.min(remaining).min(255) as u8
    }

    /// Feed one data packet. `sequence` is the raw sequence byte from the
    /// frame; for ETP it is relative to the current offset base.
    pub(crate) fn accept_packet(&mut self, sequence: u8, payload: &[u8]) -> RecvOutcome {
        if self.protocol == Protocol::Extended && !self.offset_seen {
            return RecvOutcome::Violation(AbortReason::UnexpectedOffset);
        }
        let absolute = self.offset_base + u32::from(sequence);
        if absolute != self.next_packet {
            return RecvOutcome::Violation(AbortReason::BadSequence);
        }
        if absolute > self.total_packets {
            return RecvOutcome::Violation(AbortReason::UnexpectedPacket);
        }

        // Trailing bytes of the final packet beyond the declared total are
        // padding: discard, never append.
        let remaining = self.total_bytes as usize - self.data.len();
        let take = payload.len().min(SEGMENT_BYTES).min(remaining);
        if take < remaining.min(SEGMENT_BYTES) {
            // Short data packet cannot fill its slot of the message.
            return RecvOutcome::Violation(AbortReason::UnexpectedPacket);
        }
        self.data.extend_from_slice(&payload[..take]);
        self.next_packet = absolute + 1;

        if self.data.len() >= self.total_bytes as usize {
            return RecvOutcome::Completed;
        }
        if self.protocol != Protocol::Bam {
            self.burst_remaining = self.burst_remaining.saturating_sub(1);
            if self.burst_remaining == 0 {
                if self.protocol == Protocol::Extended {
                    self.offset_seen = false;
                }
                return RecvOutcome::BurstDone;
            }
        }
        RecvOutcome::Accepted
    }

    /// Record the offset frame that precedes an ETP burst.
    pub(crate) fn set_offset(&mut self, packets: u8, offset: u32) -> Result<(), AbortReason> {
        if offset + 1 != self.next_packet {
            return Err(AbortReason::UnexpectedOffset);
        }
        self.offset_base = offset;
        self.burst_remaining = packets;
        self.offset_seen = true;
        Ok(())
    }

    /// The assembled payload; call only after [`RecvOutcome::Completed`].
    pub(crate) fn into_payload(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn bytes_received(&self) -> usize {
        self.data.len()
    }
}
