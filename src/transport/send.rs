//! Send-side session state.

use crate::frame::Pgn;

use super::{Protocol, SessionKey, SEGMENT_BYTES};

/// Opaque handle identifying an in-flight outbound transfer.
///
/// Returned from [`crate::network::NetworkManager::send`] for multi-packet
/// payloads; completion and failure events carry it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendHandle(pub(crate) u32);

/// Phase of an outbound session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendState<I> {
    /// Broadcast streaming; next data packet due at the instant.
    Streaming { next_due: I },
    /// Waiting for a CTS. `holds` counts zero-packet grants seen.
    WaitingForCts { deadline: I, holds: u8 },
    /// A granted burst is being emitted.
    Bursting { remaining: u8 },
    /// All data sent; waiting for the end-of-message acknowledge.
    WaitingForAck { deadline: I },
}

/// One outbound multi-packet transfer.
#[derive(Debug)]
pub(crate) struct SendSession<I> {
    pub(crate) handle: SendHandle,
    pub(crate) protocol: Protocol,
    pub(crate) key: SessionKey,
    pub(crate) state: SendState<I>,
    data: Vec<u8>,
    /// Next absolute data packet to emit, 1-based.
    pub(crate) next_packet: u32,
    /// ETP: packets covered by bursts before the current one, as announced in
    /// the data packet offset frame.
    pub(crate) offset_base: u32,
}

impl<I: Copy> SendSession<I> {
    pub(crate) fn new(
        handle: SendHandle,
        protocol: Protocol,
        key: SessionKey,
        data: Vec<u8>,
        state: SendState<I>,
    ) -> Self {
        Self {
            handle,
            protocol,
            key,
            state,
            data,
            next_packet: 1,
            offset_base: 0,
        }
    }

    /// ceil(len / 7): number of data packets in the whole transfer.
    pub(crate) fn total_packets(&self) -> u32 {
        (self.data.len() as u32).div_ceil(SEGMENT_BYTES as u32)
    }

    pub(crate) fn transported_pgn(&self) -> Pgn {
        self.key.pgn
    }

    /// Whether every data packet has been emitted.
    pub(crate) fn finished(&self) -> bool {
        self.next_packet > self.total_packets()
    }

    /// Payload of the next data packet: sequence byte (relative to the
    /// current offset base) plus up to 7 data bytes, padded to 8 with 0xFF.
    ///
    /// Advances the packet cursor.
    pub(crate) fn next_data_payload(&mut self) -> [u8; 8] {
        let mut buf = [0xFFu8; 8];
        let packet = self.next_packet;
        buf[0] = (packet - self.offset_base) as u8;
        let start = (packet as usize - 1) * SEGMENT_BYTES;
        let end = (start + SEGMENT_BYTES).min(self.data.len());
        buf[1..1 + (end - start)].copy_from_slice(&self.data[start..end]);
        self.next_packet = packet + 1;
        buf
    }
}
