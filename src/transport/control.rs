//! Encode and decode transport connection-management frames.
//!
//! Both connection-management PGNs carry an 8-byte payload whose first byte
//! selects the variant and whose last three bytes name the PGN being
//! transported (little endian). The standard protocol (TP) counts bytes in a
//! `u16` and packets in a `u8`; the extended protocol (ETP) counts bytes in a
//! `u32` and packets in a `u24`.

use crate::errors::AbortReason;
use crate::frame::Pgn;

// TP.CM control bytes.
const CB_RTS: u8 = 16;
const CB_CTS: u8 = 17;
const CB_EOM_ACK: u8 = 19;
const CB_BAM: u8 = 32;
const CB_ABORT: u8 = 255;

// ETP.CM control bytes.
const CB_EXT_RTS: u8 = 20;
const CB_EXT_CTS: u8 = 21;
const CB_EXT_DPO: u8 = 22;
const CB_EXT_EOM_ACK: u8 = 23;

/// A decoded connection-management frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlMessage {
    /// TP request to send (directed announce).
    RequestToSend {
        total: u16,
        packets: u8,
        /// Most packets the sender accepts per CTS; 0xFF means no limit.
        max_per_burst: u8,
        pgn: Pgn,
    },
    /// TP clear to send: grant of `packets` starting at `next_packet`.
    ClearToSend {
        packets: u8,
        next_packet: u8,
        pgn: Pgn,
    },
    /// TP end-of-message acknowledge.
    EndOfMessage { total: u16, packets: u8, pgn: Pgn },
    /// Broadcast announce message.
    Broadcast { total: u16, packets: u8, pgn: Pgn },
    /// Connection abort, either direction.
    Abort { reason: AbortReason, pgn: Pgn },
    /// ETP request to send.
    ExtRequestToSend { total: u32, pgn: Pgn },
    /// ETP clear to send: grant of `packets` starting at absolute packet
    /// `next_packet`.
    ExtClearToSend {
        packets: u8,
        next_packet: u32,
        pgn: Pgn,
    },
    /// ETP data packet offset: the next `packets` data frames carry sequence
    /// numbers relative to `offset` packets.
    ExtOffset { packets: u8, offset: u32, pgn: Pgn },
    /// ETP end-of-message acknowledge.
    ExtEndOfMessage { total: u32, pgn: Pgn },
}

fn pgn_bytes(pgn: Pgn) -> [u8; 3] {
    [
        (pgn.0 & 0xFF) as u8,
        ((pgn.0 >> 8) & 0xFF) as u8,
        ((pgn.0 >> 16) & 0xFF) as u8,
    ]
}

fn pgn_from(bytes: &[u8]) -> Pgn {
    Pgn(u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16))
}

fn u24_from(bytes: &[u8]) -> u32 {
    u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16)
}

impl ControlMessage {
    /// Encode into an 8-byte connection-management payload.
    pub(crate) fn encode(&self) -> [u8; 8] {
        let mut buf = [0xFFu8; 8];
        match *self {
            ControlMessage::RequestToSend {
                total,
                packets,
                max_per_burst,
                pgn,
            } => {
                buf[0] = CB_RTS;
                buf[1..3].copy_from_slice(&total.to_le_bytes());
                buf[3] = packets;
                buf[4] = max_per_burst;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::ClearToSend {
                packets,
                next_packet,
                pgn,
            } => {
                buf[0] = CB_CTS;
                buf[1] = packets;
                buf[2] = next_packet;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::EndOfMessage {
                total,
                packets,
                pgn,
            } => {
                buf[0] = CB_EOM_ACK;
                buf[1..3].copy_from_slice(&total.to_le_bytes());
                buf[3] = packets;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::Broadcast {
                total,
                packets,
                pgn,
            } => {
                buf[0] = CB_BAM;
                buf[1..3].copy_from_slice(&total.to_le_bytes());
                buf[3] = packets;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::Abort { reason, pgn } => {
                buf[0] = CB_ABORT;
                buf[1] = reason.code();
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::ExtRequestToSend { total, pgn } => {
                buf[0] = CB_EXT_RTS;
                buf[1..5].copy_from_slice(&total.to_le_bytes());
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::ExtClearToSend {
                packets,
                next_packet,
                pgn,
            } => {
                buf[0] = CB_EXT_CTS;
                buf[1] = packets;
                buf[2] = (next_packet & 0xFF) as u8;
                buf[3] = ((next_packet >> 8) & 0xFF) as u8;
                buf[4] = ((next_packet >> 16) & 0xFF) as u8;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::ExtOffset {
                packets,
                offset,
                pgn,
            } => {
                buf[0] = CB_EXT_DPO;
                buf[1] = packets;
                buf[2] = (offset & 0xFF) as u8;
                buf[3] = ((offset >> 8) & 0xFF) as u8;
                buf[4] = ((offset >> 16) & 0xFF) as u8;
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
            ControlMessage::ExtEndOfMessage { total, pgn } => {
                buf[0] = CB_EXT_EOM_ACK;
                buf[1..5].copy_from_slice(&total.to_le_bytes());
                buf[5..8].copy_from_slice(&pgn_bytes(pgn));
            }
        }
        buf
    }

    /// Decode a connection-management payload.
    ///
    /// `extended` selects between the TP and ETP variants (same control byte
    /// space, different field layouts). Returns `None` for unknown control
    /// bytes or short payloads.
    pub(crate) fn decode(extended: bool, data: &[u8]) -> Option<ControlMessage> {
        if data.len() < 8 {
            return None;
        }
        let pgn = pgn_from(&data[5..8]);
        if extended {
            return match data[0] {
                CB_EXT_RTS => Some(ControlMessage::ExtRequestToSend {
                    total: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
                    pgn,
                }),
                CB_EXT_CTS => Some(ControlMessage::ExtClearToSend {
                    packets: data[1],
                    next_packet: u24_from(&data[2..5]),
                    pgn,
                }),
                CB_EXT_DPO => Some(ControlMessage::ExtOffset {
                    packets: data[1],
                    offset: u24_from(&data[2..5]),
                    pgn,
                }),
                CB_EXT_EOM_ACK => Some(ControlMessage::ExtEndOfMessage {
                    total: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
                    pgn,
                }),
                CB_ABORT => Some(ControlMessage::Abort {
                    reason: AbortReason::from_code(data[1]),
                    pgn,
                }),
                _ => None,
            };
        }
        match data[0] {
            CB_RTS => Some(ControlMessage::RequestToSend {
                total: u16::from_le_bytes([data[1], data[2]]),
                packets: data[3],
                max_per_burst: data[4],
                pgn,
            }),
            CB_CTS => Some(ControlMessage::ClearToSend {
                packets: data[1],
                next_packet: data[2],
                pgn,
            }),
            CB_EOM_ACK => Some(ControlMessage::EndOfMessage {
                total: u16::from_le_bytes([data[1], data[2]]),
                packets: data[3],
                pgn,
            }),
            CB_BAM => Some(ControlMessage::Broadcast {
                total: u16::from_le_bytes([data[1], data[2]]),
                packets: data[3],
                pgn,
            }),
            CB_ABORT => Some(ControlMessage::Abort {
                reason: AbortReason::from_code(data[1]),
                pgn,
            }),
            _ => None,
        }
    }
}
