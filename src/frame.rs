//! Raw CAN frame type and the 29-bit identifier codec.
//!
//! Every frame this stack exchanges with a driver is an extended-id CAN 2.0
//! frame. The 29-bit identifier packs, most significant first: priority
//! (3 bits), extended data page (1), data page (1), PDU format (8),
//! PDU specific (8) and source address (8). When the PDU format byte is below
//! 0xF0 (PDU1) the PDU-specific byte is a destination address; otherwise
//! (PDU2) it extends the PGN and the frame is inherently broadcast.

use embedded_can::{ExtendedId, Frame as EmbeddedFrame, Id as EmbeddedId};

use crate::address::Address;

/// A parameter group number: the message-type selector carried in the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pgn(pub u32);

impl Pgn {
    /// Address claim announcement (payload: the claiming NAME).
    pub const ADDRESS_CLAIM: Pgn = Pgn(0x00EE00);
    /// Request for a parameter group (payload: the requested PGN).
    pub const REQUEST: Pgn = Pgn(0x00EA00);
    /// Transport protocol connection management (RTS/CTS/BAM/EOMA/Abort).
    pub const TP_CM: Pgn = Pgn(0x00EC00);
    /// Transport protocol data transfer.
    pub const TP_DT: Pgn = Pgn(0x00EB00);
    /// Extended transport protocol connection management.
    pub const ETP_CM: Pgn = Pgn(0x00C800);
    /// Extended transport protocol data transfer.
    pub const ETP_DT: Pgn = Pgn(0x00C700);

    /// Whether frames carrying this PGN address a specific destination.
    pub fn is_destination_specific(&self) -> bool {
        ((self.0 >> 8) & 0xFF) < 0xF0
    }
}

/// Message priority, 0 (highest) through 7 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Priority {
    /// Default priority for most application traffic.
    pub const DEFAULT: Priority = Priority(6);
    /// Priority used by the transport protocol frames.
    pub const TRANSPORT: Priority = Priority(7);
}

/// Decoded fields of a 29-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFields {
    /// 3-bit priority.
    pub priority: Priority,
    /// Parameter group number (destination byte masked out for PDU1 groups).
    pub pgn: Pgn,
    /// Source address.
    pub source: Address,
    /// Destination address; [`Address::BROADCAST`] for PDU2 groups.
    pub destination: Address,
}

impl IdFields {
    /// Decode a raw 29-bit identifier.
    pub fn decode(id: u32) -> Self {
        let priority = Priority(((id >> 26) & 0x07) as u8);
        let source = Address((id & 0xFF) as u8);
        let pf = (id >> 16) & 0xFF;
        let ps = (id >> 8) & 0xFF;
        // Data page and extended data page ride along in bits 24/25.
        let dp = (id >> 24) & 0x03;
        let (pgn, destination) = if pf < 0xF0 {
            (Pgn((dp << 16) | (pf << 8)), Address(ps as u8))
        } else {
            (Pgn((dp << 16) | (pf << 8) | ps), Address::BROADCAST)
        };
        Self {
            priority,
            pgn,
            source,
            destination,
        }
    }

    /// Encode these fields back into a raw 29-bit identifier.
    pub fn encode(&self) -> u32 {
        let mut id = u32::from(self.priority.0 & 0x07) << 26;
        id |= (self.pgn.0 & 0x3_FF00) << 8;
        if self.pgn.is_destination_specific() {
            id |= u32::from(self.destination.0) << 8;
        } else {
            id |= (self.pgn.0 & 0xFF) << 8;
        }
        id | u32::from(self.source.0)
    }
}

/// An extended-id CAN 2.0 frame with 0-8 data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    id: u32,
    data: [u8; 8],
    dlc: u8,
}

impl Frame {
    /// Build a frame from a raw 29-bit identifier and payload.
    ///
    /// Returns `None` when the payload exceeds 8 bytes or the identifier does
    /// not fit in 29 bits.
    pub fn from_raw(id: u32, data: &[u8]) -> Option<Self> {
        if data.len() > 8 || id > ExtendedId::MAX.as_raw() {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            data: buf,
            dlc: data.len() as u8,
        })
    }

    /// Build a frame from decoded identifier fields and payload.
    pub fn from_fields(fields: IdFields, data: &[u8]) -> Option<Self> {
        Self::from_raw(fields.encode(), data)
    }

    /// The raw 29-bit identifier.
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    /// Decode the identifier fields.
    pub fn fields(&self) -> IdFields {
        IdFields::decode(self.id)
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

impl EmbeddedFrame for Frame {
    fn new(id: impl Into<EmbeddedId>, data: &[u8]) -> Option<Self> {
        match id.into() {
            EmbeddedId::Extended(ext) => Self::from_raw(ext.as_raw(), data),
            // 11-bit identifiers cannot carry the PGN/address fields.
            EmbeddedId::Standard(_) => None,
        }
    }

    fn new_remote(_id: impl Into<EmbeddedId>, _dlc: usize) -> Option<Self> {
        // Remote frames have no role in this protocol family.
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> EmbeddedId {
        // from_raw validated the range at construction.
        EmbeddedId::Extended(ExtendedId::new(self.id).unwrap_or(ExtendedId::ZERO))
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}
