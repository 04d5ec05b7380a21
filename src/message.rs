//! Application-level messages.
//!
//! A [`Message`] is one logical payload, regardless of whether it crossed the
//! bus as a single frame or as a reassembled multi-packet transfer.

use crate::address::Address;
use crate::frame::{Pgn, Priority};
use crate::name::Name;
use crate::payload::PayloadView;

/// One logical application payload, delivered to registered handlers.
#[derive(Debug, Clone)]
pub struct Message {
    /// Parameter group of the message.
    pub pgn: Pgn,
    /// Priority it was carried at.
    pub priority: Priority,
    /// Source bus address.
    pub source: Address,
    /// NAME of the source, when the address table can resolve it.
    pub source_name: Option<Name>,
    /// Destination address; [`Address::BROADCAST`] for broadcast traffic.
    pub destination: Address,
    data: Vec<u8>,
}

impl Message {
    /// Assemble a message from its parts.
    pub fn new(
        pgn: Pgn,
        priority: Priority,
        source: Address,
        source_name: Option<Name>,
        destination: Address,
        data: Vec<u8>,
    ) -> Self {
        Self {
            pgn,
            priority,
            source,
            source_name,
            destination,
            data,
        }
    }

    /// Bounds-checked view of the payload, valid for the borrow of `self`.
    pub fn payload(&self) -> PayloadView<'_> {
        PayloadView::new(&self.data)
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the message was addressed to every node.
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_broadcast()
    }

    /// Consume the message, keeping the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.data
    }
}
