//! Bus address model.
//!
//! Addresses 0..=253 are claimable; 254 is the null address used by control
//! functions that cannot claim; 255 addresses every node on the bus.

/// An 8-bit bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u8);

impl Address {
    /// The null address (254): source of cannot-claim announcements.
    pub const NULL: Address = Address(0xFE);
    /// The global address (255): destination for broadcast traffic.
    pub const BROADCAST: Address = Address(0xFF);

    /// Whether this address may be claimed and used as a source.
    pub fn is_valid(&self) -> bool {
        self.0 < 0xFE
    }

    /// Whether this is the global (broadcast) address.
    pub fn is_broadcast(&self) -> bool {
        self.0 == 0xFF
    }

    /// Whether this is the null (cannot-claim) address.
    pub fn is_null(&self) -> bool {
        self.0 == 0xFE
    }
}

impl From<u8> for Address {
    fn from(raw: u8) -> Self {
        Address(raw)
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}
