//! The 64-bit ISO NAME: the structured capability descriptor that identifies a
//! control function on the bus.
//!
//! A NAME is immutable once constructed. Its raw 64-bit value doubles as the
//! address-arbitration tie-break: when two control functions claim the same
//! address, the numerically lower NAME keeps it.

/// 64-bit structured identifier for a control function.
///
/// Field layout follows ISO 11783-5, least significant bit first:
/// identity number (21), manufacturer code (11), ECU instance (3), function
/// instance (5), function (8), reserved (1), device class (7), device class
/// instance (4), industry group (3), arbitrary-address-capable flag (1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(u64);

impl Name {
    /// Wrap a raw 64-bit NAME value.
    pub const fn new(raw: u64) -> Self {
        Name(raw)
    }

    /// The raw 64-bit value.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Usually-unique serial number assigned by the manufacturer (21 bits).
    pub fn identity_number(&self) -> u32 {
        (self.0 & 0x1F_FFFF) as u32
    }

    /// SAE-assigned manufacturer code (11 bits).
    pub fn manufacturer_code(&self) -> u16 {
        ((self.0 >> 21) & 0x7FF) as u16
    }

    /// Which ECU of several with the same function this is (3 bits).
    pub fn ecu_instance(&self) -> u8 {
        ((self.0 >> 32) & 0x07) as u8
    }

    /// Which instance of the function this is (5 bits).
    pub fn function_instance(&self) -> u8 {
        ((self.0 >> 35) & 0x1F) as u8
    }

    /// The function performed, per the ISO function table (8 bits).
    pub fn function(&self) -> u8 {
        ((self.0 >> 40) & 0xFF) as u8
    }

    /// Device class within the industry group (7 bits).
    pub fn device_class(&self) -> u8 {
        ((self.0 >> 49) & 0x7F) as u8
    }

    /// Which instance of the device class this is (4 bits).
    pub fn device_class_instance(&self) -> u8 {
        ((self.0 >> 56) & 0x0F) as u8
    }

    /// Industry group, e.g. agricultural or on-highway (3 bits).
    pub fn industry_group(&self) -> u8 {
        ((self.0 >> 60) & 0x07) as u8
    }

    /// Whether this control function may select a different address when it
    /// loses arbitration. Non-capable functions park at the null address
    /// instead of retrying.
    pub fn arbitrary_address_capable(&self) -> bool {
        (self.0 >> 63) & 0x01 == 1
    }

    /// Wire form of the NAME as carried in an address-claim payload
    /// (little endian, identity number in the low bytes).
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Parse the wire form of a NAME from an address-claim payload.
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Name(u64::from_le_bytes(bytes))
    }
}

impl From<u64> for Name {
    fn from(raw: u64) -> Self {
        Name(raw)
    }
}

/// Field-by-field constructor for [`Name`].
///
/// Out-of-range values are masked to their field width.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameBuilder {
    raw: u64,
}

impl NameBuilder {
    /// Start from an all-zero NAME.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, shift: u32, mask: u64, value: u64) -> Self {
        self.raw = (self.raw & !(mask << shift)) | ((value & mask) << shift);
        self
    }

    /// Set the 21-bit identity number.
    pub fn identity_number(self, value: u32) -> Self {
        self.set(0, 0x1F_FFFF, value as u64)
    }

    /// Set the 11-bit manufacturer code.
    pub fn manufacturer_code(self, value: u16) -> Self {
        self.set(21, 0x7FF, value as u64)
    }

    /// Set the 3-bit ECU instance.
    pub fn ecu_instance(self, value: u8) -> Self {
        self.set(32, 0x07, value as u64)
    }

    /// Set the 5-bit function instance.
    pub fn function_instance(self, value: u8) -> Self {
        self.set(35, 0x1F, value as u64)
    }

    /// Set the 8-bit function code.
    pub fn function(self, value: u8) -> Self {
        self.set(40, 0xFF, value as u64)
    }

    /// Set the 7-bit device class.
    pub fn device_class(self, value: u8) -> Self {
        self.set(49, 0x7F, value as u64)
    }

    /// Set the 4-bit device class instance.
    pub fn device_class_instance(self, value: u8) -> Self {
        self.set(56, 0x0F, value as u64)
    }

    /// Set the 3-bit industry group.
    pub fn industry_group(self, value: u8) -> Self {
        self.set(60, 0x07, value as u64)
    }

    /// Mark the control function as arbitrary-address-capable.
    pub fn arbitrary_address_capable(self, capable: bool) -> Self {
        self.set(63, 0x01, capable as u64)
    }

    /// Finish building.
    pub fn build(self) -> Name {
        Name(self.raw)
    }
}

/// A NAME field that a [`NameFilter`] can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    /// 21-bit identity number.
    IdentityNumber,
    /// 11-bit manufacturer code.
    ManufacturerCode,
    /// 3-bit ECU instance.
    EcuInstance,
    /// 5-bit function instance.
    FunctionInstance,
    /// 8-bit function code.
    Function,
    /// 7-bit device class.
    DeviceClass,
    /// 4-bit device class instance.
    DeviceClassInstance,
    /// 3-bit industry group.
    IndustryGroup,
    /// Arbitrary-address-capable flag (expected value 0 or 1).
    ArbitraryAddressCapable,
}

/// One (field, expected value) predicate against a candidate NAME.
///
/// Partnered control functions hold a list of these; a candidate matches only
/// when every filter in the list matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameFilter {
    /// Which field to compare.
    pub field: NameField,
    /// Expected value of that field.
    pub value: u32,
}

impl NameFilter {
    /// Build a filter for one field.
    pub fn new(field: NameField, value: u32) -> Self {
        Self { field, value }
    }

    /// Whether the candidate NAME satisfies this predicate.
    pub fn matches(&self, name: &Name) -> bool {
        let actual = match self.field {
            NameField::IdentityNumber => name.identity_number(),
            NameField::ManufacturerCode => u32::from(name.manufacturer_code()),
            NameField::EcuInstance => u32::from(name.ecu_instance()),
            NameField::FunctionInstance => u32::from(name.function_instance()),
            NameField::Function => u32::from(name.function()),
            NameField::DeviceClass => u32::from(name.device_class()),
            NameField::DeviceClassInstance => u32::from(name.device_class_instance()),
            NameField::IndustryGroup => u32::from(name.industry_group()),
            NameField::ArbitraryAddressCapable => u32::from(name.arbitrary_address_capable()),
        };
        actual == self.value
    }
}

/// Evaluate a filter list conjunctively against a candidate NAME.
pub fn filters_match(filters: &[NameFilter], name: &Name) -> bool {
    filters.iter().all(|f| f.matches(name))
}
