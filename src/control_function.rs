//! Control functions and the bus address table.
//!
//! A control function is a logical bus participant. Internal functions are
//! owned by this stack and claim their own addresses; partnered functions are
//! passive match targets that resolve to whichever remote NAME currently
//! satisfies their filter list.
//!
//! The registry is read-mostly. Mutations come only from the address claim
//! engine (local claims and releases) and from observed remote claims, both of
//! which go through [`ControlFunctionRegistry::bind`] so the table invariants
//! hold at every step: at most one address per NAME, at most one NAME per
//! non-null address.

use std::collections::HashMap;

use crate::address::Address;
use crate::name::{filters_match, Name, NameFilter};

/// Opaque handle to a registered control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionHandle(pub(crate) usize);

/// Claim progress of an internal control function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// Not yet announced on the bus.
    Unclaimed,
    /// Claim announced; observing the bus for the settle window.
    Claiming,
    /// Address is authoritative for this NAME.
    Claimed,
    /// Lost arbitration without being arbitrary-address-capable. Sticky: the
    /// application must explicitly request a re-claim.
    CannotClaim,
}

/// A locally owned bus participant.
#[derive(Debug, Clone)]
pub struct InternalFunction {
    /// NAME announced in claims.
    pub name: Name,
    /// Address requested at registration.
    pub preferred_address: Address,
    /// Current address; [`Address::NULL`] until claimed.
    pub address: Address,
    /// Claim progress.
    pub state: ClaimState,
}

/// A remote participant matched by NAME filters.
#[derive(Debug, Clone)]
pub struct PartneredFunction {
    /// Conjunctive filter list a candidate NAME must satisfy.
    pub filters: Vec<NameFilter>,
    /// Currently matched remote, if any has claimed.
    pub resolved: Option<(Name, Address)>,
}

/// A bus participant: locally owned or remotely observed.
#[derive(Debug, Clone)]
pub enum ControlFunction {
    /// Locally owned; actively claims an address.
    Internal(InternalFunction),
    /// Passive match target for a remote device.
    Partnered(PartneredFunction),
}

/// Registry of control functions plus the live address table.
#[derive(Debug, Default)]
pub struct ControlFunctionRegistry {
    functions: Vec<ControlFunction>,
    by_address: HashMap<Address, Name>,
    by_name: HashMap<Name, Address>,
}

impl ControlFunctionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an internal control function. It starts unclaimed at the null
    /// address; the claim engine moves it from there.
    pub fn add_internal(&mut self, name: Name, preferred_address: Address) -> FunctionHandle {
        self.functions
            .push(ControlFunction::Internal(InternalFunction {
                name,
                preferred_address,
                address: Address::NULL,
                state: ClaimState::Unclaimed,
            }));
        FunctionHandle(self.functions.len() - 1)
    }

    /// Register a partnered control function. Resolution is lazy: the partner
    /// binds to the first already-known or future remote claim that matches.
    pub fn add_partner(&mut self, filters: Vec<NameFilter>) -> FunctionHandle {
        let resolved = self
            .by_address
            .iter()
            .find(|(_, name)| filters_match(&filters, name))
            .map(|(addr, name)| (*name, *addr));
        self.functions
            .push(ControlFunction::Partnered(PartneredFunction {
                filters,
                resolved,
            }));
        FunctionHandle(self.functions.len() - 1)
    }

    /// Look up a function by handle.
    pub fn get(&self, handle: FunctionHandle) -> Option<&ControlFunction> {
        self.functions.get(handle.0)
    }

    pub(crate) fn get_internal_mut(
        &mut self,
        handle: FunctionHandle,
    ) -> Option<&mut InternalFunction> {
        match self.functions.get_mut(handle.0) {
            Some(ControlFunction::Internal(f)) => Some(f),
            _ => None,
        }
    }

    /// Current address bound to a NAME.
    pub fn address_of(&self, name: &Name) -> Option<Address> {
        self.by_name.get(name).copied()
    }

    /// NAME currently holding an address.
    pub fn name_at(&self, address: Address) -> Option<Name> {
        self.by_address.get(&address).copied()
    }

    /// First claimed address whose NAME satisfies every filter.
    pub fn find_match(&self, filters: &[NameFilter]) -> Option<(Name, Address)> {
        self.by_address
            .iter()
            .find(|(_, name)| filters_match(filters, name))
            .map(|(addr, name)| (*name, *addr))
    }

    /// Resolved address of a partnered function, or the claimed address of an
    /// internal one.
    pub fn resolve(&self, handle: FunctionHandle) -> Option<Address> {
        match self.functions.get(handle.0)? {
            ControlFunction::Internal(f) => {
                if f.state == ClaimState::Claimed {
                    Some(f.address)
                } else {
                    None
                }
            }
            ControlFunction::Partnered(f) => f.resolved.map(|(_, addr)| addr),
        }
    }

    /// Bind `address` to `name`, displacing any stale binding either way.
    ///
    /// Returns the NAME that previously held the address, if any and
    /// different.
    pub(crate) fn bind(&mut self, address: Address, name: Name) -> Option<Name> {
        if !address.is_valid() {
            // A claim of the null address is a release announcement.
            self.release(name);
            return None;
        }
        let displaced = match self.by_address.get(&address) {
            Some(prev) if *prev != name => Some(*prev),
            _ => None,
        };
        if let Some(prev) = displaced {
            self.by_name.remove(&prev);
        }
        if let Some(old_addr) = self.by_name.insert(name, address) {
            if old_addr != address {
                self.by_address.remove(&old_addr);
            }
        }
        self.by_address.insert(address, name);
        self.refresh_partners();
        displaced
    }

    /// Remove any binding held by `name`.
    pub(crate) fn release(&mut self, name: Name) {
        if let Some(addr) = self.by_name.remove(&name) {
            self.by_address.remove(&addr);
        }
        self.refresh_partners();
    }

    /// Whether any NAME other than `name` currently holds `address`.
    pub(crate) fn is_taken_by_other(&self, address: Address, name: &Name) -> bool {
        matches!(self.by_address.get(&address), Some(holder) if holder != name)
    }

    /// Re-resolve every partnered function against the current table.
    fn refresh_partners(&mut self) {
        let mut resolutions = Vec::new();
        for (idx, function) in self.functions.iter().enumerate() {
            if let ControlFunction::Partnered(p) = function {
                let resolved = self
                    .by_address
                    .iter()
                    .find(|(_, name)| filters_match(&p.filters, name))
                    .map(|(addr, name)| (*name, *addr));
                resolutions.push((idx, resolved));
            }
        }
        for (idx, resolved) in resolutions {
            if let ControlFunction::Partnered(p) = &mut self.functions[idx] {
                p.resolved = resolved;
            }
        }
    }

    /// Scan the claim range for the next address not taken by another NAME,
    /// starting at `from` and wrapping once.
    pub(crate) fn next_free_address(
        &self,
        from: Address,
        range: (Address, Address),
        name: &Name,
    ) -> Option<Address> {
        let (lo, hi) = (range.0 .0, range.1 .0);
        let start = from.0.clamp(lo, hi);
        let span = (hi - lo) as usize + 1;
        (0..span)
            .map(|i| {
                let offset = (start - lo) as usize + 1 + i;
                Address(lo + (offset % span) as u8)
            })
            .find(|candidate| !self.is_taken_by_other(*candidate, name))
    }
}
