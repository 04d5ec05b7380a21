//! Address claim arbitration.
//!
//! One [`ClaimEngine`] runs per internal control function. The engine is a
//! pure state machine: it never touches the clock or the bus itself. The
//! network manager feeds it deadlines and competing claims and turns the
//! returned [`ClaimAction`]s into frames, registry updates and events.
//!
//! Arbitration rule: for two claims of the same address, the numerically
//! lower NAME wins. The loser either moves to its next candidate address
//! (arbitrary-address-capable) or parks at the null address, from which only
//! an explicit application re-claim recovers it.

use crate::address::Address;
use crate::control_function::ClaimState;
use crate::name::Name;

/// Instruction produced by the engine for the network manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClaimAction {
    /// Broadcast a claim announcement for `address`.
    SendClaim {
        /// Address being claimed (also the frame's source address).
        address: Address,
    },
    /// Broadcast a cannot-claim announcement from the null address.
    SendCannotClaim,
    /// The settle window elapsed uncontested; `address` is now authoritative.
    Claimed {
        /// The address now held.
        address: Address,
    },
    /// A previously claimed address was lost to a lower NAME.
    Lost {
        /// The NAME that took the address.
        to: Name,
    },
    /// Arbitration lost with no way to retry automatically.
    CannotClaim,
}

/// Per-function claim state machine.
#[derive(Debug)]
pub(crate) struct ClaimEngine<I> {
    name: Name,
    candidate: Address,
    state: ClaimState,
    settle_deadline: Option<I>,
}

impl<I: Copy + PartialOrd> ClaimEngine<I> {
    pub(crate) fn new(name: Name, preferred: Address) -> Self {
        Self {
            name,
            candidate: preferred,
            state: ClaimState::Unclaimed,
            settle_deadline: None,
        }
    }

    pub(crate) fn name(&self) -> Name {
        self.name
    }

    pub(crate) fn state(&self) -> ClaimState {
        self.state
    }

    /// Address currently claimed or being claimed; null otherwise.
    pub(crate) fn address(&self) -> Address {
        match self.state {
            ClaimState::Claimed | ClaimState::Claiming => self.candidate,
            ClaimState::Unclaimed | ClaimState::CannotClaim => Address::NULL,
        }
    }

    /// Announce the first claim and begin observing the bus.
    pub(crate) fn start(&mut self, settle_deadline: I) -> ClaimAction {
        self.state = ClaimState::Claiming;
        self.settle_deadline = Some(settle_deadline);
        ClaimAction::SendClaim {
            address: self.candidate,
        }
    }

    /// Advance the settle timer.
    pub(crate) fn poll(&mut self, now: I) -> Option<ClaimAction> {
        if self.state != ClaimState::Claiming {
            return None;
        }
        match self.settle_deadline {
            Some(deadline) if now >= deadline => {
                self.state = ClaimState::Claimed;
                self.settle_deadline = None;
                Some(ClaimAction::Claimed {
                    address: self.candidate,
                })
            }
            _ => None,
        }
    }

    /// React to a remote claim for the address this engine holds or is
    /// claiming.
    ///
    /// `next_candidate` is the manager's choice of fallback address, already
    /// checked against the address table; `None` forces the cannot-claim path
    /// even for arbitrary-address-capable NAMEs (pool exhausted).
    pub(crate) fn on_competing_claim(
        &mut self,
        other: Name,
        settle_deadline: I,
        next_candidate: Option<Address>,
    ) -> Vec<ClaimAction> {
        if !matches!(self.state, ClaimState::Claiming | ClaimState::Claimed) {
            return Vec::new();
        }
        if other == self.name {
            // Our own announcement echoed back.
            return Vec::new();
        }
        if self.name < other {
            // We win: defend the address by re-announcing. A pending settle
            // window keeps running; the competitor must move.
            return vec![ClaimAction::SendClaim {
                address: self.candidate,
            }];
        }

        let mut actions = Vec::new();
        if self.state == ClaimState::Claimed {
            actions.push(ClaimAction::Lost { to: other });
        }
        match next_candidate {
            Some(address) if self.name.arbitrary_address_capable() => {
                self.candidate = address;
                self.state = ClaimState::Claiming;
                self.settle_deadline = Some(settle_deadline);
                actions.push(ClaimAction::SendClaim { address });
            }
            _ => {
                self.state = ClaimState::CannotClaim;
                self.settle_deadline = None;
                actions.push(ClaimAction::SendCannotClaim);
                actions.push(ClaimAction::CannotClaim);
            }
        }
        actions
    }

    /// Explicit application re-claim with a fresh preferred address. The only
    /// way out of `CannotClaim`.
    pub(crate) fn restart(&mut self, preferred: Address, settle_deadline: I) -> ClaimAction {
        self.candidate = preferred;
        self.start(settle_deadline)
    }

    /// Answer a request-for-address-claimed.
    pub(crate) fn respond_to_request(&self) -> Option<ClaimAction> {
        match self.state {
            ClaimState::Claiming | ClaimState::Claimed => Some(ClaimAction::SendClaim {
                address: self.candidate,
            }),
            ClaimState::CannotClaim => Some(ClaimAction::SendCannotClaim),
            ClaimState::Unclaimed => None,
        }
    }

    /// Announce release of the address (claim of the null address) on
    /// shutdown.
    pub(crate) fn release(&mut self) -> ClaimAction {
        self.state = ClaimState::Unclaimed;
        self.settle_deadline = None;
        ClaimAction::SendCannotClaim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameBuilder;

    fn capable(raw_identity: u32) -> Name {
        NameBuilder::new()
            .identity_number(raw_identity)
            .arbitrary_address_capable(true)
            .build()
    }

    #[test]
    fn uncontested_claim_settles() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(Name::new(0x42), Address(0x80));
        assert_eq!(
            engine.start(250),
            ClaimAction::SendClaim {
                address: Address(0x80)
            }
        );
        assert_eq!(engine.poll(100), None);
        assert_eq!(
            engine.poll(250),
            Some(ClaimAction::Claimed {
                address: Address(0x80)
            })
        );
        assert_eq!(engine.state(), ClaimState::Claimed);
        assert_eq!(engine.address(), Address(0x80));
    }

    #[test]
    fn lower_name_defends_address() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(capable(1), Address(0x80));
        engine.start(250);
        engine.poll(250);
        let actions = engine.on_competing_claim(capable(2), 500, Some(Address(0x81)));
        assert_eq!(
            actions,
            vec![ClaimAction::SendClaim {
                address: Address(0x80)
            }]
        );
        assert_eq!(engine.state(), ClaimState::Claimed);
    }

    #[test]
    fn higher_capable_name_moves_to_next_candidate() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(capable(2), Address(0x80));
        engine.start(250);
        engine.poll(250);
        let actions = engine.on_competing_claim(capable(1), 500, Some(Address(0x81)));
        assert_eq!(
            actions,
            vec![
                ClaimAction::Lost { to: capable(1) },
                ClaimAction::SendClaim {
                    address: Address(0x81)
                }
            ]
        );
        assert_eq!(engine.state(), ClaimState::Claiming);
        assert_eq!(engine.address(), Address(0x81));
    }

    #[test]
    fn higher_incapable_name_parks_at_null() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(Name::new(5), Address(0x80));
        engine.start(250);
        let actions = engine.on_competing_claim(Name::new(1), 500, Some(Address(0x81)));
        assert_eq!(
            actions,
            vec![ClaimAction::SendCannotClaim, ClaimAction::CannotClaim]
        );
        assert_eq!(engine.state(), ClaimState::CannotClaim);
        assert_eq!(engine.address(), Address::NULL);

        // Sticky: timers make no further progress.
        assert_eq!(engine.poll(10_000), None);
    }

    #[test]
    fn restart_recovers_from_cannot_claim() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(Name::new(5), Address(0x80));
        engine.start(250);
        engine.on_competing_claim(Name::new(1), 500, None);
        assert_eq!(engine.state(), ClaimState::CannotClaim);

        assert_eq!(
            engine.restart(Address(0x90), 750),
            ClaimAction::SendClaim {
                address: Address(0x90)
            }
        );
        assert_eq!(engine.poll(750), Some(ClaimAction::Claimed {
            address: Address(0x90)
        }));
    }

    #[test]
    fn request_is_answered_per_state() {
        let mut engine: ClaimEngine<u64> = ClaimEngine::new(Name::new(5), Address(0x80));
        assert_eq!(engine.respond_to_request(), None);
        engine.start(250);
        assert_eq!(
            engine.respond_to_request(),
            Some(ClaimAction::SendClaim {
                address: Address(0x80)
            })
        );
        engine.on_competing_claim(Name::new(1), 500, None);
        assert_eq!(
            engine.respond_to_request(),
            Some(ClaimAction::SendCannotClaim)
        );
    }
}
