//! Address claim arbitration over the full stack.

mod common;

use core::time::Duration;

use can_isobus::{
    Address, ClaimState, Destination, Name, NetworkEvent, Pgn, Priority, SendError,
};

use common::{capable_name, claim_fields, claimed_function, fields, harness, inject};

#[test]
fn uncontested_claim_settles_after_the_observation_window() {
    let mut h = harness();
    let handle = h
        .net
        .register_internal_function(Name::new(0x42), Address(0x80));

    // The announcement leaves immediately.
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].raw_id(), 0x18EE_FF80);
    assert_eq!(sent[0].data(), &Name::new(0x42).to_le_bytes());

    // Not authoritative until the window passes.
    assert_eq!(h.net.claim_state(handle), Some(ClaimState::Claiming));
    assert_eq!(h.net.address_of(handle), None);
    assert!(h.net.update().is_empty());

    h.clock.advance(Duration::from_millis(250));
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::AddressClaimed {
        function: handle,
        address: Address(0x80),
    }));
    assert_eq!(h.net.claim_state(handle), Some(ClaimState::Claimed));
    assert_eq!(h.net.address_of(handle), Some(Address(0x80)));
}

#[test]
fn lower_name_defends_its_address() {
    let mut h = harness();
    let handle = claimed_function(&mut h, capable_name(1), 0x80);

    inject(
        &h.net,
        claim_fields(0x80),
        &capable_name(1000).to_le_bytes(),
    );
    let events = h.net.update();
    assert!(events.is_empty());

    // Defended with a re-announcement, address kept.
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::ADDRESS_CLAIM);
    assert_eq!(sent[0].fields().source, Address(0x80));
    assert_eq!(h.net.address_of(handle), Some(Address(0x80)));
}

#[test]
fn losing_capable_name_moves_to_the_next_free_address() {
    let mut h = harness();
    let handle = claimed_function(&mut h, capable_name(1000), 0x80);

    inject(&h.net, claim_fields(0x80), &capable_name(1).to_le_bytes());
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::AddressLost {
        function: handle,
        to: capable_name(1),
    }));

    // Re-claiming one address up; not authoritative yet.
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().source, Address(0x81));
    assert_eq!(h.net.claim_state(handle), Some(ClaimState::Claiming));

    h.clock.advance(Duration::from_millis(250));
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::AddressClaimed {
        function: handle,
        address: Address(0x81),
    }));
}

#[test]
fn losing_incapable_name_parks_at_null() {
    let mut h = harness();
    // Not arbitrary-address-capable.
    let handle = claimed_function(&mut h, Name::new(0x5000), 0x80);

    inject(&h.net, claim_fields(0x80), &Name::new(0x42).to_le_bytes());
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::CannotClaim { function: handle }));
    assert_eq!(h.net.claim_state(handle), Some(ClaimState::CannotClaim));

    // Cannot-claim announcement goes out from the null address.
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().source, Address::NULL);

    // Parked functions refuse to send until explicitly re-claimed.
    assert_eq!(
        h.net.send(
            handle,
            Destination::Broadcast,
            Pgn(0x00FE00),
            Priority::DEFAULT,
            &[0; 4],
        ),
        Err(SendError::CannotClaim)
    );

    // Explicit re-claim is the only way back.
    assert!(h.net.reclaim(handle, Address(0x90)));
    h.clock.advance(Duration::from_millis(250));
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::AddressClaimed {
        function: handle,
        address: Address(0x90),
    }));
}

#[test]
fn request_for_address_claimed_is_answered() {
    let mut h = harness();
    claimed_function(&mut h, Name::new(0x42), 0x80);

    // Broadcast request for the address-claim parameter group.
    inject(
        &h.net,
        fields(Pgn::REQUEST, 0x26, 0xFF),
        &[0x00, 0xEE, 0x00],
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::ADDRESS_CLAIM);
    assert_eq!(sent[0].fields().source, Address(0x80));
    assert_eq!(sent[0].data(), &Name::new(0x42).to_le_bytes());
}

#[test]
fn release_announces_the_null_address() {
    let mut h = harness();
    let handle = claimed_function(&mut h, Name::new(0x42), 0x80);

    assert!(h.net.release_address(handle));
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::ADDRESS_CLAIM);
    assert_eq!(sent[0].fields().source, Address::NULL);
    assert_eq!(h.net.address_of(handle), None);
}

#[test]
fn send_before_settling_is_rejected() {
    let mut h = harness();
    let handle = h
        .net
        .register_internal_function(Name::new(0x42), Address(0x80));
    assert_eq!(
        h.net.send(
            handle,
            Destination::Broadcast,
            Pgn(0x00FE00),
            Priority::DEFAULT,
            &[0; 4],
        ),
        Err(SendError::AddressNotClaimed)
    );
}
