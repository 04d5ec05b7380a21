//! Network manager routing, handler lifecycle and the driver boundary.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use can_isobus::{
    Address, Destination, Message, NameBuilder, NameField, NameFilter, NetworkEvent, Pgn,
    Priority, SendError,
};

use common::{capable_name, claim_fields, claimed_function, fields, harness, inject, Harness};

fn recording_handler(h: &mut Harness, pgn: Option<Pgn>) -> Rc<RefCell<Vec<Message>>> {
    let received = Rc::new(RefCell::new(Vec::new()));
    let record = received.clone();
    h.net.register_handler(pgn, move |msg| {
        record.borrow_mut().push(msg.clone());
    });
    received
}

#[test]
fn short_payload_leaves_as_a_single_frame() {
    let mut h = harness();
    let ecu = claimed_function(&mut h, capable_name(7), 0x80);

    let transfer = h
        .net
        .send(
            ecu,
            Destination::Address(Address(0x26)),
            Pgn(0x00EF00),
            Priority::DEFAULT,
            &[1, 2, 3, 4, 5, 6, 7, 8],
        )
        .unwrap();
    assert!(transfer.is_none());

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    let f = sent[0].fields();
    assert_eq!(f.pgn, Pgn(0x00EF00));
    assert_eq!(f.source, Address(0x80));
    assert_eq!(f.destination, Address(0x26));
    assert_eq!(f.priority, Priority::DEFAULT);
    assert_eq!(sent[0].data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn broadcast_and_addressed_frames_are_routed_to_handlers() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, None);

    // PDU2 traffic is inherently broadcast.
    inject(&h.net, fields(Pgn(0x00FECA), 0x26, 0xFF), &[9; 8]);
    // PDU1 traffic addressed to us.
    inject(&h.net, fields(Pgn(0x00EF00), 0x26, 0x80), &[7; 8]);
    // PDU1 traffic addressed to somebody else.
    inject(&h.net, fields(Pgn(0x00EF00), 0x26, 0x50), &[5; 8]);
    h.net.update();

    let received = received.borrow();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].pgn, Pgn(0x00FECA));
    assert!(received[0].is_broadcast());
    assert_eq!(received[1].destination, Address(0x80));
}

#[test]
fn pgn_filtered_handler_sees_only_its_group() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, Some(Pgn(0x00FECA)));

    inject(&h.net, fields(Pgn(0x00FECA), 0x26, 0xFF), &[1; 8]);
    inject(&h.net, fields(Pgn(0x00FEE5), 0x26, 0xFF), &[2; 8]);
    h.net.update();

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].pgn, Pgn(0x00FECA));
}

#[test]
fn source_names_resolve_through_the_address_table() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, None);

    let remote = capable_name(99);
    inject(&h.net, claim_fields(0x26), &remote.to_le_bytes());
    inject(&h.net, fields(Pgn(0x00FECA), 0x26, 0xFF), &[1; 8]);
    h.net.update();

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].source_name, Some(remote));
}

#[test]
fn partners_resolve_on_matching_claims() {
    let mut h = harness();
    let ecu = claimed_function(&mut h, capable_name(7), 0x80);
    let partner = h
        .net
        .register_partner(vec![NameFilter::new(NameField::Function, 0x1D)]);
    assert_eq!(h.net.address_of(partner), None);
    assert_eq!(
        h.net.send(
            ecu,
            Destination::Function(partner),
            Pgn(0x00E600),
            Priority::DEFAULT,
            &[0; 4],
        ),
        Err(SendError::DestinationUnresolved)
    );

    let display = NameBuilder::new()
        .identity_number(12)
        .function(0x1D)
        .build();
    inject(&h.net, claim_fields(0x26), &display.to_le_bytes());
    h.net.update();
    assert_eq!(h.net.address_of(partner), Some(Address(0x26)));

    h.net
        .send(
            ecu,
            Destination::Function(partner),
            Pgn(0x00E600),
            Priority::DEFAULT,
            &[0; 4],
        )
        .unwrap();
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().destination, Address(0x26));
}

#[test]
fn handler_removal_takes_effect_on_the_next_cycle() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    let received = Rc::new(RefCell::new(0usize));
    let record = received.clone();
    let id = h.net.register_handler(None, move |_| {
        *record.borrow_mut() += 1;
    });

    inject(&h.net, fields(Pgn(0x00FECA), 0x26, 0xFF), &[0; 8]);
    h.net.update();
    assert_eq!(*received.borrow(), 1);

    h.net.unregister_handler(id);
    inject(&h.net, fields(Pgn(0x00FECA), 0x26, 0xFF), &[0; 8]);
    h.net.update();
    assert_eq!(*received.borrow(), 1);
}

#[test]
fn full_sink_is_reported_as_a_dropped_frame() {
    let mut h = harness();
    let ecu = claimed_function(&mut h, capable_name(7), 0x80);

    h.sink.set_accept(false);
    h.net
        .send(
            ecu,
            Destination::Broadcast,
            Pgn(0x00FECA),
            Priority::DEFAULT,
            &[0; 8],
        )
        .unwrap();
    let events = h.net.update();
    assert!(events.contains(&NetworkEvent::FrameDropped));
}

#[test]
fn inbound_queue_is_bounded() {
    let h = harness();
    let injector = h.net.frame_injector();
    let frame =
        can_isobus::Frame::from_fields(fields(Pgn(0x00FECA), 0x26, 0xFF), &[0; 8]).unwrap();
    let depth = h.net.config().inbound_queue_depth;
    for _ in 0..depth {
        assert!(injector.inject(frame));
    }
    assert!(!injector.inject(frame));
}
