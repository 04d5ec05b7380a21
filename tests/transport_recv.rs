//! Inbound multi-packet transfers.

mod common;

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use can_isobus::{Address, Message, Pgn};

use common::{capable_name, claimed_function, fields, harness, inject, pgn_bytes, Harness};

const DATA_PGN: Pgn = Pgn(0x00EF00);

fn recording_handler(h: &mut Harness, pgn: Pgn) -> Rc<RefCell<Vec<Message>>> {
    let received = Rc::new(RefCell::new(Vec::new()));
    let record = received.clone();
    h.net.register_handler(Some(pgn), move |msg| {
        record.borrow_mut().push(msg.clone());
    });
    received
}

fn rts_for(pgn: Pgn, total: u16, packets: u8) -> [u8; 8] {
    let mut buf = [0xFFu8; 8];
    buf[0] = 16;
    buf[1..3].copy_from_slice(&total.to_le_bytes());
    buf[3] = packets;
    buf[5..8].copy_from_slice(&pgn_bytes(pgn));
    buf
}

fn rts(total: u16, packets: u8) -> [u8; 8] {
    rts_for(DATA_PGN, total, packets)
}

fn data_packet(sequence: u8, bytes: &[u8]) -> [u8; 8] {
    let mut buf = [0xFFu8; 8];
    buf[0] = sequence;
    buf[1..1 + bytes.len()].copy_from_slice(bytes);
    buf
}

#[test]
fn directed_transfer_reassembles_and_acknowledges() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(20, 3));
    h.net.update();

    // Everything granted in one burst of three.
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().destination, Address(0x26));
    assert_eq!(sent[0].data()[0], 17);
    assert_eq!(sent[0].data()[1], 3);
    assert_eq!(sent[0].data()[2], 1);

    let payload: Vec<u8> = (0..20).collect();
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(1, &payload[0..7]),
    );
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(2, &payload[7..14]),
    );
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(3, &payload[14..20]),
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 19);
    assert_eq!(u16::from_le_bytes([sent[0].data()[1], sent[0].data()[2]]), 20);

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].pgn, DATA_PGN);
    assert_eq!(received[0].source, Address(0x26));
    // Padding of the final packet never reaches the application.
    assert_eq!(received[0].payload().as_slice(), payload.as_slice());
}

#[test]
fn broadcast_transfer_reassembles_without_replies() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    let mut bam = rts(9, 2);
    bam[0] = 32;
    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0xFF), &bam);
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0xFF),
        &data_packet(1, &[1, 2, 3, 4, 5, 6, 7]),
    );
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0xFF),
        &data_packet(2, &[8, 9]),
    );
    h.net.update();

    assert_eq!(h.sink.sent_count(), 0);
    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert!(received[0].is_broadcast());
    assert_eq!(
        received[0].payload().as_slice(),
        &[1, 2, 3, 4, 5, 6, 7, 8, 9]
    );
}

#[test]
fn concurrent_announce_from_the_same_pair_is_refused() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(14, 2));
    h.net.update();
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 17);

    // Data frames carry no PGN, so a second transfer from the same pair
    // could not be told apart from the first. It must be refused, not
    // interleaved into the open session.
    let other = Pgn(0x00E800);
    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts_for(other, 7, 1));
    h.net.update();
    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 255);
    assert_eq!(sent[0].data()[1], 1);
    assert_eq!(&sent[0].data()[5..8], &pgn_bytes(other));

    // The first transfer is unharmed and delivers exactly its own bytes.
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(1, &[0xAA; 7]),
    );
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(2, &[0xAA; 7]),
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 19);
    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload().as_slice(), &[0xAA; 14]);
}

#[test]
fn out_of_order_packet_aborts_with_bad_sequence() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(20, 3));
    h.net.update();
    h.sink.take_frames();

    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(1, &[0; 7]),
    );
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(3, &[0; 7]),
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::TP_CM);
    assert_eq!(sent[0].data()[0], 255);
    assert_eq!(sent[0].data()[1], 7);
}

#[test]
fn burst_exhaustion_triggers_the_next_grant() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(280, 40));
    h.net.update();
    let sent = h.sink.take_frames();
    assert_eq!(sent[0].data()[1], 16);

    for seq in 1..=16u8 {
        inject(
            &h.net,
            fields(Pgn::TP_DT, 0x26, 0x80),
            &data_packet(seq, &[0; 7]),
        );
    }
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 17);
    assert_eq!(sent[0].data()[1], 16);
    // Continue from packet seventeen.
    assert_eq!(sent[0].data()[2], 17);
}

#[test]
fn oversized_announcement_is_refused() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(2000, 255));
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 255);
    assert_eq!(sent[0].data()[1], 9);
}

#[test]
fn data_without_a_session_is_answered_with_an_abort() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0x80),
        &data_packet(1, &[0; 7]),
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::TP_CM);
    assert_eq!(sent[0].data()[0], 255);
    assert_eq!(sent[0].data()[1], 6);
}

#[test]
fn stalled_broadcast_expires_without_a_reply() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    let mut bam = rts(20, 3);
    bam[0] = 32;
    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0xFF), &bam);
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0xFF),
        &data_packet(1, &[0; 7]),
    );
    h.net.update();

    h.clock.advance(Duration::from_millis(750));
    h.net.update();
    assert_eq!(h.sink.sent_count(), 0);
    assert!(received.borrow().is_empty());

    // The session is gone: a late packet no longer matches anything, and
    // broadcast gets no abort either.
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0xFF),
        &data_packet(2, &[0; 7]),
    );
    h.net.update();
    assert_eq!(h.sink.sent_count(), 0);
}

#[test]
fn zero_length_broadcast_announce_is_ignored() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    let mut bam = rts(0, 1);
    bam[0] = 32;
    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0xFF), &bam);
    inject(
        &h.net,
        fields(Pgn::TP_DT, 0x26, 0xFF),
        &data_packet(1, &[0; 7]),
    );
    h.net.update();

    // No session was opened: no empty message, and broadcast data gets no
    // abort either.
    assert_eq!(h.sink.sent_count(), 0);
    assert!(received.borrow().is_empty());
}

#[test]
fn stalled_directed_transfer_aborts_on_timeout() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);

    inject(&h.net, fields(Pgn::TP_CM, 0x26, 0x80), &rts(20, 3));
    h.net.update();
    h.sink.take_frames();

    h.clock.advance(Duration::from_millis(1250));
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 255);
    assert_eq!(sent[0].data()[1], 3);
}

#[test]
fn extended_transfer_requires_offsets_and_acknowledges_in_full() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    let mut ext_rts = [0xFFu8; 8];
    ext_rts[0] = 20;
    ext_rts[1..5].copy_from_slice(&20u32.to_le_bytes());
    ext_rts[5..8].copy_from_slice(&pgn_bytes(DATA_PGN));
    inject(&h.net, fields(Pgn::ETP_CM, 0x26, 0x80), &ext_rts);
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data()[0], 21);
    assert_eq!(sent[0].data()[1], 3);

    let mut dpo = [0xFFu8; 8];
    dpo[0] = 22;
    dpo[1] = 3;
    dpo[2..5].copy_from_slice(&[0, 0, 0]);
    dpo[5..8].copy_from_slice(&pgn_bytes(DATA_PGN));
    inject(&h.net, fields(Pgn::ETP_CM, 0x26, 0x80), &dpo);

    let payload: Vec<u8> = (100..120).collect();
    inject(
        &h.net,
        fields(Pgn::ETP_DT, 0x26, 0x80),
        &data_packet(1, &payload[0..7]),
    );
    inject(
        &h.net,
        fields(Pgn::ETP_DT, 0x26, 0x80),
        &data_packet(2, &payload[7..14]),
    );
    inject(
        &h.net,
        fields(Pgn::ETP_DT, 0x26, 0x80),
        &data_packet(3, &payload[14..20]),
    );
    h.net.update();

    let sent = h.sink.take_frames();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].fields().pgn, Pgn::ETP_CM);
    assert_eq!(sent[0].data()[0], 23);
    assert_eq!(
        u32::from_le_bytes([
            sent[0].data()[1],
            sent[0].data()[2],
            sent[0].data()[3],
            sent[0].data()[4]
        ]),
        20
    );

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload().as_slice(), payload.as_slice());
}

#[test]
fn extended_transfer_across_offset_windows_is_byte_exact() {
    let mut h = harness();
    claimed_function(&mut h, capable_name(7), 0x80);
    let received = recording_handler(&mut h, DATA_PGN);

    let total: u32 = 2000;
    let payload: Vec<u8> = (0..total).map(|i| (i % 251) as u8).collect();

    let mut ext_rts = [0xFFu8; 8];
    ext_rts[0] = 20;
    ext_rts[1..5].copy_from_slice(&total.to_le_bytes());
    ext_rts[5..8].copy_from_slice(&pgn_bytes(DATA_PGN));
    inject(&h.net, fields(Pgn::ETP_CM, 0x26, 0x80), &ext_rts);
    h.net.update();

    // Play the sender: answer every grant with its offset frame and data
    // until the end-of-message acknowledge arrives.
    loop {
        let sent = h.sink.take_frames();
        assert_eq!(sent.len(), 1);
        let reply = sent[0].data().to_vec();
        if reply[0] == 23 {
            assert_eq!(
                u32::from_le_bytes([reply[1], reply[2], reply[3], reply[4]]),
                total
            );
            break;
        }
        assert_eq!(reply[0], 21);
        let granted = reply[1];
        let next_packet =
            u32::from(reply[2]) | (u32::from(reply[3]) << 8) | (u32::from(reply[4]) << 16);
        let offset = next_packet - 1;

        let mut dpo = [0xFFu8; 8];
        dpo[0] = 22;
        dpo[1] = granted;
        dpo[2] = (offset & 0xFF) as u8;
        dpo[3] = ((offset >> 8) & 0xFF) as u8;
        dpo[4] = ((offset >> 16) & 0xFF) as u8;
        dpo[5..8].copy_from_slice(&pgn_bytes(DATA_PGN));
        inject(&h.net, fields(Pgn::ETP_CM, 0x26, 0x80), &dpo);

        for seq in 1..=granted {
            let start = (offset as usize + seq as usize - 1) * 7;
            let end = (start + 7).min(payload.len());
            inject(
                &h.net,
                fields(Pgn::ETP_DT, 0x26, 0x80),
                &data_packet(seq, &payload[start..end]),
            );
        }
        h.net.update();
    }

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload().as_slice(), payload.as_slice());
}
