#![allow(dead_code)]

use can_isobus::mock::{ManualClock, MockSink};
use can_isobus::{
    Address, Frame, IdFields, Name, NameBuilder, NetworkConfig, NetworkManager, Pgn, Priority,
};

pub type Net = NetworkManager<MockSink, ManualClock>;

pub struct Harness {
    pub net: Net,
    pub sink: MockSink,
    pub clock: ManualClock,
}

pub fn harness() -> Harness {
    harness_with(NetworkConfig::default())
}

pub fn harness_with(cfg: NetworkConfig) -> Harness {
    let sink = MockSink::new();
    let clock = ManualClock::new();
    let net = NetworkManager::new(cfg, clock.clone(), sink.clone()).unwrap();
    Harness { net, sink, clock }
}

/// A small arbitrary-address-capable NAME.
pub fn capable_name(identity: u32) -> Name {
    NameBuilder::new()
        .identity_number(identity)
        .arbitrary_address_capable(true)
        .build()
}

pub fn inject(net: &Net, fields: IdFields, data: &[u8]) {
    let frame = Frame::from_fields(fields, data).unwrap();
    assert!(net.frame_injector().inject(frame));
}

pub fn fields(pgn: Pgn, source: u8, destination: u8) -> IdFields {
    IdFields {
        priority: Priority::TRANSPORT,
        pgn,
        source: Address(source),
        destination: Address(destination),
    }
}

pub fn claim_fields(source: u8) -> IdFields {
    IdFields {
        priority: Priority::DEFAULT,
        pgn: Pgn::ADDRESS_CLAIM,
        source: Address(source),
        destination: Address::BROADCAST,
    }
}

/// The three trailing PGN bytes of a connection-management payload.
pub fn pgn_bytes(pgn: Pgn) -> [u8; 3] {
    [
        (pgn.0 & 0xFF) as u8,
        ((pgn.0 >> 8) & 0xFF) as u8,
        ((pgn.0 >> 16) & 0xFF) as u8,
    ]
}

/// Transmitted frames carrying `pgn`, drained from the sink record.
pub fn frames_for(sink: &MockSink, pgn: Pgn) -> Vec<Frame> {
    sink.take_frames()
        .into_iter()
        .filter(|f| f.fields().pgn == pgn)
        .collect()
}

/// Register an internal function, settle its claim and return its handle.
pub fn claimed_function(h: &mut Harness, name: Name, address: u8) -> can_isobus::FunctionHandle {
    let handle = h.net.register_internal_function(name, Address(address));
    h.clock
        .advance(h.net.config().claim_settle_window);
    h.net.update();
    h.sink.take_frames();
    handle
}
