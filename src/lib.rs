//! An ISO 11783 (ISOBUS / J1939) protocol stack for agricultural CAN
//! networks.
//!
//! The stack covers the network management layer: 29-bit identifier routing,
//! dynamic address claiming with NAME-based arbitration, and the three
//! multi-packet transport protocols (broadcast announce, directed RTS/CTS and
//! the extended protocol for payloads beyond 1785 bytes).
//!
//! Everything runs single-threaded and cooperatively. The application owns
//! the loop: frames from the driver go into a bounded queue through a
//! [`FrameInjector`], and one call to [`NetworkManager::update`] per cycle
//! drains the queue, advances every timer against a single clock sample and
//! returns the cycle's events. Outbound frames leave through the
//! [`FrameSink`] the manager was built with.
//!
//! ```
//! use core::time::Duration;
//!
//! use can_isobus::mock::{ManualClock, MockSink};
//! use can_isobus::{
//!     Address, NameBuilder, NetworkConfig, NetworkEvent, NetworkManager,
//! };
//!
//! let sink = MockSink::new();
//! let clock = ManualClock::new();
//! let mut network =
//!     NetworkManager::new(NetworkConfig::default(), clock.clone(), sink.clone()).unwrap();
//!
//! let name = NameBuilder::new()
//!     .identity_number(7)
//!     .arbitrary_address_capable(true)
//!     .build();
//! let ecu = network.register_internal_function(name, Address(0x80));
//!
//! // The claim settles once the observation window passes uncontested.
//! clock.advance(Duration::from_millis(250));
//! let events = network.update();
//! assert!(events.contains(&NetworkEvent::AddressClaimed {
//!     function: ecu,
//!     address: Address(0x80),
//! }));
//! ```

mod claim;
mod transport;

pub mod address;
pub mod config;
pub mod control_function;
pub mod errors;
pub mod frame;
pub mod message;
pub mod mock;
pub mod name;
pub mod network;
pub mod payload;
pub mod timer;

pub use address::Address;
pub use config::{ConfigError, NetworkConfig};
pub use control_function::{
    ClaimState, ControlFunction, ControlFunctionRegistry, FunctionHandle, InternalFunction,
    PartneredFunction,
};
pub use errors::{AbortReason, SendError};
pub use frame::{Frame, IdFields, Pgn, Priority};
pub use message::Message;
pub use name::{filters_match, Name, NameBuilder, NameField, NameFilter};
pub use network::{
    Destination, FrameInjector, FrameSink, HandlerId, NetworkEvent, NetworkManager,
};
pub use payload::PayloadView;
pub use timer::{Clock, StdClock};
pub use transport::SendHandle;
