//! The network manager: the stack's single entry point.
//!
//! A [`NetworkManager`] owns the address table, one claim engine per internal
//! control function and the transport session tables. It is single-threaded
//! and cooperative: all protocol work happens inside [`NetworkManager::update`],
//! which the application calls from its main loop. The only concurrent piece
//! is the inbound frame queue, fed from a driver callback or reader thread
//! through a cloned [`FrameInjector`].
//!
//! Outbound frames go straight to the [`FrameSink`] the manager was built
//! with; a sink that reports a full driver queue costs the frame, surfaced as
//! [`NetworkEvent::FrameDropped`].

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::address::Address;
use crate::claim::{ClaimAction, ClaimEngine};
use crate::config::{ConfigError, NetworkConfig};
use crate::control_function::{ClaimState, ControlFunctionRegistry, FunctionHandle};
use crate::errors::{AbortReason, SendError};
use crate::frame::{Frame, IdFields, Pgn, Priority};
use crate::message::Message;
use crate::name::{Name, NameFilter};
use crate::timer::Clock;
use crate::transport::{SendHandle, TransportEvent, TransportManager};

/// Driver-facing transmit boundary.
///
/// Implementations hand the frame to the CAN controller (or a test double).
/// `false` reports a full transmit queue; the stack drops the frame and
/// reports [`NetworkEvent::FrameDropped`] rather than blocking.
pub trait FrameSink {
    /// Queue one frame for transmission.
    fn transmit(&mut self, frame: &Frame) -> bool;
}

/// Cloneable producer half of the inbound frame queue.
///
/// Safe to call from an interrupt handler thread or a socket reader; the
/// queue is bounded, so a stalled main loop sheds the oldest traffic by
/// rejecting new frames instead of growing without bound.
#[derive(Debug, Clone)]
pub struct FrameInjector {
    tx: Sender<Frame>,
}

impl FrameInjector {
    /// Push one received frame toward the manager. `false` means the queue
    /// was full and the frame was dropped.
    pub fn inject(&self, frame: Frame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// Where a message should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Every node on the bus.
    Broadcast,
    /// A specific bus address, used as-is.
    Address(Address),
    /// A registered control function, resolved through the address table at
    /// send time.
    Function(FunctionHandle),
}

/// Identifier of a registered message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u32);

type HandlerFn = Box<dyn FnMut(&Message)>;

struct HandlerEntry {
    id: HandlerId,
    pgn: Option<Pgn>,
    callback: HandlerFn,
}

enum HandlerOp {
    Add(HandlerEntry),
    Remove(HandlerId),
}

/// Asynchronous outcomes surfaced by [`NetworkManager::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// An internal function's claim settled uncontested.
    AddressClaimed {
        function: FunctionHandle,
        address: Address,
    },
    /// An internal function lost its claimed address to a lower NAME.
    AddressLost { function: FunctionHandle, to: Name },
    /// An internal function lost arbitration and cannot retry on its own.
    CannotClaim { function: FunctionHandle },
    /// A multi-packet send finished (acknowledged where the sub-protocol
    /// acknowledges).
    TransferCompleted { transfer: SendHandle },
    /// A multi-packet send failed and its session slot was released.
    TransferFailed {
        transfer: SendHandle,
        reason: AbortReason,
    },
    /// An outbound frame was lost to a full driver queue.
    FrameDropped,
}

/// The protocol stack for one CAN channel.
pub struct NetworkManager<S, C: Clock> {
    cfg: NetworkConfig,
    clock: C,
    sink: S,
    registry: ControlFunctionRegistry,
    engines: Vec<(FunctionHandle, ClaimEngine<C::Instant>)>,
    transport: TransportManager<C::Instant>,
    inbound_tx: Sender<Frame>,
    inbound_rx: Receiver<Frame>,
    handlers: Vec<HandlerEntry>,
    pending_ops: Vec<HandlerOp>,
    next_handler: u32,
    pending_events: Vec<NetworkEvent>,
}

impl<S: FrameSink, C: Clock> NetworkManager<S, C> {
    /// Build a manager over a transmit sink and clock.
    pub fn new(cfg: NetworkConfig, clock: C, sink: S) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let (inbound_tx, inbound_rx) = bounded(cfg.inbound_queue_depth);
        Ok(Self {
            cfg,
            clock,
            sink,
            registry: ControlFunctionRegistry::new(),
            engines: Vec::new(),
            transport: TransportManager::new(),
            inbound_tx,
            inbound_rx,
            handlers: Vec::new(),
            pending_ops: Vec::new(),
            next_handler: 0,
            pending_events: Vec::new(),
        })
    }

    /// Producer handle for the inbound frame queue.
    pub fn frame_injector(&self) -> FrameInjector {
        FrameInjector {
            tx: self.inbound_tx.clone(),
        }
    }

    /// The configuration this manager runs with.
    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    /// Register an internal control function and announce its first claim.
    ///
    /// The address is not usable until [`NetworkEvent::AddressClaimed`] is
    /// reported after the settle window.
    pub fn register_internal_function(
        &mut self,
        name: Name,
        preferred: Address,
    ) -> FunctionHandle {
        let handle = self.registry.add_internal(name, preferred);
        let mut engine = ClaimEngine::new(name, preferred);
        let now = self.clock.now();
        let action = engine.start(self.clock.add(now, self.cfg.claim_settle_window));
        let (state, address) = (engine.state(), engine.address());
        self.engines.push((handle, engine));
        let mut events = std::mem::take(&mut self.pending_events);
        Self::apply_claim_action(
            &mut self.registry,
            &mut self.sink,
            handle,
            name,
            state,
            address,
            action,
            &mut events,
        );
        self.pending_events = events;
        handle
    }

    /// Register a partnered control function matched by NAME filters.
    pub fn register_partner(&mut self, filters: Vec<NameFilter>) -> FunctionHandle {
        self.registry.add_partner(filters)
    }

    /// Claim progress of an internal function.
    pub fn claim_state(&self, handle: FunctionHandle) -> Option<ClaimState> {
        self.engines
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, engine)| engine.state())
    }

    /// Resolved bus address of a function: the claimed address of an internal
    /// one, or the matched remote address of a partner.
    pub fn address_of(&self, handle: FunctionHandle) -> Option<Address> {
        self.registry.resolve(handle)
    }

    /// Restart arbitration for a function parked at the null address.
    pub fn reclaim(&mut self, handle: FunctionHandle, preferred: Address) -> bool {
        let idx = match self.engines.iter().position(|(h, _)| *h == handle) {
            Some(idx) => idx,
            None => return false,
        };
        let now = self.clock.now();
        let deadline = self.clock.add(now, self.cfg.claim_settle_window);
        let name = self.engines[idx].1.name();
        let action = self.engines[idx].1.restart(preferred, deadline);
        let (state, address) = (self.engines[idx].1.state(), self.engines[idx].1.address());
        let mut events = std::mem::take(&mut self.pending_events);
        Self::apply_claim_action(
            &mut self.registry,
            &mut self.sink,
            handle,
            name,
            state,
            address,
            action,
            &mut events,
        );
        self.pending_events = events;
        true
    }

    /// Announce release of a function's address (a claim of the null
    /// address) and drop its table binding.
    pub fn release_address(&mut self, handle: FunctionHandle) -> bool {
        let idx = match self.engines.iter().position(|(h, _)| *h == handle) {
            Some(idx) => idx,
            None => return false,
        };
        let name = self.engines[idx].1.name();
        let action = self.engines[idx].1.release();
        let (state, address) = (self.engines[idx].1.state(), self.engines[idx].1.address());
        let mut events = std::mem::take(&mut self.pending_events);
        Self::apply_claim_action(
            &mut self.registry,
            &mut self.sink,
            handle,
            name,
            state,
            address,
            action,
            &mut events,
        );
        self.pending_events = events;
        true
    }

    /// Register a message handler. `pgn` of `None` receives every delivered
    /// message.
    ///
    /// Registration takes effect at the start of the next [`update`]: a
    /// handler registered mid-cycle never sees messages from the cycle that
    /// registered it.
    ///
    /// [`update`]: NetworkManager::update
    pub fn register_handler<F>(&mut self, pgn: Option<Pgn>, callback: F) -> HandlerId
    where
        F: FnMut(&Message) + 'static,
    {
        let id = HandlerId(self.next_handler);
        self.next_handler = self.next_handler.wrapping_add(1);
        self.pending_ops.push(HandlerOp::Add(HandlerEntry {
            id,
            pgn,
            callback: Box::new(callback),
        }));
        id
    }

    /// Remove a handler. Takes effect at the start of the next update.
    pub fn unregister_handler(&mut self, id: HandlerId) {
        self.pending_ops.push(HandlerOp::Remove(id));
    }

    /// Send a message from an internal function.
    ///
    /// Payloads of up to 8 bytes leave as a single frame immediately and
    /// return `Ok(None)`. Larger payloads open a transport session and return
    /// its handle; completion arrives later as
    /// [`NetworkEvent::TransferCompleted`] or
    /// [`NetworkEvent::TransferFailed`]. `priority` applies to single frames;
    /// transport frames always travel at [`Priority::TRANSPORT`].
    pub fn send(
        &mut self,
        from: FunctionHandle,
        to: Destination,
        pgn: Pgn,
        priority: Priority,
        data: &[u8],
    ) -> Result<Option<SendHandle>, SendError> {
        let engine = self
            .engines
            .iter()
            .find(|(h, _)| *h == from)
            .map(|(_, engine)| engine)
            .ok_or(SendError::NotInternal)?;
        let source = match engine.state() {
            ClaimState::Claimed => engine.address(),
            ClaimState::CannotClaim => return Err(SendError::CannotClaim),
            ClaimState::Unclaimed | ClaimState::Claiming => {
                return Err(SendError::AddressNotClaimed)
            }
        };
        let destination = match to {
            Destination::Broadcast => Address::BROADCAST,
            Destination::Address(addr) => addr,
            Destination::Function(handle) => self
                .registry
                .resolve(handle)
                .ok_or(SendError::DestinationUnresolved)?,
        };

        if data.len() <= 8 {
            let fields = IdFields {
                priority,
                pgn,
                source,
                destination,
            };
            if let Some(frame) = Frame::from_fields(fields, data) {
                if !self.sink.transmit(&frame) {
                    warn!("outbound frame for {} dropped: sink full", pgn.0);
                    self.pending_events.push(NetworkEvent::FrameDropped);
                }
            }
            return Ok(None);
        }

        let now = self.clock.now();
        let mut out = Vec::new();
        let result = self.transport.open_send(
            &self.cfg,
            &self.clock,
            now,
            source,
            destination,
            pgn,
            data.to_vec(),
            &mut out,
        );
        self.flush(out);
        result.map(Some)
    }

    /// Cancel an in-flight outbound transfer. No completion event follows.
    pub fn abort_transfer(&mut self, transfer: SendHandle) -> bool {
        let mut out = Vec::new();
        let aborted = self.transport.abort_send(transfer, &mut out);
        self.flush(out);
        aborted
    }

    /// Feed one frame through the stack immediately, bypassing the queue.
    ///
    /// For embeddings that already run single-threaded and have the frame in
    /// hand. Messages are dispatched to handlers right away; events surface
    /// from the next [`update`].
    ///
    /// [`update`]: NetworkManager::update
    pub fn process_inbound(&mut self, frame: &Frame) {
        let now = self.clock.now();
        let mut events = std::mem::take(&mut self.pending_events);
        let mut out = Vec::new();
        let mut transport_events = Vec::new();
        let mut inbox = Vec::new();
        self.process_frame(
            now,
            frame,
            &mut out,
            &mut transport_events,
            &mut events,
            &mut inbox,
        );
        self.absorb_transport_events(transport_events, &mut events, &mut inbox);
        self.dispatch(&inbox);
        for frame in out {
            if !self.sink.transmit(&frame) {
                warn!("outbound frame dropped: sink full");
                events.push(NetworkEvent::FrameDropped);
            }
        }
        self.pending_events = events;
    }

    /// Run one protocol cycle: drain the inbound queue, advance every timer,
    /// dispatch delivered messages to handlers and return the cycle's events.
    ///
    /// All timing guarantees derive from the call cadence; call at least
    /// every 10 ms to keep the protocol deadlines honest.
    pub fn update(&mut self) -> Vec<NetworkEvent> {
        // Handler table mutations queued since the last cycle apply first, so
        // dispatch below sees a stable table.
        for op in self.pending_ops.drain(..) {
            match op {
                HandlerOp::Add(entry) => self.handlers.push(entry),
                HandlerOp::Remove(id) => self.handlers.retain(|entry| entry.id != id),
            }
        }

        let now = self.clock.now();
        let mut events = std::mem::take(&mut self.pending_events);
        let mut out = Vec::new();
        let mut transport_events = Vec::new();
        let mut inbox = Vec::new();

        while let Ok(frame) = self.inbound_rx.try_recv() {
            self.process_frame(
                now,
                &frame,
                &mut out,
                &mut transport_events,
                &mut events,
                &mut inbox,
            );
        }

        // Claim settle windows.
        for i in 0..self.engines.len() {
            if let Some(action) = self.engines[i].1.poll(now) {
                let handle = self.engines[i].0;
                let name = self.engines[i].1.name();
                let (state, address) = (self.engines[i].1.state(), self.engines[i].1.address());
                Self::apply_claim_action(
                    &mut self.registry,
                    &mut self.sink,
                    handle,
                    name,
                    state,
                    address,
                    action,
                    &mut events,
                );
            }
        }

        self.transport
            .poll(&self.cfg, &self.clock, now, &mut out, &mut transport_events);

        self.absorb_transport_events(transport_events, &mut events, &mut inbox);
        self.dispatch(&inbox);

        for frame in out {
            if !self.sink.transmit(&frame) {
                warn!("outbound frame dropped: sink full");
                events.push(NetworkEvent::FrameDropped);
            }
        }
        events
    }

    /// Map transport completions onto network events and reassembled
    /// payloads onto messages.
    fn absorb_transport_events(
        &self,
        transport_events: Vec<TransportEvent>,
        events: &mut Vec<NetworkEvent>,
        inbox: &mut Vec<Message>,
    ) {
        for event in transport_events {
            match event {
                TransportEvent::SendCompleted { handle } => {
                    events.push(NetworkEvent::TransferCompleted { transfer: handle });
                }
                TransportEvent::SendFailed { handle, reason } => {
                    events.push(NetworkEvent::TransferFailed {
                        transfer: handle,
                        reason,
                    });
                }
                TransportEvent::Received {
                    source,
                    destination,
                    pgn,
                    payload,
                } => {
                    inbox.push(Message::new(
                        pgn,
                        Priority::TRANSPORT,
                        source,
                        self.registry.name_at(source),
                        destination,
                        payload,
                    ));
                }
            }
        }
    }

    /// Run each delivered message past every interested handler, in
    /// registration order.
    fn dispatch(&mut self, inbox: &[Message]) {
        for message in inbox {
            for entry in self.handlers.iter_mut() {
                let interested = match entry.pgn {
                    Some(pgn) => pgn == message.pgn,
                    None => true,
                };
                if interested {
                    (entry.callback)(message);
                }
            }
        }
    }

    fn flush(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if !self.sink.transmit(&frame) {
                warn!("outbound frame dropped: sink full");
                self.pending_events.push(NetworkEvent::FrameDropped);
            }
        }
    }

    /// Whether one of our claim engines currently sits on `address`,
    /// tentatively or settled.
    fn is_ours(&self, address: Address) -> bool {
        address.is_valid() && self.engines.iter().any(|(_, e)| e.address() == address)
    }

    fn process_frame(
        &mut self,
        now: C::Instant,
        frame: &Frame,
        out: &mut Vec<Frame>,
        transport_events: &mut Vec<TransportEvent>,
        events: &mut Vec<NetworkEvent>,
        inbox: &mut Vec<Message>,
    ) {
        let fields = frame.fields();
        let data = frame.data();
        match fields.pgn {
            Pgn::ADDRESS_CLAIM => self.handle_claim_frame(now, fields, data, events),
            Pgn::REQUEST => self.handle_request(fields, data, events, inbox),
            Pgn::TP_CM | Pgn::ETP_CM => {
                if fields.destination.is_broadcast() || self.is_ours(fields.destination) {
                    self.transport.on_control(
                        &self.cfg,
                        &self.clock,
                        now,
                        fields,
                        data,
                        out,
                        transport_events,
                    );
                }
            }
            Pgn::TP_DT | Pgn::ETP_DT => {
                if fields.destination.is_broadcast() || self.is_ours(fields.destination) {
                    self.transport.on_data(
                        &self.cfg,
                        &self.clock,
                        now,
                        fields,
                        data,
                        out,
                        transport_events,
                    );
                }
            }
            _ => {
                if fields.destination.is_broadcast() || self.is_ours(fields.destination) {
                    inbox.push(Message::new(
                        fields.pgn,
                        fields.priority,
                        fields.source,
                        self.registry.name_at(fields.source),
                        fields.destination,
                        data.to_vec(),
                    ));
                }
            }
        }
    }

    fn handle_claim_frame(
        &mut self,
        now: C::Instant,
        fields: IdFields,
        data: &[u8],
        events: &mut Vec<NetworkEvent>,
    ) {
        if data.len() < 8 {
            debug!("short address claim from {} dropped", fields.source);
            return;
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[..8]);
        let name = Name::from_le_bytes(bytes);
        let source = fields.source;

        // Table first: a null-address claim releases the binding, anything
        // else displaces whatever held the address.
        self.registry.bind(source, name);
        if !source.is_valid() {
            return;
        }

        // Arbitrate with any of our functions sitting on that address.
        for i in 0..self.engines.len() {
            let engine_name = self.engines[i].1.name();
            if self.engines[i].1.address() != source || engine_name == name {
                continue;
            }
            let handle = self.engines[i].0;
            let settle = self.clock.add(now, self.cfg.claim_settle_window);
            let next =
                self.registry
                    .next_free_address(source, self.cfg.claim_range, &engine_name);
            let actions = self.engines[i].1.on_competing_claim(name, settle, next);
            for action in actions {
                let (state, address) =
                    (self.engines[i].1.state(), self.engines[i].1.address());
                Self::apply_claim_action(
                    &mut self.registry,
                    &mut self.sink,
                    handle,
                    engine_name,
                    state,
                    address,
                    action,
                    events,
                );
            }
        }
    }

    fn handle_request(
        &mut self,
        fields: IdFields,
        data: &[u8],
        events: &mut Vec<NetworkEvent>,
        inbox: &mut Vec<Message>,
    ) {
        if data.len() < 3 {
            return;
        }
        let requested = Pgn(
            u32::from(data[0]) | (u32::from(data[1]) << 8) | (u32::from(data[2]) << 16),
        );
        if requested != Pgn::ADDRESS_CLAIM {
            // Application-level request; let handlers answer it.
            if fields.destination.is_broadcast() || self.is_ours(fields.destination) {
                inbox.push(Message::new(
                    fields.pgn,
                    fields.priority,
                    fields.source,
                    self.registry.name_at(fields.source),
                    fields.destination,
                    data.to_vec(),
                ));
            }
            return;
        }

        // Request for address claimed: every targeted function re-announces,
        // including cannot-claim announcements from parked functions.
        for i in 0..self.engines.len() {
            if !fields.destination.is_broadcast()
                && self.engines[i].1.address() != fields.destination
            {
                continue;
            }
            if let Some(action) = self.engines[i].1.respond_to_request() {
                let handle = self.engines[i].0;
                let name = self.engines[i].1.name();
                let (state, address) =
                    (self.engines[i].1.state(), self.engines[i].1.address());
                Self::apply_claim_action(
                    &mut self.registry,
                    &mut self.sink,
                    handle,
                    name,
                    state,
                    address,
                    action,
                    events,
                );
            }
        }
    }

    /// Turn one claim engine instruction into frames, table updates and
    /// events. Engine state is mirrored into the registry so reads through
    /// [`ControlFunctionRegistry::resolve`] stay consistent.
    #[allow(clippy::too_many_arguments)]
    fn apply_claim_action(
        registry: &mut ControlFunctionRegistry,
        sink: &mut S,
        handle: FunctionHandle,
        name: Name,
        state: ClaimState,
        address: Address,
        action: ClaimAction,
        events: &mut Vec<NetworkEvent>,
    ) {
        if let Some(function) = registry.get_internal_mut(handle) {
            function.state = state;
            function.address = address;
        }
        let announce = |sink: &mut S, source: Address, events: &mut Vec<NetworkEvent>| {
            let fields = IdFields {
                priority: Priority::DEFAULT,
                pgn: Pgn::ADDRESS_CLAIM,
                source,
                destination: Address::BROADCAST,
            };
            if let Some(frame) = Frame::from_fields(fields, &name.to_le_bytes()) {
                if !sink.transmit(&frame) {
                    warn!("address claim announcement dropped: sink full");
                    events.push(NetworkEvent::FrameDropped);
                }
            }
        };
        match action {
            ClaimAction::SendClaim { address } => {
                registry.bind(address, name);
                announce(sink, address, events);
            }
            ClaimAction::SendCannotClaim => {
                registry.release(name);
                announce(sink, Address::NULL, events);
            }
            ClaimAction::Claimed { address } => {
                registry.bind(address, name);
                info!("claimed address {} for NAME {:#018x}", address, name.raw());
                events.push(NetworkEvent::AddressClaimed {
                    function: handle,
                    address,
                });
            }
            ClaimAction::Lost { to } => {
                warn!(
                    "lost address arbitration to NAME {:#018x}",
                    to.raw()
                );
                events.push(NetworkEvent::AddressLost { function: handle, to });
            }
            ClaimAction::CannotClaim => {
                events.push(NetworkEvent::CannotClaim { function: handle });
            }
        }
    }
}
