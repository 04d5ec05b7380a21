//! Multi-packet transport: segmentation, reassembly and flow control.
//!
//! Three sub-protocols carry payloads larger than one frame:
//!
//! | Variant | Selected when | Flow control | Limit |
//! |---|---|---|---|
//! | [`Protocol::Bam`] | broadcast destination | none; fixed pacing | 1785 B |
//! | [`Protocol::Directed`] | unicast, 9..=1785 B | CTS bursts + EOMA | 1785 B |
//! | [`Protocol::Extended`] | unicast, > 1785 B | CTS bursts + offset frames | ~117 MB |
//!
//! The manager is driven entirely by the network manager: inbound control and
//! data frames arrive through [`TransportManager::on_control`] /
//! [`TransportManager::on_data`], and [`TransportManager::poll`] advances
//! pacing and deadline timers against the caller's clock sample. Outbound
//! frames are pushed into a caller-provided vector; the manager never touches
//! the sink directly.

mod control;
mod recv;
mod send;

pub use send::SendHandle;

use log::{debug, warn};

use crate::address::Address;
use crate::config::NetworkConfig;
use crate::errors::{AbortReason, SendError};
use crate::frame::{Frame, IdFields, Pgn, Priority};
use crate::timer::Clock;

use control::ControlMessage;
use recv::{RecvOutcome, RecvSession};
use send::{SendSession, SendState};

/// Data bytes per transport data packet.
pub(crate) const SEGMENT_BYTES: usize = 7;
/// Largest payload the standard transport protocol can carry.
pub(crate) const TP_MAX_BYTES: usize = 1785;
/// Largest payload the extended transport protocol can carry.
pub(crate) const ETP_MAX_BYTES: usize = 117_440_505;

/// Transport sub-protocol of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protocol {
    /// Unacknowledged broadcast announce message.
    Bam,
    /// Acknowledged directed transfer (RTS/CTS).
    Directed,
    /// Acknowledged directed transfer with byte offsets (ETP).
    Extended,
}

impl Protocol {
    fn is_extended(&self) -> bool {
        *self == Protocol::Extended
    }
}

/// Identity of a session: at most one active session exists per key and
/// direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SessionKey {
    /// Sending side of the transfer.
    pub(crate) source: Address,
    /// Receiving side; broadcast for BAM.
    pub(crate) destination: Address,
    /// PGN of the transported message.
    pub(crate) pgn: Pgn,
}

/// Completion signals handed up to the network manager.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// An outbound session delivered every byte (and, for directed
    /// protocols, was acknowledged).
    SendCompleted { handle: SendHandle },
    /// An outbound session failed; the session slot has been released.
    SendFailed {
        handle: SendHandle,
        reason: AbortReason,
    },
    /// An inbound transfer completed reassembly.
    Received {
        source: Address,
        destination: Address,
        pgn: Pgn,
        payload: Vec<u8>,
    },
}

fn push_frame(out: &mut Vec<Frame>, fields: IdFields, payload: &[u8]) {
    // Construction only fails for oversized payloads, which never leave this
    // module.
    if let Some(frame) = Frame::from_fields(fields, payload) {
        out.push(frame);
    }
}

fn cm_fields(extended: bool, from: Address, to: Address) -> IdFields {
    IdFields {
        priority: Priority::TRANSPORT,
        pgn: if extended { Pgn::ETP_CM } else { Pgn::TP_CM },
        source: from,
        destination: to,
    }
}

fn dt_fields(extended: bool, from: Address, to: Address) -> IdFields {
    IdFields {
        priority: Priority::TRANSPORT,
        pgn: if extended { Pgn::ETP_DT } else { Pgn::TP_DT },
        source: from,
        destination: to,
    }
}

/// Session tables and orchestration for all three sub-protocols.
#[derive(Debug)]
pub(crate) struct TransportManager<I> {
    send_sessions: Vec<SendSession<I>>,
    recv_sessions: Vec<RecvSession<I>>,
    next_handle: u32,
}

impl<I: Copy + PartialOrd> TransportManager<I> {
    pub(crate) fn new() -> Self {
        Self {
            send_sessions: Vec::new(),
            recv_sessions: Vec::new(),
            next_handle: 0,
        }
    }

    /// Open an outbound session and emit its announce frame.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open_send<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        source: Address,
        destination: Address,
        pgn: Pgn,
        data: Vec<u8>,
        out: &mut Vec<Frame>,
    ) -> Result<SendHandle, SendError> {
        let protocol = if destination.is_broadcast() {
            Protocol::Bam
        } else if data.len() <= TP_MAX_BYTES {
            Protocol::Directed
        } else {
            Protocol::Extended
        };
        let max = match protocol {
            Protocol::Bam | Protocol::Directed => TP_MAX_BYTES,
            Protocol::Extended => ETP_MAX_BYTES,
        };
        if data.len() > max {
            return Err(SendError::PayloadTooLarge {
                len: data.len(),
                max,
            });
        }

        let key = SessionKey {
            source,
            destination,
            pgn,
        };
        if self.send_sessions.iter().any(|s| s.key == key) {
            return Err(SendError::SessionInProgress);
        }
        if self.send_sessions.len() >= cfg.max_sessions {
            return Err(SendError::NoSessionSlot);
        }

        let handle = SendHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);

        let total = data.len();
        let packets = (total as u32).div_ceil(SEGMENT_BYTES as u32);
        let (announce, state) = match protocol {
            Protocol::Bam => (
                ControlMessage::Broadcast {
                    total: total as u16,
                    packets: packets as u8,
                    pgn,
                },
                SendState::Streaming {
                    next_due: clock.add(now, cfg.bam_packet_interval),
                },
            ),
            Protocol::Directed => (
                ControlMessage::RequestToSend {
                    total: total as u16,
                    packets: packets as u8,
                    max_per_burst: 0xFF,
                    pgn,
                },
                SendState::WaitingForCts {
                    deadline: clock.add(now, cfg.t3_response_wait),
                    holds: 0,
                },
            ),
            Protocol::Extended => (
                ControlMessage::ExtRequestToSend {
                    total: total as u32,
                    pgn,
                },
                SendState::WaitingForCts {
                    deadline: clock.add(now, cfg.t3_response_wait),
                    holds: 0,
                },
            ),
        };

        push_frame(
            out,
            cm_fields(protocol.is_extended(), source, destination),
            &announce.encode(),
        );
        self.send_sessions
            .push(SendSession::new(handle, protocol, key, data, state));
        debug!(
            "transport: opened {:?} send session {:?} ({} bytes)",
            protocol, key, total
        );
        Ok(handle)
    }

    /// Handle a connection-management frame addressed to (or broadcast at)
    /// one of our control functions.
    pub(crate) fn on_control<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        fields: IdFields,
        data: &[u8],
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) {
        let extended = fields.pgn == Pgn::ETP_CM;
        let cm = match ControlMessage::decode(extended, data) {
            Some(cm) => cm,
            None => {
                debug!(
                    "transport: malformed control frame from {} dropped",
                    fields.source
                );
                return;
            }
        };

        match cm {
            ControlMessage::RequestToSend {
                total,
                packets,
                max_per_burst,
                pgn,
            } => self.accept_rts(
                cfg,
                clock,
                now,
                fields,
                Protocol::Directed,
                u32::from(total),
                u32::from(packets),
                max_per_burst,
                pgn,
                out,
            ),
            ControlMessage::ExtRequestToSend { total, pgn } => {
                let packets = total.div_ceil(SEGMENT_BYTES as u32);
                self.accept_rts(
                    cfg,
                    clock,
                    now,
                    fields,
                    Protocol::Extended,
                    total,
                    packets,
                    0xFF,
                    pgn,
                    out,
                )
            }
            ControlMessage::Broadcast {
                total,
                packets,
                pgn,
            } => {
                let expected = u32::from(total).div_ceil(SEGMENT_BYTES as u32);
                if total == 0
                    || usize::from(total) > TP_MAX_BYTES
                    || u32::from(packets) != expected
                {
                    debug!(
                        "transport: malformed broadcast announce from {} dropped",
                        fields.source
                    );
                    return;
                }
                let key = SessionKey {
                    source: fields.source,
                    destination: Address::BROADCAST,
                    pgn,
                };
                // A new announce from the same source replaces any stale
                // session; broadcast has no abort signalling.
                self.recv_sessions
                    .retain(|s| !(s.protocol == Protocol::Bam && s.key.source == key.source));
                if self.recv_sessions.len() >= cfg.max_sessions {
                    debug!("transport: no slot for broadcast session from {}", key.source);
                    return;
                }
                self.recv_sessions.push(RecvSession::new(
                    Protocol::Bam,
                    key,
                    u32::from(total),
                    u32::from(packets),
                    0xFF,
                    clock.add(now, cfg.t1_data_gap),
                ));
            }
            ControlMessage::ClearToSend {
                packets,
                next_packet,
                pgn,
            } => self.handle_cts(
                cfg,
                clock,
                now,
                fields,
                false,
                packets,
                u32::from(next_packet),
                pgn,
                out,
                events,
            ),
            ControlMessage::ExtClearToSend {
                packets,
                next_packet,
                pgn,
            } => self.handle_cts(
                cfg, clock, now, fields, true, packets, next_packet, pgn, out, events,
            ),
            ControlMessage::ExtOffset {
                packets,
                offset,
                pgn,
            } => {
                let idx = self.find_recv(fields.source, fields.destination, true);
                if let Some(idx) = idx {
                    if self.recv_sessions[idx].key.pgn != pgn {
                        return;
                    }
                    if let Err(reason) = self.recv_sessions[idx].set_offset(packets, offset) {
                        self.abort_recv(idx, reason, out);
                    } else {
                        self.recv_sessions[idx].deadline = clock.add(now, cfg.t2_cts_to_data);
                    }
                }
            }
            ControlMessage::EndOfMessage { pgn, .. }
            | ControlMessage::ExtEndOfMessage { pgn, .. } => {
                if let Some(idx) = self.find_send(fields, pgn, extended) {
                    let session = self.send_sessions.swap_remove(idx);
                    events.push(TransportEvent::SendCompleted {
                        handle: session.handle,
                    });
                }
            }
            ControlMessage::Abort { reason, pgn } => {
                if let Some(idx) = self.find_send(fields, pgn, extended) {
                    let session = self.send_sessions.swap_remove(idx);
                    warn!(
                        "transport: peer {} aborted send session ({:?})",
                        fields.source, reason
                    );
                    events.push(TransportEvent::SendFailed {
                        handle: session.handle,
                        reason,
                    });
                } else if let Some(idx) = self.find_recv(fields.source, fields.destination, extended)
                {
                    debug!(
                        "transport: peer {} aborted receive session ({:?})",
                        fields.source, reason
                    );
                    self.recv_sessions.swap_remove(idx);
                }
            }
        }
    }

    /// Handle a data frame.
    pub(crate) fn on_data<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        fields: IdFields,
        data: &[u8],
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) {
        let extended = fields.pgn == Pgn::ETP_DT;
        if data.is_empty() {
            return;
        }
        let idx = match self.find_recv(fields.source, fields.destination, extended) {
            Some(idx) => idx,
            None => {
                // Data without a session: answer destination-specific frames
                // with an abort; broadcast is unacknowledged by design.
                if !fields.destination.is_broadcast() {
                    let abort = ControlMessage::Abort {
                        reason: AbortReason::UnexpectedPacket,
                        pgn: Pgn(0),
                    };
                    push_frame(
                        out,
                        cm_fields(extended, fields.destination, fields.source),
                        &abort.encode(),
                    );
                }
                return;
            }
        };

        let sequence = data[0];
        match self.recv_sessions[idx].accept_packet(sequence, &data[1..]) {
            RecvOutcome::Accepted => {
                self.recv_sessions[idx].deadline = clock.add(now, cfg.t1_data_gap);
            }
            RecvOutcome::BurstDone => {
                self.grant_burst(cfg, clock, now, idx, out);
            }
            RecvOutcome::Completed => {
                let session = self.recv_sessions.swap_remove(idx);
                if session.protocol != Protocol::Bam {
                    let ack = match session.protocol {
                        Protocol::Directed => ControlMessage::EndOfMessage {
                            total: session.total_bytes as u16,
                            packets: session.total_packets as u8,
                            pgn: session.key.pgn,
                        },
                        _ => ControlMessage::ExtEndOfMessage {
                            total: session.total_bytes,
                            pgn: session.key.pgn,
                        },
                    };
                    push_frame(
                        out,
                        cm_fields(
                            session.protocol.is_extended(),
                            session.key.destination,
                            session.key.source,
                        ),
                        &ack.encode(),
                    );
                }
                events.push(TransportEvent::Received {
                    source: session.key.source,
                    destination: session.key.destination,
                    pgn: session.key.pgn,
                    payload: session.into_payload(),
                });
            }
            RecvOutcome::Violation(reason) => {
                if self.recv_sessions[idx].protocol == Protocol::Bam {
                    debug!(
                        "transport: broadcast session from {} dropped ({:?})",
                        fields.source, reason
                    );
                    self.recv_sessions.swap_remove(idx);
                } else {
                    self.abort_recv(idx, reason, out);
                }
            }
        }
    }

    /// Advance pacing and deadline timers.
    pub(crate) fn poll<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) {
        let mut i = 0;
        while i < self.send_sessions.len() {
            let remove = self.step_send(cfg, clock, now, i, out, events);
            if remove {
                self.send_sessions.swap_remove(i);
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.recv_sessions.len() {
            if now >= self.recv_sessions[i].deadline {
                if self.recv_sessions[i].protocol == Protocol::Bam {
                    // Unacknowledged: expire silently.
                    debug!(
                        "transport: broadcast session from {} timed out after {} bytes",
                        self.recv_sessions[i].key.source,
                        self.recv_sessions[i].bytes_received()
                    );
                    self.recv_sessions.swap_remove(i);
                } else {
                    self.abort_recv(i, AbortReason::Timeout, out);
                }
            } else {
                i += 1;
            }
        }
    }

    /// Application-requested cancellation of an outbound session.
    ///
    /// Emits an abort frame where the sub-protocol defines one and releases
    /// the slot immediately. No completion event follows.
    pub(crate) fn abort_send(&mut self, handle: SendHandle, out: &mut Vec<Frame>) -> bool {
        let idx = match self.send_sessions.iter().position(|s| s.handle == handle) {
            Some(idx) => idx,
            None => return false,
        };
        let session = self.send_sessions.swap_remove(idx);
        if session.protocol != Protocol::Bam {
            let abort = ControlMessage::Abort {
                reason: AbortReason::Other,
                pgn: session.transported_pgn(),
            };
            push_frame(
                out,
                cm_fields(
                    session.protocol.is_extended(),
                    session.key.source,
                    session.key.destination,
                ),
                &abort.encode(),
            );
        }
        true
    }

    /// Advance one send session; true means the session is finished and must
    /// be removed.
    fn step_send<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        idx: usize,
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) -> bool {
        let session = &mut self.send_sessions[idx];
        match session.state {
            SendState::Streaming { mut next_due } => {
                while now >= next_due && !session.finished() {
                    let payload = session.next_data_payload();
                    push_frame(
                        out,
                        dt_fields(false, session.key.source, Address::BROADCAST),
                        &payload,
                    );
                    next_due = clock.add(next_due, cfg.bam_packet_interval);
                }
                if session.finished() {
                    events.push(TransportEvent::SendCompleted {
                        handle: session.handle,
                    });
                    return true;
                }
                session.state = SendState::Streaming { next_due };
                false
            }
            SendState::Bursting { remaining } => {
                let mut left = remaining;
                while left > 0 && !session.finished() {
                    let payload = session.next_data_payload();
                    push_frame(
                        out,
                        dt_fields(
                            session.protocol.is_extended(),
                            session.key.source,
                            session.key.destination,
                        ),
                        &payload,
                    );
                    left -= 1;
                }
                session.state = if session.finished() {
                    SendState::WaitingForAck {
                        deadline: clock.add(now, cfg.t3_response_wait),
                    }
                } else {
                    SendState::WaitingForCts {
                        deadline: clock.add(now, cfg.t3_response_wait),
                        holds: 0,
                    }
                };
                false
            }
            SendState::WaitingForCts { deadline, .. } | SendState::WaitingForAck { deadline } => {
                if now >= deadline {
                    self.fail_send(idx, AbortReason::Timeout, out, events);
                    return true;
                }
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn accept_rts<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        fields: IdFields,
        protocol: Protocol,
        total: u32,
        packets: u32,
        max_per_burst: u8,
        pgn: Pgn,
        out: &mut Vec<Frame>,
    ) {
        let extended = protocol.is_extended();
        let reply_fields = cm_fields(extended, fields.destination, fields.source);

        let max = if extended { ETP_MAX_BYTES } else { TP_MAX_BYTES };
        let expected_packets = total.div_ceil(SEGMENT_BYTES as u32);
        if total as usize > max || packets != expected_packets || total == 0 {
            let abort = ControlMessage::Abort {
                reason: AbortReason::SizeExceeded,
                pgn,
            };
            push_frame(out, reply_fields, &abort.encode());
            return;
        }

        // A repeated request for the same key supersedes the stale session.
        let key = SessionKey {
            source: fields.source,
            destination: fields.destination,
            pgn,
        };
        self.recv_sessions.retain(|s| s.key != key);
        // Data frames carry no PGN, so at most one session per pair and
        // protocol can ever be demultiplexed. A second announce for a
        // different PGN is refused, not interleaved.
        if self.recv_sessions.iter().any(|s| {
            s.protocol == protocol
                && s.key.source == key.source
                && s.key.destination == key.destination
        }) {
            let abort = ControlMessage::Abort {
                reason: AbortReason::AlreadyInSession,
                pgn,
            };
            push_frame(out, reply_fields, &abort.encode());
            return;
        }
        if self.recv_sessions.len() >= cfg.max_sessions {
            let abort = ControlMessage::Abort {
                reason: AbortReason::NoResources,
                pgn,
            };
            push_frame(out, reply_fields, &abort.encode());
            return;
        }

        let mut session = RecvSession::new(
            protocol,
            key,
            total,
            packets,
            max_per_burst,
            clock.add(now, cfg.t2_cts_to_data),
        );
        let grant = session.next_grant(cfg.cts_packets_per_burst);
        let cts = if extended {
            ControlMessage::ExtClearToSend {
                packets: grant,
                next_packet: 1,
                pgn,
            }
        } else {
            session.burst_remaining = grant;
            ControlMessage::ClearToSend {
                packets: grant,
                next_packet: 1,
                pgn,
            }
        };
        push_frame(out, reply_fields, &cts.encode());
        self.recv_sessions.push(session);
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_cts<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        fields: IdFields,
        extended: bool,
        packets: u8,
        next_packet: u32,
        pgn: Pgn,
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) {
        let idx = match self.find_send(fields, pgn, extended) {
            Some(idx) => idx,
            None => return,
        };
        match self.send_sessions[idx].state {
            SendState::Bursting { .. } => {
                self.fail_send(idx, AbortReason::CtsWhileSending, out, events);
                self.send_sessions.swap_remove(idx);
            }
            _ if packets == 0 => {
                // CTS(0) holds the connection open; tolerate a bounded number.
                let holds = match self.send_sessions[idx].state {
                    SendState::WaitingForCts { holds, .. } => holds + 1,
                    _ => 1,
                };
                if holds > cfg.cts_retry_limit {
                    self.fail_send(idx, AbortReason::RetryLimit, out, events);
                    self.send_sessions.swap_remove(idx);
                } else {
                    self.send_sessions[idx].state = SendState::WaitingForCts {
                        deadline: clock.add(now, cfg.t4_cts_hold),
                        holds,
                    };
                }
            }
            _ => {
                let session = &mut self.send_sessions[idx];
                if next_packet == 0 || next_packet > session.total_packets() {
                    self.fail_send(idx, AbortReason::BadSequence, out, events);
                    self.send_sessions.swap_remove(idx);
                    return;
                }
                session.next_packet = next_packet;
                if extended {
                    // Announce the offset the granted burst is relative to.
                    session.offset_base = next_packet - 1;
                    let dpo = ControlMessage::ExtOffset {
                        packets,
                        offset: session.offset_base,
                        pgn,
                    };
                    push_frame(
                        out,
                        cm_fields(true, session.key.source, session.key.destination),
                        &dpo.encode(),
                    );
                }
                session.state = SendState::Bursting { remaining: packets };
            }
        }
    }

    fn grant_burst<C: Clock<Instant = I>>(
        &mut self,
        cfg: &NetworkConfig,
        clock: &C,
        now: I,
        idx: usize,
        out: &mut Vec<Frame>,
    ) {
        let session = &mut self.recv_sessions[idx];
        let grant = session.next_grant(cfg.cts_packets_per_burst);
        let cts = if session.protocol.is_extended() {
            ControlMessage::ExtClearToSend {
                packets: grant,
                next_packet: session.next_packet,
                pgn: session.key.pgn,
            }
        } else {
            session.burst_remaining = grant;
            ControlMessage::ClearToSend {
                packets: grant,
                next_packet: session.next_packet as u8,
                pgn: session.key.pgn,
            }
        };
        session.deadline = clock.add(now, cfg.t2_cts_to_data);
        push_frame(
            out,
            cm_fields(
                session.protocol.is_extended(),
                session.key.destination,
                session.key.source,
            ),
            &cts.encode(),
        );
    }

    fn abort_recv(&mut self, idx: usize, reason: AbortReason, out: &mut Vec<Frame>) {
        let session = self.recv_sessions.swap_remove(idx);
        warn!(
            "transport: receive session {:?} aborted ({:?})",
            session.key, reason
        );
        let abort = ControlMessage::Abort {
            reason,
            pgn: session.key.pgn,
        };
        push_frame(
            out,
            cm_fields(
                session.protocol.is_extended(),
                session.key.destination,
                session.key.source,
            ),
            &abort.encode(),
        );
    }

    /// Emit an abort for a send session and queue its failure event. The
    /// caller removes the session.
    fn fail_send(
        &mut self,
        idx: usize,
        reason: AbortReason,
        out: &mut Vec<Frame>,
        events: &mut Vec<TransportEvent>,
    ) {
        let session = &self.send_sessions[idx];
        warn!(
            "transport: send session {:?} failed ({:?})",
            session.key, reason
        );
        if session.protocol != Protocol::Bam {
            let abort = ControlMessage::Abort {
                reason,
                pgn: session.transported_pgn(),
            };
            push_frame(
                out,
                cm_fields(
                    session.protocol.is_extended(),
                    session.key.source,
                    session.key.destination,
                ),
                &abort.encode(),
            );
        }
        events.push(TransportEvent::SendFailed {
            handle: session.handle,
            reason,
        });
    }

    /// Send session targeted by a control frame from `fields.source`.
    fn find_send(&self, fields: IdFields, pgn: Pgn, extended: bool) -> Option<usize> {
        self.send_sessions.iter().position(|s| {
            s.protocol.is_extended() == extended
                && s.protocol != Protocol::Bam
                && s.key.destination == fields.source
                && s.key.source == fields.destination
                && s.key.pgn == pgn
        })
    }

    /// Receive session fed by frames from `source` to `destination`.
    fn find_recv(&self, source: Address, destination: Address, extended: bool) -> Option<usize> {
        self.recv_sessions.iter().position(|s| {
            s.protocol.is_extended() == extended
                && s.key.source == source
                && s.key.destination == destination
        })
    }
}
