use std::collections::VecDeque;

use rand::seq::SliceRandom;
use tokio::sync::mpsc::{Receiver, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::clock::{NodeId, VectorClock};
use super::error::ProtocolError;
use super::message::{Command, Message, NodeEvent, NodeSnapshot, RegularMessage, ResendRequest};
use crate::network::bus::MessageBus;

/*
    One engine per node, run as a single sequential task: client submissions
    and peer deliveries are both handled here, so the clock and the logs have
    exactly one writer and need no locking.

    Inbound regular messages are worked through in FIFO order. A message
    whose clock shows the receiver is missing a causal predecessor is not
    delivered; instead the engine asks each gap source for the next message
    it expects and parks the out-of-order message at the back of the pending
    queue. Every time something new arrives the queue gets a fresh pass, so
    buffered messages retry (and re-request) until their predecessors land.
    A message whose sender slot is not ahead of ours was already delivered
    and is dropped on the floor.
*/

pub struct NodeEngine {
    id: NodeId,
    clock: VectorClock,
    /// Every message this node ever originated, in stamping order: the
    /// message stamped with own-slot value t sits at index t - 1. Only ever
    /// appended to, and only read to answer resend requests.
    local_log: Vec<RegularMessage>,
    /// Messages delivered at this node, kept in causal order.
    global_log: Vec<RegularMessage>,
    /// Received but not yet processed or deliverable. FIFO, with re-enqueue
    /// at the tail for messages still waiting on a predecessor.
    pending: VecDeque<Message>,
    bus: MessageBus,
    bus_rx: UnboundedReceiver<Message>,
    client_rx: Receiver<Command>,
    events: Option<UnboundedSender<NodeEvent>>,
    shutdown: CancellationToken,
}

/// What processing one pending message did. `Requeued` is the only outcome
/// that counts as no progress.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Discarded,
    Requeued,
    Serviced,
}

impl NodeEngine {
    pub fn new(
        id: NodeId,
        bus: MessageBus,
        bus_rx: UnboundedReceiver<Message>,
        client_rx: Receiver<Command>,
        shutdown: CancellationToken,
        events: Option<UnboundedSender<NodeEvent>>,
    ) -> Self {
        let size = bus.size();
        NodeEngine {
            id,
            clock: VectorClock::new(size),
            local_log: Vec::new(),
            global_log: Vec::new(),
            pending: VecDeque::new(),
            bus,
            bus_rx,
            client_rx,
            events,
            shutdown,
        }
    }

    /// Runs until shutdown, the client lane closes, or a fatal protocol
    /// violation. Drains the pending queue as far as it will go, then
    /// blocks for the next arrival instead of polling.
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        loop {
            self.drain_pending()?;
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                command = self.client_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => return Ok(()),
                },
                message = self.bus_rx.recv() => match message {
                    Some(message) => self.pending.push_back(message),
                    None => return Ok(()),
                },
            }
        }
    }

    /// Makes passes over the pending queue until one full pass re-enqueues
    /// everything, i.e. nothing left is processable until new input shows
    /// up. Any delivery resets the pass, since it may unblock a buffered
    /// successor.
    fn drain_pending(&mut self) -> Result<(), ProtocolError> {
        let mut stalled = 0;
        while stalled < self.pending.len() {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            match self.process(message)? {
                Outcome::Requeued => stalled += 1,
                _ => stalled = 0,
            }
        }
        Ok(())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { bodies, shuffle } => self.originate(bodies, shuffle),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Stamps and broadcasts a batch of bodies. Stamping always follows
    /// submission order; the shuffle flag only permutes the wire send order
    /// of the finished batch, to exercise receivers' reordering logic.
    fn originate(&mut self, bodies: Vec<String>, shuffle: bool) {
        let mut batch = Vec::with_capacity(bodies.len());
        for body in bodies {
            self.clock.increment(self.id);
            let message = RegularMessage {
                body,
                sender: self.id,
                clock: self.clock.clone(),
            };
            self.local_log.push(message.clone());
            info!(node = self.id, clock = %message.clock, body = %message.body, "originated");
            self.emit(NodeEvent::Originate {
                node: self.id,
                message: message.clone(),
            });
            batch.push(message);
        }
        if shuffle {
            batch.shuffle(&mut rand::thread_rng());
        }
        for message in batch {
            self.bus.broadcast(self.id, &Message::Regular(message));
        }
    }

    fn process(&mut self, message: Message) -> Result<Outcome, ProtocolError> {
        match message {
            Message::Regular(message) => Ok(self.process_regular(message)),
            Message::Resend(request) => {
                self.service_resend(request)?;
                Ok(Outcome::Serviced)
            }
        }
    }

    fn process_regular(&mut self, message: RegularMessage) -> Outcome {
        let sender = message.sender;

        // Sender slot not ahead of ours: we already delivered this one
        // (typically a resend answer that arrived after the original).
        if message.clock.slot(sender) <= self.clock.slot(sender) {
            debug!(node = self.id, sender, clock = %message.clock, "discarding duplicate");
            return Outcome::Discarded;
        }

        let gaps = self.missing_sources(&message);
        if !gaps.is_empty() {
            let request = ResendRequest {
                requester: self.id,
                clock: self.clock.clone(),
            };
            for source in gaps {
                info!(node = self.id, source, clock = %request.clock, "requesting resend");
                self.bus.send(source, Message::Resend(request.clone()));
                self.emit(NodeEvent::RequestResend {
                    node: self.id,
                    to: source,
                    clock: request.clock.clone(),
                });
            }
            self.pending.push_back(Message::Regular(message));
            return Outcome::Requeued;
        }

        self.deliver(message);
        Outcome::Delivered
    }

    /// Nodes we are missing messages from, judged against the incoming
    /// stamp: the sender itself if its slot is more than one ahead of what
    /// we have delivered from it, and any third node whose slot in the
    /// stamp is ahead of ours (the sender had delivered messages from that
    /// node before speaking, so they causally precede this one).
    fn missing_sources(&self, message: &RegularMessage) -> Vec<NodeId> {
        let mut sources = Vec::new();
        for node in 0..self.clock.len() {
            if node == self.id {
                continue;
            }
            let expected = if node == message.sender {
                self.clock.slot(node) + 1
            } else {
                self.clock.slot(node)
            };
            if message.clock.slot(node) > expected {
                sources.push(node);
            }
        }
        sources
    }

    fn deliver(&mut self, message: RegularMessage) {
        self.clock
            .set_slot(message.sender, message.clock.slot(message.sender));
        if self.insert_global(message.clone()) {
            info!(
                node = self.id,
                sender = message.sender,
                clock = %message.clock,
                progress = self.clock.sum_excluding(self.id),
                "delivered"
            );
            self.emit(NodeEvent::Deliver {
                node: self.id,
                message,
            });
        } else {
            debug!(node = self.id, clock = %message.clock, "clock already present in global log");
        }
    }

    /// Inserts right after the last entry whose clock is `<=` the new one;
    /// everything past that point is concurrent with the new message, never
    /// a predecessor, so causal order is preserved. An identical clock is a
    /// duplicate and is rejected.
    fn insert_global(&mut self, message: RegularMessage) -> bool {
        if self.global_log.iter().any(|m| m.clock == message.clock) {
            return false;
        }
        let position = self
            .global_log
            .iter()
            .rposition(|m| m.clock.le(&message.clock))
            .map_or(0, |i| i + 1);
        self.global_log.insert(position, message);
        true
    }

    /// Re-sends the exact message the requester expects next from us. The
    /// wanted timestamp is derived from our slot in the requester's clock;
    /// one past the end of the local origin log means someone's bookkeeping
    /// is broken, and this node aborts rather than answer wrong.
    fn service_resend(&mut self, request: ResendRequest) -> Result<(), ProtocolError> {
        let wanted = request.clock.slot(self.id) + 1;
        let Some(original) = self.local_log.get((wanted - 1) as usize) else {
            error!(
                node = self.id,
                requester = request.requester,
                wanted,
                "resend requested outside local origin log"
            );
            return Err(ProtocolError::ResendOutOfRange {
                node: self.id,
                requester: request.requester,
                timestamp: wanted,
                log_len: self.local_log.len(),
            });
        };
        let original = original.clone();
        info!(
            node = self.id,
            requester = request.requester,
            clock = %original.clock,
            "servicing resend"
        );
        self.bus
            .send(request.requester, Message::Regular(original.clone()));
        self.emit(NodeEvent::ServiceResend {
            node: self.id,
            to: request.requester,
            message: original,
        });
        Ok(())
    }

    fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id,
            clock: self.clock.clone(),
            delivered: self.global_log.clone(),
            originated: self.local_log.len(),
        }
    }

    fn emit(&self, event: NodeEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
