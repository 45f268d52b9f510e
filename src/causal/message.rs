use tokio::sync::oneshot;

use super::clock::{NodeId, VectorClock};

/*
    Only two kinds of message cross the bus. A Regular message carries the
    body plus the sender's clock snapshot taken right after the origination
    increment, so the snapshot encodes everything the sender had delivered
    when it spoke. A Resend request carries the requester's current clock;
    the recipient derives the missing timestamp from its own slot in that
    clock and re-transmits the stored original. Resend requests never advance
    anyone's delivered state.
*/

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Regular(RegularMessage),
    Resend(ResendRequest),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegularMessage {
    pub body: String,
    pub sender: NodeId,
    pub clock: VectorClock,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResendRequest {
    pub requester: NodeId,
    pub clock: VectorClock,
}

/// Requests accepted on a node's client lane. Both run on the same
/// sequential actor as delivery, so clock and logs keep a single writer.
#[derive(Debug)]
pub enum Command {
    Submit {
        bodies: Vec<String>,
        shuffle: bool,
    },
    Snapshot {
        reply: oneshot::Sender<NodeSnapshot>,
    },
}

/// Point-in-time copy of a node's externally visible state.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub clock: VectorClock,
    pub delivered: Vec<RegularMessage>,
    pub originated: usize,
}

impl NodeSnapshot {
    pub fn delivered_bodies(&self) -> Vec<&str> {
        self.delivered.iter().map(|m| m.body.as_str()).collect()
    }
}

/// Structured event emitted after every protocol action, consumed by
/// whatever observer the cluster was wired with. Formatting is the
/// observer's business.
#[derive(Clone, Debug)]
pub enum NodeEvent {
    Originate {
        node: NodeId,
        message: RegularMessage,
    },
    Deliver {
        node: NodeId,
        message: RegularMessage,
    },
    RequestResend {
        node: NodeId,
        to: NodeId,
        clock: VectorClock,
    },
    ServiceResend {
        node: NodeId,
        to: NodeId,
        message: RegularMessage,
    },
}
