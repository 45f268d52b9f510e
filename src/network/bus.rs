use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::causal::clock::NodeId;
use crate::causal::message::Message;

/*
    Point-to-point, reliable, order-preserving delivery between every pair of
    nodes: one fan-in endpoint per node, any node may send to any endpoint.
    Each engine runs as a single sequential task, so everything one node
    sends to one peer travels down one mpsc lane in send order, which is the
    per-link FIFO guarantee the delivery algorithm leans on. The lanes are
    unbounded so a sender never suspends mid-drain waiting on a peer that is
    itself mid-send.
*/

#[derive(Clone)]
pub struct MessageBus {
    endpoints: Vec<UnboundedSender<Message>>,
}

impl MessageBus {
    /// Allocates one inbound endpoint per node. The receivers are handed to
    /// the engines; the bus itself is cloned into every sender.
    pub fn new(size: usize) -> (Self, Vec<UnboundedReceiver<Message>>) {
        let mut endpoints = Vec::with_capacity(size);
        let mut receivers = Vec::with_capacity(size);
        for _ in 0..size {
            let (tx, rx) = mpsc::unbounded_channel();
            endpoints.push(tx);
            receivers.push(rx);
        }
        (MessageBus { endpoints }, receivers)
    }

    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    /// Delivers one message to one endpoint. A closed endpoint means the
    /// node behind it has stopped; the message is dropped so the rest of
    /// the cluster keeps going.
    pub fn send(&self, to: NodeId, message: Message) {
        if self.endpoints[to].send(message).is_err() {
            warn!(to, "dropping message for stopped node");
        }
    }

    /// Sends the same message to every node except the originator.
    pub fn broadcast(&self, from: NodeId, message: &Message) {
        for to in 0..self.endpoints.len() {
            if to != from {
                self.send(to, message.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::clock::VectorClock;
    use crate::causal::message::RegularMessage;

    fn message(body: &str) -> Message {
        Message::Regular(RegularMessage {
            body: body.to_string(),
            sender: 0,
            clock: VectorClock::new(3),
        })
    }

    #[tokio::test]
    async fn broadcast_skips_the_originator() {
        let (bus, mut receivers) = MessageBus::new(3);

        bus.broadcast(0, &message("hello"));

        assert!(receivers[0].try_recv().is_err());
        assert_eq!(receivers[1].try_recv().unwrap(), message("hello"));
        assert_eq!(receivers[2].try_recv().unwrap(), message("hello"));
    }

    #[tokio::test]
    async fn sends_to_one_endpoint_keep_their_order() {
        let (bus, mut receivers) = MessageBus::new(2);

        bus.send(1, message("first"));
        bus.send(1, message("second"));

        assert_eq!(receivers[1].try_recv().unwrap(), message("first"));
        assert_eq!(receivers[1].try_recv().unwrap(), message("second"));
    }

    #[tokio::test]
    async fn send_to_a_stopped_node_is_dropped() {
        let (bus, mut receivers) = MessageBus::new(2);
        receivers.remove(1);

        // Must not panic or block; the message just disappears.
        bus.send(1, message("into the void"));
        assert!(receivers[0].try_recv().is_err());
    }
}
