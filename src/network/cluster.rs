use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::causal::clock::NodeId;
use crate::causal::engine::NodeEngine;
use crate::causal::error::{ClusterError, ProtocolError};
use crate::causal::message::{Command, NodeEvent, NodeSnapshot};
use crate::network::bus::MessageBus;

/// A fixed-size set of nodes wired to one bus, each engine running as its
/// own tokio task. The cluster owns the lifecycle: nodes start here and run
/// until `shutdown`, which cancels everyone and surfaces the first fatal
/// protocol error any node hit.
pub struct Cluster {
    handles: Vec<NodeHandle>,
    tasks: Vec<JoinHandle<Result<(), ProtocolError>>>,
    cancel: CancellationToken,
}

impl Cluster {
    pub fn spawn(size: usize) -> Self {
        Self::build(size, None)
    }

    /// Like `spawn`, but every node additionally reports its protocol
    /// actions on the given event channel.
    pub fn spawn_with_observer(size: usize, events: mpsc::UnboundedSender<NodeEvent>) -> Self {
        Self::build(size, Some(events))
    }

    fn build(size: usize, events: Option<mpsc::UnboundedSender<NodeEvent>>) -> Self {
        assert!(size >= 2, "a cluster needs at least two nodes");

        let (bus, receivers) = MessageBus::new(size);
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(size);
        let mut tasks = Vec::with_capacity(size);

        for (id, bus_rx) in receivers.into_iter().enumerate() {
            let (commands, client_rx) = mpsc::channel(100);
            let engine = NodeEngine::new(
                id,
                bus.clone(),
                bus_rx,
                client_rx,
                cancel.child_token(),
                events.clone(),
            );
            tasks.push(tokio::spawn(async move {
                let result = engine.run().await;
                if let Err(violation) = &result {
                    error!(node = id, %violation, "node aborted");
                }
                result
            }));
            handles.push(NodeHandle { id, commands });
        }

        Cluster {
            handles,
            tasks,
            cancel,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn handle(&self, id: NodeId) -> &NodeHandle {
        &self.handles[id]
    }

    /// Cancels every node and waits for all of them to stop. Returns the
    /// first fatal protocol error, if any node aborted on one.
    pub async fn shutdown(self) -> Result<(), ProtocolError> {
        self.cancel.cancel();
        drop(self.handles);

        let mut first_violation = None;
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(violation)) => {
                    first_violation.get_or_insert(violation);
                }
                Err(join_error) => warn!(%join_error, "node task did not stop cleanly"),
            }
        }
        match first_violation {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }
}

/// Client-side entry point for one node: submissions and state queries go
/// over the node's sequential command lane.
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    commands: mpsc::Sender<Command>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Hands a batch of bodies to the node to stamp and broadcast.
    /// Fire-and-forget: completion means the node accepted the batch, not
    /// that peers have delivered it.
    pub async fn submit(&self, bodies: Vec<String>, shuffle: bool) -> Result<(), ClusterError> {
        self.commands
            .send(Command::Submit { bodies, shuffle })
            .await
            .map_err(|_| ClusterError::NodeUnavailable(self.id))
    }

    /// Asks the node for a copy of its clock and logs.
    pub async fn snapshot(&self) -> Result<NodeSnapshot, ClusterError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| ClusterError::NodeUnavailable(self.id))?;
        response
            .await
            .map_err(|_| ClusterError::NodeUnavailable(self.id))
    }
}
