use thiserror::Error;

use super::clock::NodeId;

/// Fatal protocol violations. Anything recoverable (duplicates, buffered
/// gaps) is handled inline and never surfaces as an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A peer asked for a timestamp this node never originated. That means
    /// someone's clock bookkeeping is broken, and answering anyway would
    /// risk handing out wrong data, so the node aborts instead.
    #[error(
        "node {node}: peer {requester} requested resend of timestamp {timestamp} \
         but local origin log holds {log_len} messages"
    )]
    ResendOutOfRange {
        node: NodeId,
        requester: NodeId,
        timestamp: u64,
        log_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The node's engine has stopped (aborted on a protocol violation or
    /// shut down) and no longer accepts requests.
    #[error("node {0} is no longer accepting requests")]
    NodeUnavailable(NodeId),
}
