mod causal;
mod network;
mod prompt;

use std::io;

use tracing_subscriber::EnvFilter;

use crate::network::Cluster;

/*
    Interactive front end for the causal-broadcast cluster. The operator
    picks a sender, types a batch of message bodies and says whether the
    batch should go out in scrambled wire order; the chosen node stamps and
    broadcasts it, and every peer's deliveries show up in the log output as
    they happen. Typing "exit" at any prompt shuts the cluster down.
*/

const DEFAULT_CLUSTER_SIZE: usize = 3;

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let size = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_CLUSTER_SIZE);

    let cluster = Cluster::spawn(size);
    println!("Welcome to message sender: {} nodes up, \"exit\" quits.", size);

    while let Some(()) = run_prompt(&cluster).await? {}

    if let Err(violation) = cluster.shutdown().await {
        eprintln!("cluster stopped on a protocol violation: {}", violation);
    }
    Ok(())
}

/// One round of the prompt loop; None means the operator asked to exit.
async fn run_prompt(cluster: &Cluster) -> io::Result<Option<()>> {
    let sender = loop {
        let Some(id) = prompt::read_usize("Sender id:").await? else {
            return Ok(None);
        };
        if id < cluster.size() {
            break id;
        }
        eprintln!("sender id must be below {}", cluster.size());
    };

    let Some(count) = prompt::read_usize("Number of messages:").await? else {
        return Ok(None);
    };
    let mut bodies = Vec::with_capacity(count);
    for i in 0..count {
        let Some(body) = prompt::read_string(&format!("Body {}:", i)).await? else {
            return Ok(None);
        };
        bodies.push(body);
    }

    let Some(shuffle) = prompt::read_bool("Send out of order (true | false):").await? else {
        return Ok(None);
    };

    if let Err(unavailable) = cluster.handle(sender).submit(bodies, shuffle).await {
        eprintln!("submission failed: {}", unavailable);
    }
    Ok(Some(()))
}
