//! # Graph Execution
//!
//! Starting a graph:
//!
//! 1. resolves pending IIPs to channels (a failure here aborts startup);
//! 2. spawns one delivery task per IIP channel;
//! 3. runs every process and spawns a supervisor for it;
//! 4. waits for every delivery and every supervisor.
//!
//! A supervisor waits for its process to return, then gives back one listener
//! for each outgoing connection (and mapped out-port) of that process,
//! closing each channel whose count reaches zero. Closing is how termination
//! travels downstream: a consumer ends when its inputs close, its supervisor
//! closes its outputs, and so on until the graph has drained.
//!
//! An IIP delivery that writes onto a channel this graph counts (a connection
//! channel) holds one listener of its own until its last packet is sent, so
//! the upstream process finishing first cannot close the channel under it.
//!
//! The listener table is the only state the running tasks share and the only
//! thing guarded by a lock.

use crate::channel::{AnyChannel, ChannelId};
use crate::component::{Component, run_boxed};
use crate::error::GraphError;
use crate::graph::graph::Graph;
use crate::port::PortTable;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// Listener counts shared by the running graph's supervisors and IIP
/// deliveries.
pub(crate) type ListenerTable = Arc<Mutex<HashMap<ChannelId, usize>>>;

impl Graph {
  /// Runs the graph to completion.
  ///
  /// Returns once every IIP has been sent and every process has terminated
  /// and had its outputs closed. A graph runs once; its processes move into
  /// tasks.
  ///
  /// # Errors
  ///
  /// [`GraphError::Delivery`] if an IIP target cannot be resolved. No process
  /// is started in that case, and the channels the graph would have closed
  /// on their behalf are closed right away so outside readers do not hang.
  pub async fn execute(&mut self) -> Result<(), GraphError> {
    trace!("Graph::execute(processes={})", self.processes.len());
    let mut outbound = self.outbound_channels();
    let prepared = self.prepare_iips();
    let listeners: ListenerTable = Arc::new(Mutex::new(std::mem::take(&mut self.listeners)));

    let deliveries = match prepared {
      Ok(deliveries) => deliveries,
      Err(err) => {
        error!("aborting graph startup: {}", err);
        let names: Vec<String> = std::mem::take(&mut self.processes).into_keys().collect();
        for name in names {
          if let Some(channels) = outbound.remove(&name) {
            release_outbound(&listeners, &format!("process '{}'", name), &channels).await;
          }
        }
        return Err(err);
      }
    };

    let deliveries: Vec<JoinHandle<()>> = deliveries
      .into_iter()
      .map(|delivery| tokio::spawn(delivery.deliver(Arc::clone(&listeners))))
      .collect();

    let mut supervisors: Vec<JoinHandle<()>> = Vec::with_capacity(self.processes.len());
    for (name, process) in self.processes.drain() {
      let done = run_boxed(process);
      let channels = outbound.remove(&name).unwrap_or_default();
      let listeners = Arc::clone(&listeners);
      supervisors.push(tokio::spawn(async move {
        done.await;
        debug!("process '{}' terminated", name);
        release_outbound(&listeners, &format!("process '{}'", name), &channels).await;
      }));
    }

    for task in deliveries.into_iter().chain(supervisors) {
      if let Err(err) = task.await {
        error!("graph task failed: {}", err);
      }
    }
    debug!("graph drained");
    Ok(())
  }

  /// Channels each process writes to, once per counted listener.
  fn outbound_channels(&self) -> HashMap<String, Vec<AnyChannel>> {
    let mut outbound: HashMap<String, Vec<AnyChannel>> = HashMap::new();
    for connection in &self.connections {
      outbound
        .entry(connection.source.process.clone())
        .or_default()
        .push(connection.channel.clone());
    }
    for port in self.out_ports.values() {
      if let Some(channel) = &port.channel {
        outbound
          .entry(port.address.process.clone())
          .or_default()
          .push(channel.clone());
      }
    }
    outbound
  }
}

/// Gives back one listener per entry and closes the channels that reach zero.
async fn release_outbound(listeners: &ListenerTable, process: &str, channels: &[AnyChannel]) {
  for channel in channels {
    release_listener(listeners, process, channel).await;
  }
}

/// Gives back one listener on `channel`, closing it when none are left.
pub(crate) async fn release_listener(listeners: &ListenerTable, writer: &str, channel: &AnyChannel) {
  let mut counts = listeners.lock().await;
  let Some(count) = counts.get_mut(&channel.id()) else {
    error!(
      "{} releases channel {} which has no listener count",
      writer,
      channel.id()
    );
    return;
  };
  *count -= 1;
  if *count == 0 {
    counts.remove(&channel.id());
    debug!("{} closes channel {}", writer, channel.id());
    channel.close();
  } else {
    trace!(
      "{} released channel {} (listeners={})",
      writer,
      channel.id(),
      count
    );
  }
}

#[async_trait]
impl Component for Graph {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    if let Err(err) = self.execute().await {
      error!("graph failed to start: {}", err);
    }
  }

  fn as_graph(&self) -> Option<&Graph> {
    Some(self)
  }
}
