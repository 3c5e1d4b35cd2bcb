//! # Graph
//!
//! A [`Graph`] owns a set of named processes, the connections between their
//! ports, the external ports it exports, and the IIPs it will deliver when it
//! starts. Building a graph is single-threaded: every wiring call takes
//! `&mut self` and completes before any process runs. Once running, the only
//! shared mutable state is the listener-count table used to decide when a
//! channel may be closed (see [`crate::graph::execution`]).
//!
//! ## Graph as Component
//!
//! `Graph` implements [`Component`], so a graph with mapped external ports can
//! be added to another graph like any leaf process. Wiring calls on the outer
//! graph resolve through the subgraph's port map down to the leaf port.
//!
//! ```rust,no_run
//! # use weaveflow::component::Component;
//! # fn echo() -> Box<dyn Component> { unimplemented!() }
//! # fn doubler() -> Box<dyn Component> { unimplemented!() }
//! use weaveflow::graph::Graph;
//!
//! let mut net = Graph::new();
//! net.add("e", echo())?;
//! net.add("d", doubler())?;
//! net.connect("e", "Out", "d", "In")?;
//! net.map_in_port("In", "e", "In")?;
//! net.map_out_port("Out", "d", "Out")?;
//! # Ok::<(), weaveflow::error::GraphError>(())
//! ```

use crate::address::{Address, PortKind};
use crate::channel::{AnyChannel, ChannelId};
use crate::component::Component;
use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::factory::Factory;
use crate::graph::connection::Connection;
use crate::graph::iip::Iip;
use crate::port::PortTable;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// An exported port: the internal address it stands for and, once set, the
/// caller's channel bound to it.
#[derive(Debug, Clone)]
pub(crate) struct ExternalPort {
  pub(crate) address: Address,
  pub(crate) channel: Option<AnyChannel>,
}

/// A network of processes.
///
/// Concurrent mutation is not supported: calling wiring operations on a graph
/// while it runs is undefined as far as the engine is concerned, and a graph
/// runs once (starting it moves its processes into tasks).
pub struct Graph {
  pub(crate) config: GraphConfig,
  pub(crate) processes: HashMap<String, Box<dyn Component>>,
  pub(crate) in_ports: HashMap<String, ExternalPort>,
  pub(crate) out_ports: HashMap<String, ExternalPort>,
  pub(crate) connections: Vec<Connection>,
  pub(crate) iips: Vec<Iip>,
  /// Listener counts per channel, filled while wiring and handed to the
  /// shutdown supervisors when the graph starts.
  pub(crate) listeners: HashMap<ChannelId, usize>,
  /// A graph's own ports are its mapped ports; its table stays empty.
  pub(crate) ports: PortTable,
}

impl Graph {
  /// An empty graph with default configuration.
  pub fn new() -> Self {
    Self::with_config(GraphConfig::default())
  }

  /// An empty graph.
  pub fn with_config(config: GraphConfig) -> Self {
    trace!("Graph::with_config(config={:?})", config);
    Self {
      processes: HashMap::with_capacity(config.capacity),
      in_ports: HashMap::new(),
      out_ports: HashMap::new(),
      connections: Vec::with_capacity(config.capacity),
      iips: Vec::new(),
      listeners: HashMap::with_capacity(config.capacity),
      ports: PortTable::new(),
      config,
    }
  }

  /// The configuration this graph was created with.
  pub fn config(&self) -> &GraphConfig {
    &self.config
  }

  /// Adds a process under `name`.
  ///
  /// # Errors
  ///
  /// [`GraphError::ProcessExists`] if the name is taken.
  pub fn add(&mut self, name: &str, process: Box<dyn Component>) -> Result<(), GraphError> {
    trace!("Graph::add(name={})", name);
    if self.processes.contains_key(name) {
      return Err(GraphError::ProcessExists(name.to_string()));
    }
    self.processes.insert(name.to_string(), process);
    Ok(())
  }

  /// Creates a `component` instance with `factory` and adds it as `name`.
  pub fn add_new(&mut self, name: &str, component: &str, factory: &Factory) -> Result<(), GraphError> {
    trace!("Graph::add_new(name={}, component={})", name, component);
    if self.processes.contains_key(name) {
      return Err(GraphError::ProcessExists(name.to_string()));
    }
    let process = factory.create(component)?;
    self.add(name, process)
  }

  /// Removes a process that nothing refers to any more.
  ///
  /// # Errors
  ///
  /// - [`GraphError::ProcessNotFound`] if there is no such process
  /// - [`GraphError::ProcessInUse`] if a connection, IIP or external port
  ///   mapping still names it
  pub fn remove(&mut self, name: &str) -> Result<(), GraphError> {
    trace!("Graph::remove(name={})", name);
    if !self.processes.contains_key(name) {
      return Err(GraphError::ProcessNotFound(name.to_string()));
    }

    let wired = self
      .connections
      .iter()
      .any(|c| c.source().process == name || c.target().process == name)
      || self.iips.iter().any(|iip| iip.target().process == name)
      || self
        .in_ports
        .values()
        .chain(self.out_ports.values())
        .any(|p| p.address.process == name);
    if wired {
      return Err(GraphError::ProcessInUse(name.to_string()));
    }

    self.processes.remove(name);
    debug!("removed process '{}'", name);
    Ok(())
  }

  /// The process named `name`.
  pub fn get(&self, name: &str) -> Option<&dyn Component> {
    self.processes.get(name).map(|p| p.as_ref())
  }

  /// Whether a process named `name` exists.
  pub fn has(&self, name: &str) -> bool {
    self.processes.contains_key(name)
  }

  /// Process names, sorted.
  pub fn process_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.processes.keys().cloned().collect();
    names.sort();
    names
  }

  /// Number of processes.
  pub fn len(&self) -> usize {
    self.processes.len()
  }

  /// Whether the graph has no processes.
  pub fn is_empty(&self) -> bool {
    self.processes.is_empty()
  }

  /// Current listener count of a channel (`None` if the graph never counted
  /// it). Meaningful while building; the table moves out when the graph runs.
  pub fn listener_count(&self, channel: ChannelId) -> Option<usize> {
    self.listeners.get(&channel).copied()
  }

  /// Counts one more listener on `channel`.
  pub(crate) fn add_listener(&mut self, channel: &AnyChannel) -> usize {
    let count = self.listeners.entry(channel.id()).or_insert(0);
    *count += 1;
    *count
  }
}

impl Default for Graph {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Graph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Graph")
      .field("processes", &self.process_names())
      .field("connections", &self.connections)
      .field("in_ports", &self.in_ports.keys().collect::<Vec<_>>())
      .field("out_ports", &self.out_ports.keys().collect::<Vec<_>>())
      .field("iips", &self.iips.len())
      .finish()
  }
}

/// Parses a wiring address and rejects incomplete ones.
pub(crate) fn parse_complete(process: &str, port: &str) -> Result<Address, GraphError> {
  let address = Address::parse(process, port)?;
  if address.kind() == PortKind::None {
    return Err(GraphError::IncompleteAddress(address.to_string()));
  }
  Ok(address)
}
