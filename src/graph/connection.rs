//! # Connection Engine
//!
//! Turns `(sender, receiver)` address pairs into shared channels bound to
//! component ports.
//!
//! ## Channel Sharing
//!
//! A new connection reuses an existing channel when it can:
//!
//! 1. another connection already leaves from the same sender address: the
//!    receivers share that channel (fan-out, competing consumers);
//! 2. otherwise another connection already arrives at the same receiver
//!    address: the senders share that channel (fan-in);
//! 3. otherwise a fresh channel is created with the requested buffer size.
//!
//! Every connection counts one listener on its channel. When a process
//! terminates, each of its outgoing connections gives its count back, and the
//! one that brings a channel to zero closes it. That is the only place a
//! channel opened by the graph gets closed.
//!
//! ## Atomicity
//!
//! Each `connect` call resolves and validates both ends before touching any
//! port, so a failed call leaves no channel half-attached. Earlier successful
//! calls are not rolled back.

use crate::address::{Address, PortKind};
use crate::channel::AnyChannel;
use crate::error::GraphError;
use crate::graph::graph::{Graph, parse_complete};
use crate::port::{Direction, PortRef};
use std::fmt;
use tracing::{debug, trace};

/// A wired edge between two ports.
#[derive(Clone)]
pub struct Connection {
  pub(crate) source: Address,
  pub(crate) target: Address,
  pub(crate) channel: AnyChannel,
  pub(crate) buffer_size: usize,
}

impl Connection {
  /// Sender address.
  pub fn source(&self) -> &Address {
    &self.source
  }

  /// Receiver address.
  pub fn target(&self) -> &Address {
    &self.target
  }

  /// The channel this edge uses; shared with other edges on fan-out/fan-in.
  pub fn channel(&self) -> &AnyChannel {
    &self.channel
  }

  /// Buffer size requested for this edge.
  pub fn buffer_size(&self) -> usize {
    self.buffer_size
  }
}

impl fmt::Debug for Connection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} -> {} ({}, buffer {})",
      self.source,
      self.target,
      self.channel.id(),
      self.buffer_size
    )
  }
}

impl Graph {
  /// Connects a sender port to a receiver port using the configured default
  /// buffer size.
  pub fn connect(
    &mut self,
    sender_process: &str,
    sender_port: &str,
    receiver_process: &str,
    receiver_port: &str,
  ) -> Result<(), GraphError> {
    let buffer_size = self.config.buffer_size;
    self.connect_buf(
      sender_process,
      sender_port,
      receiver_process,
      receiver_port,
      buffer_size,
    )
  }

  /// Connects a sender port to a receiver port.
  ///
  /// `buffer_size` only applies when a new channel is created; a shared
  /// channel keeps the capacity it was created with.
  ///
  /// # Errors
  ///
  /// [`GraphError::Connect`] naming both ends, wrapping one of: a malformed
  /// address, an unknown process or port, a direction, shape or element type
  /// mismatch, or a port already bound to another channel.
  pub fn connect_buf(
    &mut self,
    sender_process: &str,
    sender_port: &str,
    receiver_process: &str,
    receiver_port: &str,
    buffer_size: usize,
  ) -> Result<(), GraphError> {
    trace!(
      "Graph::connect_buf(sender={}.{}, receiver={}.{}, buffer_size={})",
      sender_process, sender_port, receiver_process, receiver_port, buffer_size
    );
    self
      .wire(
        sender_process,
        sender_port,
        receiver_process,
        receiver_port,
        buffer_size,
      )
      .map_err(|source| GraphError::Connect {
        sender: format!("{}.{}", sender_process, sender_port),
        receiver: format!("{}.{}", receiver_process, receiver_port),
        source: Box::new(source),
      })
  }

  fn wire(
    &mut self,
    sender_process: &str,
    sender_port: &str,
    receiver_process: &str,
    receiver_port: &str,
    buffer_size: usize,
  ) -> Result<(), GraphError> {
    let source = parse_complete(sender_process, sender_port)?;
    let target = parse_complete(receiver_process, receiver_port)?;

    let sender = self.resolve_port(&source, Direction::Out)?;
    let receiver = self.resolve_port(&target, Direction::In)?;

    let element = sender.descriptor.element();
    if element != receiver.descriptor.element() {
      return Err(GraphError::TypeMismatch {
        address: target.to_string(),
        expected: receiver.descriptor.element().name(),
        found: element.name(),
      });
    }

    let shared = self
      .connections
      .iter()
      .find(|c| c.source == source)
      .or_else(|| self.connections.iter().find(|c| c.target == target))
      .map(|c| c.channel.clone());
    let reused = shared.is_some();
    let channel = shared.unwrap_or_else(|| AnyChannel::new(element, buffer_size));

    sender.check(&channel)?;
    receiver.check(&channel)?;
    sender.attach(&channel);
    receiver.attach(&channel);

    let listeners = self.add_listener(&channel);
    debug!(
      "connected {} -> {} on {} channel {} (listeners={})",
      source,
      target,
      if reused { "shared" } else { "new" },
      channel.id(),
      listeners
    );

    self.connections.push(Connection {
      source,
      target,
      channel,
      buffer_size,
    });
    Ok(())
  }

  /// All connections, in the order they were made.
  pub fn connections(&self) -> &[Connection] {
    &self.connections
  }

  /// Resolves `address` to the leaf port it denotes, recursing through
  /// subgraphs' external port maps.
  pub(crate) fn resolve_port(
    &self,
    address: &Address,
    direction: Direction,
  ) -> Result<PortRef, GraphError> {
    let process = self
      .processes
      .get(&address.process)
      .ok_or_else(|| GraphError::ProcessNotFound(address.process.clone()))?;

    if let Some(subgraph) = process.as_graph() {
      let (wanted, other) = match direction {
        Direction::In => (&subgraph.in_ports, &subgraph.out_ports),
        Direction::Out => (&subgraph.out_ports, &subgraph.in_ports),
      };
      let Some(exported) = wanted.get(&address.port) else {
        if other.contains_key(&address.port) {
          return Err(GraphError::DirectionMismatch {
            address: address.to_string(),
            declared: opposite(direction),
            requested: direction,
          });
        }
        return Err(GraphError::PortNotFound {
          process: address.process.clone(),
          port: address.port.clone(),
        });
      };
      let inner = through_subgraph(&exported.address, address)?;
      return subgraph.resolve_port(&inner, direction);
    }

    let descriptor = process
      .ports()
      .get(&address.port)
      .ok_or_else(|| GraphError::PortNotFound {
        process: address.process.clone(),
        port: address.port.clone(),
      })?;
    if descriptor.direction() != direction {
      return Err(GraphError::DirectionMismatch {
        address: address.to_string(),
        declared: descriptor.direction(),
        requested: direction,
      });
    }
    PortRef::new(address.clone(), descriptor.clone())
  }
}

fn opposite(direction: Direction) -> Direction {
  match direction {
    Direction::In => Direction::Out,
    Direction::Out => Direction::In,
  }
}

/// Carries an outer subscript onto a subgraph's exported address.
///
/// A scalar export of an array or map port takes the outer index or key;
/// an export that already selects a slot cannot take another one.
fn through_subgraph(exported: &Address, outer: &Address) -> Result<Address, GraphError> {
  match (outer.kind(), exported.kind()) {
    (PortKind::Scalar, _) => Ok(exported.clone()),
    (_, PortKind::Scalar) => Ok(Address {
      index: outer.index,
      key: outer.key.clone(),
      ..exported.clone()
    }),
    (_, declared) => Err(GraphError::KindMismatch {
      address: outer.to_string(),
      declared,
    }),
  }
}
