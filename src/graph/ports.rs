//! # External Ports
//!
//! A graph exports internal ports under public names so that host code (or
//! a parent graph) can feed and drain it. Mapping a name only records the
//! internal address; setting it binds a caller-supplied channel to the
//! resolved port the same way `connect` binds one end of a connection.
//!
//! Closing duties differ by direction. The caller writes to an in-port
//! channel and closes it when done. An out-port channel is written by the
//! internal process, so it counts as one listener and the graph closes it
//! once that process terminates.

use crate::address::canonical_port_name;
use crate::channel::Channel;
use crate::error::GraphError;
use crate::graph::graph::{ExternalPort, Graph, parse_complete};
use crate::port::Direction;
use std::any::Any;
use tracing::{debug, trace};

impl Graph {
  /// Exports `process.port` as in-port `name`.
  pub fn map_in_port(&mut self, name: &str, process: &str, port: &str) -> Result<(), GraphError> {
    trace!("Graph::map_in_port(name={}, target={}.{})", name, process, port);
    let address = parse_complete(process, port)?;
    if !self.processes.contains_key(&address.process) {
      return Err(GraphError::ProcessNotFound(address.process));
    }
    self.in_ports.insert(
      canonical_port_name(name),
      ExternalPort {
        address,
        channel: None,
      },
    );
    Ok(())
  }

  /// Exports `process.port` as out-port `name`.
  pub fn map_out_port(&mut self, name: &str, process: &str, port: &str) -> Result<(), GraphError> {
    trace!("Graph::map_out_port(name={}, source={}.{})", name, process, port);
    let address = parse_complete(process, port)?;
    if !self.processes.contains_key(&address.process) {
      return Err(GraphError::ProcessNotFound(address.process));
    }
    self.out_ports.insert(
      canonical_port_name(name),
      ExternalPort {
        address,
        channel: None,
      },
    );
    Ok(())
  }

  /// Binds `channel` to in-port `name`. The caller keeps writing to and
  /// eventually closes the channel.
  ///
  /// # Errors
  ///
  /// [`GraphError::InPortNotDefined`] for an unmapped name, otherwise the same
  /// resolution errors as `connect`.
  pub fn set_in_port<T: Any + Send>(&mut self, name: &str, channel: &Channel<T>) -> Result<(), GraphError> {
    trace!("Graph::set_in_port(name={}, channel={})", name, channel.id());
    let key = canonical_port_name(name);
    let address = self
      .in_ports
      .get(&key)
      .map(|p| p.address.clone())
      .ok_or_else(|| GraphError::InPortNotDefined(name.to_string()))?;

    let port = self.resolve_port(&address, Direction::In)?;
    port.check(channel.raw())?;
    port.attach(channel.raw());

    if let Some(mapping) = self.in_ports.get_mut(&key) {
      mapping.channel = Some(channel.raw().clone());
    }
    debug!("inport {} bound to channel {}", key, channel.id());
    Ok(())
  }

  /// Binds `channel` to out-port `name`. The graph closes the channel after
  /// the internal process writing to it terminates.
  ///
  /// # Errors
  ///
  /// [`GraphError::OutPortNotDefined`] for an unmapped name, otherwise the
  /// same resolution errors as `connect`.
  pub fn set_out_port<T: Any + Send>(&mut self, name: &str, channel: &Channel<T>) -> Result<(), GraphError> {
    trace!("Graph::set_out_port(name={}, channel={})", name, channel.id());
    let key = canonical_port_name(name);
    let (address, previous) = self
      .out_ports
      .get(&key)
      .map(|p| (p.address.clone(), p.channel.clone()))
      .ok_or_else(|| GraphError::OutPortNotDefined(name.to_string()))?;

    if previous.is_some_and(|p| p.same_channel(channel.raw())) {
      return Ok(());
    }

    let port = self.resolve_port(&address, Direction::Out)?;
    port.check(channel.raw())?;
    port.attach(channel.raw());

    let listeners = self.add_listener(channel.raw());
    if let Some(mapping) = self.out_ports.get_mut(&key) {
      mapping.channel = Some(channel.raw().clone());
    }
    debug!(
      "outport {} bound to channel {} (listeners={})",
      key,
      channel.id(),
      listeners
    );
    Ok(())
  }

  /// Drops in-port `name` and detaches its channel, if one was set.
  pub fn unset_in_port(&mut self, name: &str) -> Result<(), GraphError> {
    trace!("Graph::unset_in_port(name={})", name);
    let key = canonical_port_name(name);
    let mapping = self
      .in_ports
      .remove(&key)
      .ok_or_else(|| GraphError::InPortNotDefined(name.to_string()))?;
    if mapping.channel.is_some() {
      self.resolve_port(&mapping.address, Direction::In)?.detach();
    }
    Ok(())
  }

  /// Drops out-port `name`, detaches its channel and gives back its listener.
  pub fn unset_out_port(&mut self, name: &str) -> Result<(), GraphError> {
    trace!("Graph::unset_out_port(name={})", name);
    let key = canonical_port_name(name);
    let mapping = self
      .out_ports
      .remove(&key)
      .ok_or_else(|| GraphError::OutPortNotDefined(name.to_string()))?;
    if let Some(channel) = mapping.channel {
      self.resolve_port(&mapping.address, Direction::Out)?.detach();
      if let Some(count) = self.listeners.get_mut(&channel.id()) {
        *count = count.saturating_sub(1);
        if *count == 0 {
          self.listeners.remove(&channel.id());
        }
      }
    }
    Ok(())
  }

  /// Exported in-port names, sorted.
  pub fn in_port_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.in_ports.keys().cloned().collect();
    names.sort();
    names
  }

  /// Exported out-port names, sorted.
  pub fn out_port_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.out_ports.keys().cloned().collect();
    names.sort();
    names
  }
}
