//! # Initial Information Packets
//!
//! An IIP is a value handed to a port once, when the graph starts, instead of
//! arriving over a connection. Registering an IIP only records it; the target
//! channel is chosen at start-up, in this order:
//!
//! 1. the channel bound to an external in-port mapped to the same address;
//! 2. the channel of a connection arriving at the same address;
//! 3. a channel already bound to the port from outside this graph;
//! 4. a fresh channel attached to the port just for the IIPs, closed as soon
//!    as they are sent, since nothing else will ever write to it.
//!
//! Deliveries run concurrently, one task per channel, so a slow consumer on
//! one port does not hold back IIPs for the others. IIPs aimed at the same
//! channel are sent in registration order.
//!
//! A delivery onto a channel this graph keeps a listener count for is one
//! more writer on it: it counts a listener while it sends and gives it back
//! when done. Channels owned by the caller (bound external in-ports) or by a
//! parent graph are not counted here; their owners close them.

use crate::address::Address;
use crate::channel::{AnyChannel, ElementType, Packet, SendError};
use crate::error::GraphError;
use crate::graph::execution::{ListenerTable, release_listener};
use crate::graph::graph::{Graph, parse_complete};
use crate::port::Direction;
use std::any::Any;
use std::fmt;
use tracing::{debug, trace, warn};

/// A pending initial packet.
pub struct Iip {
  data: Packet,
  element: ElementType,
  target: Address,
}

impl Iip {
  /// Where the packet goes.
  pub fn target(&self) -> &Address {
    &self.target
  }

  /// Type of the packet.
  pub fn element(&self) -> ElementType {
    self.element
  }
}

impl fmt::Debug for Iip {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "IIP<{}> -> {}", self.element, self.target)
  }
}

/// Packets bound for one channel.
pub(crate) struct Delivery {
  channel: AnyChannel,
  packets: Vec<Packet>,
  close_after: bool,
  /// Holds one listener on `channel` until delivery ends.
  counted: bool,
  target: Address,
}

impl Delivery {
  /// Sends every packet, then closes the channel if it was opened for them
  /// or gives back the listener the delivery held on it.
  pub(crate) async fn deliver(self, listeners: ListenerTable) {
    trace!(
      "Delivery::deliver(target={}, packets={}, close_after={}, counted={})",
      self.target,
      self.packets.len(),
      self.close_after,
      self.counted
    );
    for packet in self.packets {
      if let Err(SendError(_)) = self.channel.send_packet(packet).await {
        warn!("IIP for {} dropped: channel {} is closed", self.target, self.channel.id());
        break;
      }
    }
    if self.close_after {
      self.channel.close();
    } else if self.counted {
      let writer = format!("IIP delivery to {}", self.target);
      release_listener(&listeners, &writer, &self.channel).await;
    }
  }
}

impl Graph {
  /// Registers `data` for delivery to `process.port` when the graph starts.
  ///
  /// # Errors
  ///
  /// A malformed address, or [`GraphError::ProcessNotFound`]. The port itself
  /// is resolved at start-up.
  pub fn add_iip<T: Any + Send>(&mut self, process: &str, port: &str, data: T) -> Result<(), GraphError> {
    trace!("Graph::add_iip(target={}.{})", process, port);
    let target = parse_complete(process, port)?;
    if !self.processes.contains_key(&target.process) {
      return Err(GraphError::ProcessNotFound(target.process));
    }
    self.iips.push(Iip {
      data: Box::new(data),
      element: ElementType::of::<T>(),
      target,
    });
    Ok(())
  }

  /// Removes the first pending IIP aimed at `process.port`.
  pub fn remove_iip(&mut self, process: &str, port: &str) -> Result<(), GraphError> {
    trace!("Graph::remove_iip(target={}.{})", process, port);
    let target = parse_complete(process, port)?;
    let index = self
      .iips
      .iter()
      .position(|iip| iip.target == target)
      .ok_or_else(|| GraphError::IipNotFound(target.to_string()))?;
    self.iips.remove(index);
    Ok(())
  }

  /// Pending IIPs, in registration order.
  pub fn iips(&self) -> &[Iip] {
    &self.iips
  }

  /// Resolves every pending IIP to a channel and groups them per channel.
  pub(crate) fn prepare_iips(&mut self) -> Result<Vec<Delivery>, GraphError> {
    let pending = std::mem::take(&mut self.iips);
    let mut deliveries: Vec<Delivery> = Vec::new();

    for iip in pending {
      let (channel, fresh) = self
        .iip_channel(&iip)
        .map_err(|source| GraphError::Delivery {
          target: iip.target.to_string(),
          source: Box::new(source),
        })?;

      match deliveries
        .iter_mut()
        .find(|d| d.channel.same_channel(&channel))
      {
        Some(delivery) => delivery.packets.push(iip.data),
        None => {
          debug!(
            "IIP for {} goes to {} channel {}",
            iip.target,
            if fresh { "dedicated" } else { "existing" },
            channel.id()
          );
          let counted = !fresh && self.listeners.contains_key(&channel.id());
          deliveries.push(Delivery {
            channel,
            packets: vec![iip.data],
            close_after: fresh,
            counted,
            target: iip.target,
          });
        }
      }
    }

    // Counted only once every IIP resolved, so an aborted start leaves the
    // table as wiring built it.
    for delivery in deliveries.iter().filter(|d| d.counted) {
      let listeners = self.add_listener(&delivery.channel);
      debug!(
        "IIP delivery to {} holds channel {} (listeners={})",
        delivery.target,
        delivery.channel.id(),
        listeners
      );
    }

    Ok(deliveries)
  }

  /// Picks the channel for one IIP. The flag is set when the channel was
  /// created for it.
  fn iip_channel(&self, iip: &Iip) -> Result<(AnyChannel, bool), GraphError> {
    let existing = self
      .in_ports
      .values()
      .find(|p| p.address == iip.target && p.channel.is_some())
      .and_then(|p| p.channel.clone())
      .or_else(|| {
        self
          .connections
          .iter()
          .find(|c| c.target == iip.target)
          .map(|c| c.channel.clone())
      });

    let (channel, fresh) = match existing {
      Some(channel) => (channel, false),
      None => {
        let port = self.resolve_port(&iip.target, Direction::In)?;
        match port.bound() {
          Some(channel) => (channel, false),
          None => {
            if port.descriptor.element() != iip.element {
              return Err(GraphError::TypeMismatch {
                address: iip.target.to_string(),
                expected: port.descriptor.element().name(),
                found: iip.element.name(),
              });
            }
            let channel = AnyChannel::new(port.descriptor.element(), 1);
            port.check(&channel)?;
            port.attach(&channel);
            (channel, true)
          }
        }
      }
    };

    if channel.element() != iip.element {
      return Err(GraphError::TypeMismatch {
        address: iip.target.to_string(),
        expected: channel.element().name(),
        found: iip.element.name(),
      });
    }
    Ok((channel, fresh))
  }
}
