//! # Error Types
//!
//! Wiring errors are returned synchronously by the call that caused them and
//! leave the graph as it was before that call. Errors that surface at run
//! start (an IIP whose target cannot be resolved) abort that graph's startup.
//! Failures inside a component are the component's business: it reports them
//! on its own ports, never through the engine.

use crate::address::{AddressError, PortKind};
use crate::factory::FactoryError;
use crate::port::Direction;
use thiserror::Error;

/// Errors raised while building or starting a [`crate::graph::Graph`].
#[derive(Debug, Error)]
pub enum GraphError {
  /// A port reference could not be parsed.
  #[error("invalid port reference: {0}")]
  Address(#[from] AddressError),

  /// A port reference is missing its process or port name.
  #[error("incomplete address '{0}': process and port are required")]
  IncompleteAddress(String),

  /// No process with this name.
  #[error("process '{0}' not found")]
  ProcessNotFound(String),

  /// A process with this name already exists.
  #[error("process '{0}' already exists")]
  ProcessExists(String),

  /// The process is still referenced and cannot be removed.
  #[error("process '{0}' is still wired and cannot be removed")]
  ProcessInUse(String),

  /// The process has no port with this name.
  #[error("process '{process}' has no port '{port}'")]
  PortNotFound {
    /// Process name.
    process: String,
    /// Port name.
    port: String,
  },

  /// The port exists but points the other way.
  #[error("port '{address}' is an {declared} port, cannot use it as {requested}")]
  DirectionMismatch {
    /// Offending address.
    address: String,
    /// Direction the component declares.
    declared: Direction,
    /// Direction the wiring call needs.
    requested: Direction,
  },

  /// The address shape does not fit the declared port shape.
  #[error("address '{address}' does not fit {declared} port")]
  KindMismatch {
    /// Offending address.
    address: String,
    /// Shape the component declares.
    declared: PortKind,
  },

  /// An array subscript beyond the supported slot range.
  #[error("index {index} in '{address}' exceeds the highest array slot {max}")]
  IndexOutOfRange {
    /// Offending address.
    address: String,
    /// Requested index.
    index: usize,
    /// Highest accepted index.
    max: usize,
  },

  /// The channel carries a different element type than the port.
  #[error("port '{address}' carries {expected}, channel carries {found}")]
  TypeMismatch {
    /// Offending address.
    address: String,
    /// Port element type.
    expected: &'static str,
    /// Channel element type.
    found: &'static str,
  },

  /// The port slot is already bound to a different channel.
  #[error("port '{0}' is already bound to another channel")]
  PortBound(String),

  /// A wiring call failed; names both ends and wraps the cause.
  #[error("cannot connect {sender} -> {receiver}")]
  Connect {
    /// Sender address as written.
    sender: String,
    /// Receiver address as written.
    receiver: String,
    /// What went wrong.
    #[source]
    source: Box<GraphError>,
  },

  /// No external in-port with this name.
  #[error("inport '{0}' is not defined")]
  InPortNotDefined(String),

  /// No external out-port with this name.
  #[error("outport '{0}' is not defined")]
  OutPortNotDefined(String),

  /// No pending IIP matches.
  #[error("no IIP registered for '{0}'")]
  IipNotFound(String),

  /// An IIP could not be delivered at run start.
  #[error("cannot deliver IIP to '{target}'")]
  Delivery {
    /// IIP target address.
    target: String,
    /// What went wrong.
    #[source]
    source: Box<GraphError>,
  },

  /// A component could not be created.
  #[error(transparent)]
  Factory(#[from] FactoryError),
}
