//! # Ports and Port Tables
//!
//! A component declares its ports as fields and lists them once, in its
//! constructor, in a [`PortTable`]. The graph wires channels into those fields
//! through the table; the component then reads and writes through the same
//! fields. Nothing is discovered by introspection: a port the table does not
//! name cannot be wired.
//!
//! ```rust
//! use weaveflow::port::{InPort, OutPort, PortTable};
//!
//! struct Doubler {
//!   input: InPort<i64>,
//!   out: OutPort<i64>,
//!   ports: PortTable,
//! }
//!
//! impl Doubler {
//!   fn new() -> Self {
//!     let input = InPort::new();
//!     let out = OutPort::new();
//!     let ports = PortTable::builder().port("In", &input).port("Out", &out).build();
//!     Self { input, out, ports }
//!   }
//! }
//! ```
//!
//! ## Port Shapes
//!
//! | Type | Address form | Storage |
//! |------|--------------|---------|
//! | [`InPort`] / [`OutPort`] | `proc.Port` | one channel |
//! | [`InArrayPort`] / [`OutArrayPort`] | `proc.Port[3]` | indexed slots, grown on demand |
//! | [`InMapPort`] / [`OutMapPort`] | `proc.Port[key]` | keyed slots, created on demand |

use crate::address::{Address, PortKind, canonical_port_name};
use crate::channel::{AnyChannel, ElementType, Packet, SendError};
use crate::error::GraphError;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};

/// Direction of a port, seen from the component that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  /// The component receives on this port.
  In,
  /// The component sends on this port.
  Out,
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Direction::In => f.write_str("in"),
      Direction::Out => f.write_str("out"),
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Highest index an array port slot may be wired at.
pub const MAX_ARRAY_INDEX: usize = u16::MAX as usize;

type ScalarSlot = Arc<Mutex<Option<AnyChannel>>>;
type ArraySlot = Arc<Mutex<Vec<Option<AnyChannel>>>>;
type MapSlot = Arc<Mutex<HashMap<String, AnyChannel>>>;

/// Shared storage behind a port field. Opaque outside the crate.
#[derive(Clone)]
pub struct PortSlot(SlotInner);

#[derive(Clone)]
enum SlotInner {
  Scalar(ScalarSlot),
  Array(ArraySlot),
  Map(MapSlot),
}

impl PortSlot {
  fn kind(&self) -> PortKind {
    match self.0 {
      SlotInner::Scalar(_) => PortKind::Scalar,
      SlotInner::Array(_) => PortKind::Array,
      SlotInner::Map(_) => PortKind::Map,
    }
  }
}

/// Implemented by every port field type so it can be listed in a
/// [`PortTable`].
pub trait PortField {
  /// Direction of the port.
  fn direction(&self) -> Direction;
  /// Element type of the values on the port.
  fn element(&self) -> ElementType;
  /// Handle onto the field's channel storage.
  fn slot(&self) -> PortSlot;
}

/// One entry of a [`PortTable`].
#[derive(Clone)]
pub struct PortDescriptor {
  name: String,
  direction: Direction,
  element: ElementType,
  slot: PortSlot,
}

impl PortDescriptor {
  /// Canonical port name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Direction of the port.
  pub fn direction(&self) -> Direction {
    self.direction
  }

  /// Declared shape of the port.
  pub fn kind(&self) -> PortKind {
    self.slot.kind()
  }

  /// Element type of the port.
  pub fn element(&self) -> ElementType {
    self.element
  }

  /// Serializable summary.
  pub fn spec(&self) -> PortSpec {
    PortSpec {
      name: self.name.clone(),
      direction: self.direction,
      kind: self.kind().to_string(),
      element: self.element.name().to_string(),
    }
  }
}

impl fmt::Debug for PortDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PortDescriptor")
      .field("name", &self.name)
      .field("direction", &self.direction)
      .field("kind", &self.kind())
      .field("element", &self.element)
      .finish()
  }
}

/// Serializable description of a port, for component listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
  /// Canonical port name.
  pub name: String,
  /// Direction of the port.
  pub direction: Direction,
  /// `scalar`, `array` or `map`.
  pub kind: String,
  /// Rust type name of the values on the port.
  pub element: String,
}

/// The port descriptor table of one component instance.
#[derive(Clone, Default)]
pub struct PortTable {
  ports: HashMap<String, PortDescriptor>,
}

impl PortTable {
  /// An empty table.
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts building a table.
  pub fn builder() -> PortTableBuilder {
    PortTableBuilder {
      table: PortTable::new(),
    }
  }

  /// Looks up a port by name (canonicalized before lookup).
  pub fn get(&self, name: &str) -> Option<&PortDescriptor> {
    self.ports.get(&canonical_port_name(name))
  }

  /// Number of ports.
  pub fn len(&self) -> usize {
    self.ports.len()
  }

  /// Whether the component declares no ports.
  pub fn is_empty(&self) -> bool {
    self.ports.is_empty()
  }

  /// Port descriptors, in name order.
  pub fn descriptors(&self) -> Vec<&PortDescriptor> {
    let mut all: Vec<&PortDescriptor> = self.ports.values().collect();
    all.sort_by(|a, b| a.name.cmp(&b.name));
    all
  }

  /// Serializable summaries of the ports in one direction, in name order.
  pub fn specs(&self, direction: Direction) -> Vec<PortSpec> {
    self
      .descriptors()
      .into_iter()
      .filter(|d| d.direction == direction)
      .map(PortDescriptor::spec)
      .collect()
  }
}

impl fmt::Debug for PortTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.descriptors()).finish()
  }
}

/// Builder for [`PortTable`].
pub struct PortTableBuilder {
  table: PortTable,
}

impl PortTableBuilder {
  /// Lists `field` under `name`.
  pub fn port(mut self, name: &str, field: &impl PortField) -> Self {
    let name = canonical_port_name(name);
    let descriptor = PortDescriptor {
      name: name.clone(),
      direction: field.direction(),
      element: field.element(),
      slot: field.slot(),
    };
    if self.table.ports.insert(name.clone(), descriptor).is_some() {
      warn!("port '{}' listed twice; keeping the last declaration", name);
    }
    self
  }

  /// Finishes the table.
  pub fn build(self) -> PortTable {
    self.table
  }
}

/// A port descriptor narrowed to the slot an address selects.
#[derive(Clone, Debug)]
pub(crate) struct PortRef {
  pub(crate) address: Address,
  pub(crate) descriptor: PortDescriptor,
}

impl PortRef {
  /// Pairs `descriptor` with `address`, checking the address shape against
  /// the declared shape and array indices against [`MAX_ARRAY_INDEX`].
  pub(crate) fn new(address: Address, descriptor: PortDescriptor) -> Result<Self, GraphError> {
    if address.kind() != descriptor.kind() {
      return Err(GraphError::KindMismatch {
        address: address.to_string(),
        declared: descriptor.kind(),
      });
    }
    if let Some(index) = address.index.filter(|&i| i > MAX_ARRAY_INDEX) {
      return Err(GraphError::IndexOutOfRange {
        address: address.to_string(),
        index,
        max: MAX_ARRAY_INDEX,
      });
    }
    Ok(Self {
      address,
      descriptor,
    })
  }

  /// The channel currently in the selected slot.
  pub(crate) fn bound(&self) -> Option<AnyChannel> {
    match &self.descriptor.slot.0 {
      SlotInner::Scalar(slot) => lock(slot).clone(),
      SlotInner::Array(slot) => self
        .address
        .index
        .and_then(|i| lock(slot).get(i).cloned().flatten()),
      SlotInner::Map(slot) => self
        .address
        .key
        .as_ref()
        .and_then(|k| lock(slot).get(k).cloned()),
    }
  }

  /// Checks that `channel` may be placed in the selected slot.
  pub(crate) fn check(&self, channel: &AnyChannel) -> Result<(), GraphError> {
    if channel.element() != self.descriptor.element {
      return Err(GraphError::TypeMismatch {
        address: self.address.to_string(),
        expected: self.descriptor.element.name(),
        found: channel.element().name(),
      });
    }
    match self.bound() {
      Some(existing) if !existing.same_channel(channel) => Err(GraphError::PortBound(
        self.address.to_string(),
      )),
      _ => Ok(()),
    }
  }

  /// Places `channel` in the selected slot. Call [`PortRef::check`] first.
  pub(crate) fn attach(&self, channel: &AnyChannel) {
    trace!(
      "PortRef::attach(address={}, channel={})",
      self.address,
      channel.id()
    );
    match &self.descriptor.slot.0 {
      SlotInner::Scalar(slot) => {
        *lock(slot) = Some(channel.clone());
      }
      SlotInner::Array(slot) => {
        if let Some((index, len)) = self
          .address
          .index
          .and_then(|i| i.checked_add(1).map(|len| (i, len)))
        {
          let mut slots = lock(slot);
          if slots.len() < len {
            slots.resize(len, None);
          }
          slots[index] = Some(channel.clone());
        }
      }
      SlotInner::Map(slot) => {
        if let Some(key) = &self.address.key {
          lock(slot).insert(key.clone(), channel.clone());
        }
      }
    }
  }

  /// Removes whatever channel sits in the selected slot.
  pub(crate) fn detach(&self) {
    match &self.descriptor.slot.0 {
      SlotInner::Scalar(slot) => {
        lock(slot).take();
      }
      SlotInner::Array(slot) => {
        if let Some(index) = self.address.index {
          if let Some(entry) = lock(slot).get_mut(index) {
            entry.take();
          }
        }
      }
      SlotInner::Map(slot) => {
        if let Some(key) = &self.address.key {
          lock(slot).remove(key);
        }
      }
    }
  }
}

async fn recv_from<T: Any + Send>(channel: Option<AnyChannel>) -> Option<T> {
  let packet = channel?.recv_packet().await?;
  Some(unpack(packet))
}

async fn send_to<T: Any + Send>(channel: Option<AnyChannel>, value: T) -> Result<(), SendError<T>> {
  let Some(channel) = channel else {
    return Err(SendError(value));
  };
  channel
    .send_packet(Box::new(value))
    .await
    .map_err(|SendError(packet)| SendError(unpack(packet)))
}

fn unpack<T: Any>(packet: Packet) -> T {
  match packet.downcast::<T>() {
    Ok(value) => *value,
    Err(_) => unreachable!(
      "port element type was checked at wiring time but packet is not {}",
      std::any::type_name::<T>()
    ),
  }
}

/// Receiving end of a scalar port.
pub struct InPort<T> {
  slot: ScalarSlot,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> InPort<T> {
  /// An unattached port.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(None)),
      _marker: PhantomData,
    }
  }

  /// Receives the next value; `None` once the channel is closed and drained,
  /// or immediately if nothing was attached.
  pub async fn recv(&self) -> Option<T> {
    let channel = lock(&self.slot).clone();
    recv_from(channel).await
  }

  /// Whether a channel has been attached.
  pub fn is_attached(&self) -> bool {
    lock(&self.slot).is_some()
  }

  /// The values arriving on this port as a stream.
  pub fn stream(&self) -> impl Stream<Item = T> + Send + use<T> {
    let channel = lock(&self.slot).clone();
    futures::stream::unfold(channel, |channel| async move {
      let value = recv_from::<T>(channel.clone()).await?;
      Some((value, channel))
    })
  }
}

impl<T: Any + Send> Default for InPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for InPort<T> {
  fn direction(&self) -> Direction {
    Direction::In
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Scalar(Arc::clone(&self.slot)))
  }
}

/// Sending end of a scalar port.
pub struct OutPort<T> {
  slot: ScalarSlot,
  _marker: PhantomData<fn(T)>,
}

impl<T: Any + Send> OutPort<T> {
  /// An unattached port.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(None)),
      _marker: PhantomData,
    }
  }

  /// Sends a value, honoring the channel's backpressure.
  pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
    let channel = lock(&self.slot).clone();
    send_to(channel, value).await
  }

  /// Whether a channel has been attached.
  pub fn is_attached(&self) -> bool {
    lock(&self.slot).is_some()
  }
}

impl<T: Any + Send> Default for OutPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for OutPort<T> {
  fn direction(&self) -> Direction {
    Direction::Out
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Scalar(Arc::clone(&self.slot)))
  }
}

fn attached_indices(slot: &ArraySlot) -> Vec<usize> {
  lock(slot)
    .iter()
    .enumerate()
    .filter_map(|(i, c)| c.as_ref().map(|_| i))
    .collect()
}

/// Receiving end of an array port (`Port[0]`, `Port[1]`, ...).
pub struct InArrayPort<T> {
  slot: ArraySlot,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> InArrayPort<T> {
  /// A port with no slots.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(Vec::new())),
      _marker: PhantomData,
    }
  }

  /// Length of the slot vector (highest wired index + 1).
  pub fn len(&self) -> usize {
    lock(&self.slot).len()
  }

  /// Whether no slot was ever wired.
  pub fn is_empty(&self) -> bool {
    lock(&self.slot).is_empty()
  }

  /// Indices that have a channel attached, ascending.
  pub fn indices(&self) -> Vec<usize> {
    attached_indices(&self.slot)
  }

  /// Receives from slot `index`; `None` if closed, drained or unattached.
  pub async fn recv(&self, index: usize) -> Option<T> {
    let channel = lock(&self.slot).get(index).cloned().flatten();
    recv_from(channel).await
  }
}

impl<T: Any + Send> Default for InArrayPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for InArrayPort<T> {
  fn direction(&self) -> Direction {
    Direction::In
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Array(Arc::clone(&self.slot)))
  }
}

/// Sending end of an array port.
pub struct OutArrayPort<T> {
  slot: ArraySlot,
  _marker: PhantomData<fn(T)>,
}

impl<T: Any + Send> OutArrayPort<T> {
  /// A port with no slots.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(Vec::new())),
      _marker: PhantomData,
    }
  }

  /// Length of the slot vector (highest wired index + 1).
  pub fn len(&self) -> usize {
    lock(&self.slot).len()
  }

  /// Whether no slot was ever wired.
  pub fn is_empty(&self) -> bool {
    lock(&self.slot).is_empty()
  }

  /// Indices that have a channel attached, ascending.
  pub fn indices(&self) -> Vec<usize> {
    attached_indices(&self.slot)
  }

  /// Sends on slot `index`.
  pub async fn send(&self, index: usize, value: T) -> Result<(), SendError<T>> {
    let channel = lock(&self.slot).get(index).cloned().flatten();
    send_to(channel, value).await
  }
}

impl<T: Any + Send> Default for OutArrayPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for OutArrayPort<T> {
  fn direction(&self) -> Direction {
    Direction::Out
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Array(Arc::clone(&self.slot)))
  }
}

fn sorted_keys(slot: &MapSlot) -> Vec<String> {
  let mut keys: Vec<String> = lock(slot).keys().cloned().collect();
  keys.sort();
  keys
}

/// Receiving end of a map port (`Port[key]`).
pub struct InMapPort<T> {
  slot: MapSlot,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send> InMapPort<T> {
  /// A port with no entries.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(HashMap::new())),
      _marker: PhantomData,
    }
  }

  /// Wired keys, sorted.
  pub fn keys(&self) -> Vec<String> {
    sorted_keys(&self.slot)
  }

  /// Receives from entry `key`; `None` if closed, drained or unattached.
  pub async fn recv(&self, key: &str) -> Option<T> {
    let channel = lock(&self.slot).get(key).cloned();
    recv_from(channel).await
  }
}

impl<T: Any + Send> Default for InMapPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for InMapPort<T> {
  fn direction(&self) -> Direction {
    Direction::In
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Map(Arc::clone(&self.slot)))
  }
}

/// Sending end of a map port.
pub struct OutMapPort<T> {
  slot: MapSlot,
  _marker: PhantomData<fn(T)>,
}

impl<T: Any + Send> OutMapPort<T> {
  /// A port with no entries.
  pub fn new() -> Self {
    Self {
      slot: Arc::new(Mutex::new(HashMap::new())),
      _marker: PhantomData,
    }
  }

  /// Wired keys, sorted.
  pub fn keys(&self) -> Vec<String> {
    sorted_keys(&self.slot)
  }

  /// Sends on entry `key`.
  pub async fn send(&self, key: &str, value: T) -> Result<(), SendError<T>> {
    let channel = lock(&self.slot).get(key).cloned();
    send_to(channel, value).await
  }
}

impl<T: Any + Send> Default for OutMapPort<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Any + Send> PortField for OutMapPort<T> {
  fn direction(&self) -> Direction {
    Direction::Out
  }

  fn element(&self) -> ElementType {
    ElementType::of::<T>()
  }

  fn slot(&self) -> PortSlot {
    PortSlot(SlotInner::Map(Arc::clone(&self.slot)))
  }
}
