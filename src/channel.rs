//! # Shared Channels
//!
//! Channels are the edges of a running graph. A channel is a shared handle:
//! cloning it never creates a new channel, and every clone reports the same
//! [`ChannelId`]. The graph keys its listener counts by that id, which is how
//! fan-out and fan-in participants agree on who closes a channel.
//!
//! ## Semantics
//!
//! - Any number of senders and receivers may share a channel. Receivers
//!   compete: each value reaches exactly one of them, in FIFO order.
//! - Capacity `0` is a rendezvous: `send` resolves only once a receiver has
//!   taken the value. Capacity `n` buffers up to `n` values.
//! - Closing is an explicit, observable event. Receivers drain whatever is
//!   buffered and then see `None`. A send after close hands the value back in
//!   a [`SendError`].
//!
//! Values travel type-erased ([`Packet`]); [`Channel<T>`] is the typed view
//! host code uses, and the port types in [`crate::port`] are the typed views
//! components use.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace};

/// Type-erased value carried by a channel.
pub type Packet = Box<dyn Any + Send>;

/// Process-unique identity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Runtime description of the values a channel or port carries.
#[derive(Clone, Copy)]
pub struct ElementType {
  id: TypeId,
  name: &'static str,
}

impl ElementType {
  /// The element type of `T`.
  pub fn of<T: Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  /// Rust type name, for messages and descriptions.
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// Whether this describes `T`.
  pub fn is<T: Any>(&self) -> bool {
    self.id == TypeId::of::<T>()
  }
}

impl PartialEq for ElementType {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for ElementType {}

impl fmt::Debug for ElementType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

impl fmt::Display for ElementType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// Returned when a value cannot be sent; gives the value back.
#[derive(Error)]
#[error("send on a closed or unattached channel")]
pub struct SendError<T>(
  /// The value that could not be sent.
  pub T,
);

impl<T> fmt::Debug for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SendError(..)")
  }
}

/// A packet in flight. `ack` is present on rendezvous channels and fires when
/// a receiver takes the packet.
struct Envelope {
  packet: Packet,
  ack: Option<oneshot::Sender<()>>,
}

struct Inner {
  id: ChannelId,
  capacity: usize,
  element: ElementType,
  /// The one live sender. Taking it out is what closes the channel.
  tx: Mutex<Option<mpsc::Sender<Envelope>>>,
  rx: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
  closed: AtomicBool,
}

/// Type-erased, shareable channel handle.
#[derive(Clone)]
pub struct AnyChannel {
  inner: Arc<Inner>,
}

impl AnyChannel {
  /// Creates a channel for `element` values with the given capacity.
  pub fn new(element: ElementType, capacity: usize) -> Self {
    // Rendezvous channels park one envelope in a single slot and make the
    // sender wait for its acknowledgement.
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
    trace!(
      "AnyChannel::new(id={}, element={}, capacity={})",
      id, element, capacity
    );
    Self {
      inner: Arc::new(Inner {
        id,
        capacity,
        element,
        tx: Mutex::new(Some(tx)),
        rx: tokio::sync::Mutex::new(rx),
        closed: AtomicBool::new(false),
      }),
    }
  }

  /// Identity shared by every clone of this handle.
  pub fn id(&self) -> ChannelId {
    self.inner.id
  }

  /// Buffer size this channel was created with (`0` = rendezvous).
  pub fn capacity(&self) -> usize {
    self.inner.capacity
  }

  /// Element type of the values this channel carries.
  pub fn element(&self) -> ElementType {
    self.inner.element
  }

  /// Whether both handles refer to the same channel.
  pub fn same_channel(&self, other: &AnyChannel) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Whether `close` has been called.
  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::Acquire)
  }

  /// Sends a type-erased packet. The caller guarantees the element type.
  pub(crate) async fn send_packet(&self, packet: Packet) -> Result<(), SendError<Packet>> {
    let tx = {
      let guard = self.inner.tx.lock().unwrap_or_else(PoisonError::into_inner);
      guard.clone()
    };
    let Some(tx) = tx else {
      return Err(SendError(packet));
    };

    if self.inner.capacity == 0 {
      let (ack_tx, ack_rx) = oneshot::channel();
      let envelope = Envelope {
        packet,
        ack: Some(ack_tx),
      };
      if let Err(mpsc::error::SendError(envelope)) = tx.send(envelope).await {
        return Err(SendError(envelope.packet));
      }
      drop(tx);
      // The receiver drops the ack once it owns the packet. An Err here means
      // the envelope was taken without an explicit ack, which is still a
      // delivery.
      let _ = ack_rx.await;
      Ok(())
    } else {
      tx.send(Envelope { packet, ack: None })
        .await
        .map_err(|mpsc::error::SendError(envelope)| SendError(envelope.packet))
    }
  }

  /// Receives the next packet, or `None` once the channel is closed and
  /// drained.
  pub(crate) async fn recv_packet(&self) -> Option<Packet> {
    let envelope = {
      let mut rx = self.inner.rx.lock().await;
      rx.recv().await
    }?;
    if let Some(ack) = envelope.ack {
      let _ = ack.send(());
    }
    Some(envelope.packet)
  }

  /// Closes the channel. Buffered values stay readable.
  ///
  /// A channel must be closed exactly once, by the last writer that could
  /// still send on it. A second close is a reference-counting defect.
  pub fn close(&self) {
    let was_closed = self.inner.closed.swap(true, Ordering::AcqRel);
    if was_closed {
      error!("channel {} closed more than once", self.inner.id);
      debug_assert!(!was_closed, "channel {} closed more than once", self.inner.id);
      return;
    }
    trace!("AnyChannel::close(id={})", self.inner.id);
    self
      .inner
      .tx
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
  }

  /// Typed view of this channel, if it carries `T`.
  pub fn typed<T: Any + Send>(&self) -> Option<Channel<T>> {
    self.element().is::<T>().then(|| Channel {
      raw: self.clone(),
      _marker: PhantomData,
    })
  }
}

impl fmt::Debug for AnyChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AnyChannel")
      .field("id", &self.inner.id)
      .field("element", &self.inner.element)
      .field("capacity", &self.inner.capacity)
      .field("closed", &self.is_closed())
      .finish()
  }
}

/// Typed channel handle for code outside the graph: feeding external
/// in-ports, draining external out-ports, tests.
///
/// ```rust,no_run
/// # async fn demo() {
/// use weaveflow::channel::Channel;
///
/// let ch = Channel::<i64>::new(1);
/// ch.send(7).await.unwrap();
/// ch.close();
/// assert_eq!(ch.recv().await, Some(7));
/// assert_eq!(ch.recv().await, None);
/// # }
/// ```
pub struct Channel<T> {
  raw: AnyChannel,
  _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Channel<T> {
  fn clone(&self) -> Self {
    Self {
      raw: self.raw.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T> fmt::Debug for Channel<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.raw.fmt(f)
  }
}

impl<T: Any + Send> Channel<T> {
  /// Creates a channel with the given buffer size (`0` = rendezvous).
  pub fn new(capacity: usize) -> Self {
    Self {
      raw: AnyChannel::new(ElementType::of::<T>(), capacity),
      _marker: PhantomData,
    }
  }

  /// Sends a value, waiting for buffer space (or a receiver, at capacity 0).
  pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
    self
      .raw
      .send_packet(Box::new(value))
      .await
      .map_err(|SendError(packet)| SendError(downcast_packet::<T>(packet)))
  }

  /// Receives the next value, or `None` once closed and drained.
  pub async fn recv(&self) -> Option<T> {
    let packet = self.raw.recv_packet().await?;
    Some(downcast_packet::<T>(packet))
  }

  /// Closes the channel.
  pub fn close(&self) {
    self.raw.close();
  }

  /// Whether `close` has been called.
  pub fn is_closed(&self) -> bool {
    self.raw.is_closed()
  }

  /// Identity of the underlying channel.
  pub fn id(&self) -> ChannelId {
    self.raw.id()
  }

  /// The type-erased handle.
  pub fn raw(&self) -> &AnyChannel {
    &self.raw
  }
}

/// Unboxes a packet whose type was checked when the channel was wired.
fn downcast_packet<T: Any>(packet: Packet) -> T {
  match packet.downcast::<T>() {
    Ok(value) => *value,
    Err(_) => unreachable!(
      "channel element type was checked at wiring time but packet is not {}",
      std::any::type_name::<T>()
    ),
  }
}
