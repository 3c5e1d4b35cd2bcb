//! Components and helpers shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weaveflow::channel::Channel;
use weaveflow::component::Component;
use weaveflow::port::{InArrayPort, InPort, OutPort, PortTable};

/// Installs a test-friendly subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// Awaits `fut`, failing the test if the graph does not drain in time.
pub async fn within<F: Future>(fut: F) -> F::Output {
  tokio::time::timeout(Duration::from_secs(10), fut)
    .await
    .expect("timed out waiting for the graph to drain")
}

/// Sends every value and closes the channel.
pub async fn feed<T: std::any::Any + Send>(channel: Channel<T>, values: Vec<T>) {
  for value in values {
    if channel.send(value).await.is_err() {
      break;
    }
  }
  channel.close();
}

/// Receives until the channel closes.
pub async fn drain<T: std::any::Any + Send>(channel: &Channel<T>) -> Vec<T> {
  let mut out = Vec::new();
  while let Some(value) = channel.recv().await {
    out.push(value);
  }
  out
}

// ============================================================================
// Components
// ============================================================================

/// Forwards every value unchanged.
pub struct Echo {
  input: InPort<i64>,
  out: OutPort<i64>,
  ports: PortTable,
}

impl Default for Echo {
  fn default() -> Self {
    let input = InPort::new();
    let out = OutPort::new();
    let ports = PortTable::builder().port("In", &input).port("Out", &out).build();
    Self { input, out, ports }
  }
}

#[async_trait]
impl Component for Echo {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    while let Some(n) = self.input.recv().await {
      if self.out.send(n).await.is_err() {
        break;
      }
    }
  }
}

/// Sends `2 * n` for every `n`.
pub struct Doubler {
  input: InPort<i64>,
  out: OutPort<i64>,
  ports: PortTable,
}

impl Default for Doubler {
  fn default() -> Self {
    let input = InPort::new();
    let out = OutPort::new();
    let ports = PortTable::builder().port("In", &input).port("Out", &out).build();
    Self { input, out, ports }
  }
}

#[async_trait]
impl Component for Doubler {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    while let Some(n) = self.input.recv().await {
      if self.out.send(n * 2).await.is_err() {
        break;
      }
    }
  }
}

/// Adds a constant, configured by IIP on `Offset`, to everything on `In`.
pub struct Offset {
  offset: InPort<i64>,
  input: InPort<i64>,
  out: OutPort<i64>,
  ports: PortTable,
}

impl Default for Offset {
  fn default() -> Self {
    let offset = InPort::new();
    let input = InPort::new();
    let out = OutPort::new();
    let ports = PortTable::builder()
      .port("Offset", &offset)
      .port("In", &input)
      .port("Out", &out)
      .build();
    Self {
      offset,
      input,
      out,
      ports,
    }
  }
}

#[async_trait]
impl Component for Offset {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    let offset = self.offset.recv().await.unwrap_or(0);
    while let Some(n) = self.input.recv().await {
      if self.out.send(n + offset).await.is_err() {
        break;
      }
    }
  }
}

/// Sums one value from each attached slot of `In[]`, repeatedly, until any
/// slot closes.
pub struct Zip {
  input: InArrayPort<i64>,
  out: OutPort<i64>,
  ports: PortTable,
}

impl Default for Zip {
  fn default() -> Self {
    let input = InArrayPort::new();
    let out = OutPort::new();
    let ports = PortTable::builder().port("In", &input).port("Out", &out).build();
    Self { input, out, ports }
  }
}

#[async_trait]
impl Component for Zip {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    let slots = self.input.indices();
    'outer: loop {
      let mut sum = 0;
      for &i in &slots {
        match self.input.recv(i).await {
          Some(n) => sum += n,
          None => break 'outer,
        }
      }
      if self.out.send(sum).await.is_err() {
        break;
      }
    }
  }
}

/// Records every value it receives, optionally after an initial pause.
pub struct Recorder {
  input: InPort<i64>,
  seen: Arc<Mutex<Vec<i64>>>,
  delay: Duration,
  ports: PortTable,
}

impl Recorder {
  pub fn new(seen: Arc<Mutex<Vec<i64>>>) -> Self {
    Self::with_delay(seen, Duration::ZERO)
  }

  /// A recorder that waits `delay` before its first read.
  pub fn with_delay(seen: Arc<Mutex<Vec<i64>>>, delay: Duration) -> Self {
    let input = InPort::new();
    let ports = PortTable::builder().port("In", &input).build();
    Self {
      input,
      seen,
      delay,
      ports,
    }
  }
}

#[async_trait]
impl Component for Recorder {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    while let Some(n) = self.input.recv().await {
      self.seen.lock().unwrap().push(n);
    }
  }
}

pub fn echo() -> Box<dyn Component> {
  Box::new(Echo::default())
}

pub fn doubler() -> Box<dyn Component> {
  Box::new(Doubler::default())
}
