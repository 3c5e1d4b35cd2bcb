//! # Components
//!
//! A component is a unit of work with ports. It exposes one entry point,
//! [`Component::process`], which runs until the component decides it is done,
//! normally when its input ports report end-of-stream. The engine never calls
//! into a component in any other way: it wires channels into the ports listed
//! in [`Component::ports`] and then runs `process`.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use weaveflow::component::{Component, run};
//! use weaveflow::port::{InPort, OutPort, PortTable};
//!
//! struct Doubler {
//!   input: InPort<i64>,
//!   out: OutPort<i64>,
//!   ports: PortTable,
//! }
//!
//! #[async_trait]
//! impl Component for Doubler {
//!   fn ports(&self) -> &PortTable {
//!     &self.ports
//!   }
//!
//!   async fn process(&mut self) {
//!     while let Some(n) = self.input.recv().await {
//!       if self.out.send(n * 2).await.is_err() {
//!         break;
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! ## Shutdown
//!
//! There is no cancellation path. A component stops when its inputs close;
//! a graph closes a component's outputs once it stops, which lets the
//! component's consumers stop in turn. Callers that want to end a run early
//! close the graph's external in-ports and wait.

use crate::graph::Graph;
use crate::port::PortTable;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// A runnable unit with declared ports.
#[async_trait]
pub trait Component: Send + 'static {
  /// The component's port table, built once when the component was created.
  fn ports(&self) -> &PortTable;

  /// Runs the component to completion.
  async fn process(&mut self);

  /// Subgraph access for port resolution. Only [`Graph`] overrides this.
  fn as_graph(&self) -> Option<&Graph> {
    None
  }
}

/// Completion signal returned by [`run`]. Resolves once, when the
/// component's `process` has returned.
#[must_use = "dropping Done does not stop the component, but loses the only completion signal"]
pub struct Done {
  rx: oneshot::Receiver<()>,
}

impl Future for Done {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    match Pin::new(&mut self.rx).poll(cx) {
      Poll::Ready(Ok(())) => Poll::Ready(()),
      Poll::Ready(Err(_)) => {
        // The task ended without signalling, i.e. it panicked.
        warn!("component task ended abnormally");
        Poll::Ready(())
      }
      Poll::Pending => Poll::Pending,
    }
  }
}

/// Starts `component` on the tokio runtime.
///
/// All input channels the component needs must be wired beforehand. `run`
/// closes nothing; closing is the caller's (or the owning graph's) job.
pub fn run<C: Component>(component: C) -> Done {
  run_boxed(Box::new(component))
}

/// [`run`] for an already boxed component.
pub fn run_boxed(mut component: Box<dyn Component>) -> Done {
  trace!("run_boxed()");
  let (tx, rx) = oneshot::channel();
  tokio::spawn(async move {
    component.process().await;
    let _ = tx.send(());
  });
  Done { rx }
}
