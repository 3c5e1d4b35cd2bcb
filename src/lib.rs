//! # weaveflow
//!
//! A flow-based programming engine. Independent components run concurrently
//! as processes of a [`graph::Graph`]; their typed ports are joined by
//! channels, initial values (IIPs) are injected at start, and the graph runs
//! until every process has drained its inputs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # use weaveflow::component::Component;
//! # fn echo() -> Box<dyn Component> { unimplemented!() }
//! # fn doubler() -> Box<dyn Component> { unimplemented!() }
//! # async fn demo() -> Result<(), weaveflow::error::GraphError> {
//! use weaveflow::channel::Channel;
//! use weaveflow::component::run;
//! use weaveflow::graph::Graph;
//!
//! let mut net = Graph::new();
//! net.add("e", echo())?;
//! net.add("d", doubler())?;
//! net.connect("e", "Out", "d", "In")?;
//! net.map_in_port("In", "e", "In")?;
//! net.map_out_port("Out", "d", "Out")?;
//!
//! let input = Channel::<i64>::new(0);
//! let output = Channel::<i64>::new(0);
//! net.set_in_port("In", &input)?;
//! net.set_out_port("Out", &output)?;
//!
//! let done = run(net);
//! tokio::spawn(async move {
//!   for n in [7, 97, 16] {
//!     let _ = input.send(n).await;
//!   }
//!   input.close();
//! });
//! while let Some(n) = output.recv().await {
//!   println!("{n}");
//! }
//! done.await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Shutdown
//!
//! There is no forced cancellation. A run ends when the caller closes the
//! graph's external in-ports: the processes reading them finish, the graph
//! closes their outputs, and termination cascades downstream.

#![deny(missing_docs)]

/// Port references: `process.port[index-or-key]`.
pub mod address;
/// Shared, identity-bearing channels.
pub mod channel;
/// The component contract and `run`.
pub mod component;
/// Graph configuration.
pub mod config;
/// Error types.
pub mod error;
/// Component registry.
pub mod factory;
/// Graph construction and execution.
pub mod graph;
/// Port fields and port tables.
pub mod port;

#[cfg(test)]
mod address_test;
#[cfg(test)]
mod channel_test;
#[cfg(test)]
mod factory_test;
