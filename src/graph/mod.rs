//! Graph construction and execution.
//!
//! A [`Graph`] is built by adding processes, connecting their ports, mapping
//! external ports and registering IIPs, then run with
//! [`crate::component::run`] or [`Graph::execute`].

pub mod connection;
pub mod execution;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod iip;
pub mod ports;

pub use connection::Connection;
pub use graph::Graph;
pub use iip::Iip;
