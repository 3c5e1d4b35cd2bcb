//! # Port Addresses
//!
//! Every wiring call names a port as a `process.port` pair, where the port part
//! may carry a subscript: `port[3]` selects slot 3 of an array port and
//! `port[key]` selects the `key` entry of a map port.
//!
//! ```rust
//! use weaveflow::address::{Address, PortKind};
//!
//! let addr = Address::parse("split", "out[2]").unwrap();
//! assert_eq!(addr.kind(), PortKind::Array);
//! assert_eq!(addr.to_string(), "split.Out[2]");
//! ```
//!
//! Port names are compared in a canonical case: a name written entirely in
//! lower or upper case is title-cased (`in` and `IN` both become `In`), while
//! mixed-case names are kept as written. This lets textual graph definitions
//! and component port tables spell the same port differently.

use std::fmt;
use thiserror::Error;

/// Errors produced while parsing a port reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
  /// The port part was empty (or only a subscript).
  #[error("empty port name in '{0}'")]
  EmptyPort(String),
  /// A `[` without a closing `]`, or the reverse.
  #[error("unmatched bracket in port '{0}'")]
  UnmatchedBracket(String),
  /// `port[]`.
  #[error("empty subscript in port '{0}'")]
  EmptySubscript(String),
}

/// How a port reference addresses its port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
  /// Missing process or port name: not usable for wiring.
  None,
  /// A plain channel port.
  Scalar,
  /// An indexed slot of an array port.
  Array,
  /// A keyed slot of a map port.
  Map,
}

impl fmt::Display for PortKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PortKind::None => "none",
      PortKind::Scalar => "scalar",
      PortKind::Array => "array",
      PortKind::Map => "map",
    };
    f.write_str(name)
  }
}

/// A structured `process.port[index-or-key]` reference.
///
/// At most one of `index` and `key` is set. Equality is structural over all
/// four fields, which is what the connection engine relies on when it looks
/// for a channel it can share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Address {
  /// Process name inside the owning graph.
  pub process: String,
  /// Canonical port name.
  pub port: String,
  /// Slot of an array port.
  pub index: Option<usize>,
  /// Entry of a map port.
  pub key: Option<String>,
}

impl Address {
  /// Parses `port_spec` (`name`, `name[3]` or `name[key]`) for `process`.
  ///
  /// An empty `process` is not a parse error; the resulting address is
  /// classified [`PortKind::None`] and rejected by the wiring calls.
  pub fn parse(process: &str, port_spec: &str) -> Result<Self, AddressError> {
    let open = port_spec.find('[');
    let closes = port_spec.ends_with(']');

    let (name, subscript) = match (open, closes) {
      (None, false) => {
        if port_spec.contains(']') {
          return Err(AddressError::UnmatchedBracket(port_spec.to_string()));
        }
        (port_spec, None)
      }
      (Some(i), true) => {
        let token = &port_spec[i + 1..port_spec.len() - 1];
        if token.contains('[') || token.contains(']') {
          return Err(AddressError::UnmatchedBracket(port_spec.to_string()));
        }
        if token.is_empty() {
          return Err(AddressError::EmptySubscript(port_spec.to_string()));
        }
        (&port_spec[..i], Some(token))
      }
      _ => return Err(AddressError::UnmatchedBracket(port_spec.to_string())),
    };

    let name = name.trim();
    if name.is_empty() {
      return Err(AddressError::EmptyPort(port_spec.to_string()));
    }

    let mut address = Address {
      process: process.to_string(),
      port: canonical_port_name(name),
      index: None,
      key: None,
    };

    match subscript {
      Some(token) if token.bytes().all(|b| b.is_ascii_digit()) => match token.parse::<usize>() {
        Ok(index) => address.index = Some(index),
        Err(_) => address.key = Some(token.to_string()),
      },
      Some(token) => address.key = Some(token.to_string()),
      None => {}
    }

    Ok(address)
  }

  /// Classifies the address.
  pub fn kind(&self) -> PortKind {
    if self.process.is_empty() || self.port.is_empty() {
      PortKind::None
    } else if self.index.is_some() {
      PortKind::Array
    } else if self.key.is_some() {
      PortKind::Map
    } else {
      PortKind::Scalar
    }
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.process, self.port)?;
    if let Some(index) = self.index {
      write!(f, "[{}]", index)
    } else if let Some(key) = &self.key {
      write!(f, "[{}]", key)
    } else {
      Ok(())
    }
  }
}

/// Canonicalizes a port name.
///
/// Names written in a single case are title-cased word by word; words are
/// separated by anything that is not alphanumeric or `_`.
pub fn canonical_port_name(name: &str) -> String {
  let lower = name.to_lowercase();
  if name != lower && name != name.to_uppercase() {
    return name.to_string();
  }

  let mut out = String::with_capacity(lower.len());
  let mut at_word_start = true;
  for c in lower.chars() {
    if at_word_start && c.is_alphabetic() {
      out.extend(c.to_uppercase());
    } else {
      out.push(c);
    }
    at_word_start = !(c.is_alphanumeric() || c == '_');
  }
  out
}
