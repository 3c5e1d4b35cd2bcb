//! # Address Test Suite
//!
//! Parsing, classification, canonical case and formatting of port references.

use crate::address::{Address, AddressError, PortKind, canonical_port_name};

#[test]
fn test_scalar_address() {
  let addr = Address::parse("proc", "In").unwrap();
  assert_eq!(addr.process, "proc");
  assert_eq!(addr.port, "In");
  assert_eq!(addr.index, None);
  assert_eq!(addr.key, None);
  assert_eq!(addr.kind(), PortKind::Scalar);
}

#[test]
fn test_array_address() {
  let addr = Address::parse("proc", "Out[12]").unwrap();
  assert_eq!(addr.port, "Out");
  assert_eq!(addr.index, Some(12));
  assert_eq!(addr.kind(), PortKind::Array);
}

#[test]
fn test_map_address() {
  let addr = Address::parse("proc", "Out[left]").unwrap();
  assert_eq!(addr.key.as_deref(), Some("left"));
  assert_eq!(addr.index, None);
  assert_eq!(addr.kind(), PortKind::Map);
}

#[test]
fn test_negative_subscript_is_a_key() {
  let addr = Address::parse("proc", "Out[-1]").unwrap();
  assert_eq!(addr.kind(), PortKind::Map);
  assert_eq!(addr.key.as_deref(), Some("-1"));
}

#[test]
fn test_missing_process_is_kind_none() {
  let addr = Address::parse("", "In").unwrap();
  assert_eq!(addr.kind(), PortKind::None);
  assert_eq!(Address::default().kind(), PortKind::None);
}

#[test]
fn test_malformed_subscripts() {
  assert_eq!(
    Address::parse("p", "In["),
    Err(AddressError::UnmatchedBracket("In[".to_string()))
  );
  assert_eq!(
    Address::parse("p", "In]"),
    Err(AddressError::UnmatchedBracket("In]".to_string()))
  );
  assert_eq!(
    Address::parse("p", "In[a]b]"),
    Err(AddressError::UnmatchedBracket("In[a]b]".to_string()))
  );
  assert_eq!(
    Address::parse("p", "In[]"),
    Err(AddressError::EmptySubscript("In[]".to_string()))
  );
  assert_eq!(
    Address::parse("p", "[0]"),
    Err(AddressError::EmptyPort("[0]".to_string()))
  );
  assert_eq!(
    Address::parse("p", ""),
    Err(AddressError::EmptyPort(String::new()))
  );
}

#[test]
fn test_format_round_trip() {
  for spec in ["In", "Out[3]", "Out[left]"] {
    let addr = Address::parse("proc", spec).unwrap();
    let text = addr.to_string();
    assert_eq!(text, format!("proc.{}", spec));

    let (process, port) = text.split_once('.').unwrap();
    assert_eq!(Address::parse(process, port).unwrap(), addr);
  }
}

#[test]
fn test_canonical_port_names() {
  assert_eq!(canonical_port_name("in"), "In");
  assert_eq!(canonical_port_name("IN"), "In");
  assert_eq!(canonical_port_name("In"), "In");
  assert_eq!(canonical_port_name("inPort"), "inPort");
  assert_eq!(canonical_port_name("err_out"), "Err_out");
  assert_eq!(canonical_port_name("in port"), "In Port");
  assert_eq!(canonical_port_name("x2"), "X2");
}

#[test]
fn test_case_insensitive_equality() {
  assert_eq!(
    Address::parse("p", "out[1]").unwrap(),
    Address::parse("p", "OUT[1]").unwrap()
  );
  assert_ne!(
    Address::parse("p", "Out[1]").unwrap(),
    Address::parse("p", "Out[2]").unwrap()
  );
}
