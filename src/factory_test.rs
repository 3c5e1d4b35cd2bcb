//! # Factory Test Suite
//!
//! Registration, lookup, construction failures and component descriptions.

use crate::component::Component;
use crate::factory::{Annotation, Factory, FactoryError};
use crate::port::{InPort, OutPort, PortTable};
use async_trait::async_trait;
use std::error::Error;

struct Relay {
  input: InPort<String>,
  out: OutPort<String>,
  ports: PortTable,
}

impl Default for Relay {
  fn default() -> Self {
    let input = InPort::new();
    let out = OutPort::new();
    let ports = PortTable::builder().port("In", &input).port("Out", &out).build();
    Self { input, out, ports }
  }
}

#[async_trait]
impl Component for Relay {
  fn ports(&self) -> &PortTable {
    &self.ports
  }

  async fn process(&mut self) {
    while let Some(s) = self.input.recv().await {
      if self.out.send(s).await.is_err() {
        break;
      }
    }
  }
}

#[test]
fn test_register_and_create() {
  let mut factory = Factory::new();
  factory.register_default::<Relay>("relay").unwrap();
  assert!(factory.contains("relay"));
  assert!(!factory.contains("Relay"));

  let first = factory.create("relay").unwrap();
  let second = factory.create("relay").unwrap();
  assert_eq!(first.ports().len(), 2);
  assert_eq!(second.ports().len(), 2);
}

#[test]
fn test_duplicate_registration_is_rejected() {
  let mut factory = Factory::new();
  factory.register_default::<Relay>("relay").unwrap();
  let err = factory.register_default::<Relay>("relay").unwrap_err();
  assert!(matches!(err, FactoryError::AlreadyRegistered(name) if name == "relay"));
}

#[test]
fn test_unknown_names() {
  let mut factory = Factory::new();
  assert!(matches!(
    factory.create("nope"),
    Err(FactoryError::NotFound(_))
  ));
  assert!(matches!(
    factory.unregister("nope"),
    Err(FactoryError::NotFound(_))
  ));
  assert!(matches!(
    factory.annotate("nope", Annotation::default()),
    Err(FactoryError::NotFound(_))
  ));
  assert!(factory.annotation("nope").is_none());
}

#[test]
fn test_unregister_frees_the_name() {
  let mut factory = Factory::new();
  factory.register_default::<Relay>("relay").unwrap();
  factory.unregister("relay").unwrap();
  assert!(!factory.contains("relay"));
  factory.register_default::<Relay>("relay").unwrap();
}

#[test]
fn test_constructor_failure_is_reported() {
  let mut factory = Factory::new();
  factory
    .register("broken", || Err("missing settings".into()))
    .unwrap();

  let err = match factory.create("broken") {
    Ok(_) => panic!("expected constructor failure"),
    Err(e) => e,
  };
  assert_eq!(err.to_string(), "constructor for component 'broken' failed");
  assert_eq!(err.source().unwrap().to_string(), "missing settings");
}

#[test]
fn test_names_are_sorted() {
  let mut factory = Factory::new();
  for name in ["zip", "relay", "merge"] {
    factory.register_default::<Relay>(name).unwrap();
  }
  assert_eq!(factory.names(), vec!["merge", "relay", "zip"]);
  assert!(format!("{:?}", factory).contains("merge"));
}

#[test]
fn test_describe_reports_ports_and_annotation() {
  let mut factory = Factory::new();
  factory.register_default::<Relay>("relay").unwrap();
  factory
    .annotate("relay", Annotation::new("Forwards strings", "arrow-right"))
    .unwrap();

  let description = factory.describe("relay").unwrap();
  assert_eq!(description.description, "Forwards strings");
  assert_eq!(description.in_ports.len(), 1);
  assert_eq!(description.in_ports[0].name, "In");
  assert_eq!(description.out_ports[0].name, "Out");

  let json = serde_json::to_value(&description).unwrap();
  assert_eq!(json["icon"], "arrow-right");
  assert_eq!(json["in_ports"][0]["direction"], "in");
  assert_eq!(json["out_ports"][0]["kind"], "scalar");
}
