//! # Component Factory
//!
//! A [`Factory`] maps component names to constructors. It is a plain value:
//! there is no process-wide registry, so independent factories with disjoint
//! component sets can coexist, and whatever creates components by name (a
//! graph loader, a plugin adapter) is handed the factory explicitly.
//!
//! ```rust,no_run
//! use weaveflow::factory::{Annotation, Factory};
//! # use weaveflow::component::Component;
//! # fn echo() -> Box<dyn Component> { unimplemented!() }
//!
//! let mut factory = Factory::new();
//! factory.register("echo", || Ok(echo()))?;
//! factory.annotate("echo", Annotation::new("Passes values through", "arrow-right"))?;
//! let instance = factory.create("echo")?;
//! # Ok::<(), weaveflow::factory::FactoryError>(())
//! ```

use crate::component::Component;
use crate::port::{Direction, PortSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Error a constructor may fail with.
pub type ConstructorError = Box<dyn std::error::Error + Send + Sync>;

/// A component constructor.
pub type Constructor =
  Box<dyn Fn() -> Result<Box<dyn Component>, ConstructorError> + Send + Sync>;

/// Errors from [`Factory`] operations.
#[derive(Debug, Error)]
pub enum FactoryError {
  /// The name is taken.
  #[error("component '{0}' is already registered")]
  AlreadyRegistered(String),
  /// The name is not registered.
  #[error("component '{0}' not found")]
  NotFound(String),
  /// The constructor failed.
  #[error("constructor for component '{name}' failed")]
  Construct {
    /// Component name.
    name: String,
    /// Constructor error.
    #[source]
    source: ConstructorError,
  },
}

/// Human-readable information about a registered component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
  /// What the component does.
  pub description: String,
  /// Icon name, for visual editors.
  pub icon: String,
}

impl Annotation {
  /// Creates an annotation.
  pub fn new(description: impl Into<String>, icon: impl Into<String>) -> Self {
    Self {
      description: description.into(),
      icon: icon.into(),
    }
  }
}

/// Everything a component listing needs to know about one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescription {
  /// Registered name.
  pub name: String,
  /// From the annotation; empty if none.
  pub description: String,
  /// From the annotation; empty if none.
  pub icon: String,
  /// Input ports, in name order.
  pub in_ports: Vec<PortSpec>,
  /// Output ports, in name order.
  pub out_ports: Vec<PortSpec>,
}

struct Entry {
  constructor: Constructor,
  annotation: Annotation,
}

/// A registry of component constructors.
#[derive(Default)]
pub struct Factory {
  registry: HashMap<String, Entry>,
}

impl Factory {
  /// An empty factory.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `constructor` under `name`.
  pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<(), FactoryError>
  where
    F: Fn() -> Result<Box<dyn Component>, ConstructorError> + Send + Sync + 'static,
  {
    trace!("Factory::register(name={})", name);
    if self.registry.contains_key(name) {
      return Err(FactoryError::AlreadyRegistered(name.to_string()));
    }
    self.registry.insert(
      name.to_string(),
      Entry {
        constructor: Box::new(constructor),
        annotation: Annotation::default(),
      },
    );
    Ok(())
  }

  /// Registers a component type that can be built with `Default`.
  pub fn register_default<C>(&mut self, name: &str) -> Result<(), FactoryError>
  where
    C: Component + Default,
  {
    self.register(name, || Ok(Box::new(C::default()) as Box<dyn Component>))
  }

  /// Removes `name` from the registry.
  pub fn unregister(&mut self, name: &str) -> Result<(), FactoryError> {
    trace!("Factory::unregister(name={})", name);
    self
      .registry
      .remove(name)
      .map(|_| ())
      .ok_or_else(|| FactoryError::NotFound(name.to_string()))
  }

  /// Attaches `annotation` to a registered component.
  pub fn annotate(&mut self, name: &str, annotation: Annotation) -> Result<(), FactoryError> {
    let entry = self
      .registry
      .get_mut(name)
      .ok_or_else(|| FactoryError::NotFound(name.to_string()))?;
    entry.annotation = annotation;
    Ok(())
  }

  /// The annotation of a registered component.
  pub fn annotation(&self, name: &str) -> Option<&Annotation> {
    self.registry.get(name).map(|entry| &entry.annotation)
  }

  /// Whether `name` is registered.
  pub fn contains(&self, name: &str) -> bool {
    self.registry.contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.registry.keys().cloned().collect();
    names.sort();
    names
  }

  /// Creates a new instance of `name`.
  pub fn create(&self, name: &str) -> Result<Box<dyn Component>, FactoryError> {
    let entry = self
      .registry
      .get(name)
      .ok_or_else(|| FactoryError::NotFound(name.to_string()))?;
    let instance = (entry.constructor)().map_err(|source| FactoryError::Construct {
      name: name.to_string(),
      source,
    })?;
    debug!("created component '{}'", name);
    Ok(instance)
  }

  /// Describes `name` by building a throwaway instance and reading its
  /// port table.
  pub fn describe(&self, name: &str) -> Result<ComponentDescription, FactoryError> {
    let instance = self.create(name)?;
    let annotation = self.annotation(name).cloned().unwrap_or_default();
    let ports = instance.ports();
    Ok(ComponentDescription {
      name: name.to_string(),
      description: annotation.description,
      icon: annotation.icon,
      in_ports: ports.specs(Direction::In),
      out_ports: ports.specs(Direction::Out),
    })
  }
}

impl fmt::Debug for Factory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Factory")
      .field("components", &self.names())
      .finish()
  }
}
