//! Component descriptors: the registration records the registry stores.

use crate::activator::{Activator, ComponentBuilder};
use crate::core::{Instance, InstanceKey};
use crate::error::Result;
use crate::types::{GenericDefinition, TypeTag};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-wide unique, monotonically increasing descriptor id.
///
/// A descriptor gets an id when it is created and a fresh one when a registry
/// accepts it, so registered ids follow registration order and two
/// registrations of one cloned descriptor never share an id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ComponentId(u64);

impl ComponentId {
  fn next() -> Self {
    Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[cfg(test)]
  pub(crate) fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  pub fn get(&self) -> u64 {
    self.0
  }
}

/// The sharing policy of a resolved instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Lifetime {
  /// One instance per application root, shared by every descendant node.
  Singleton,
  /// One instance per container node.
  Scope,
  /// A new instance for every resolution.
  #[default]
  Transient,
}

type CloseFn = dyn Fn(&[TypeTag]) -> Result<Activator> + Send + Sync;

/// An open generic component definition.
///
/// The closing function receives the type arguments of a resolution request
/// and returns the activator of the closed component. Returning an error
/// marks the combination as unsupported.
#[derive(Clone)]
pub struct OpenGeneric {
  definition: GenericDefinition,
  close: Arc<CloseFn>,
}

impl OpenGeneric {
  pub fn new<F>(definition: GenericDefinition, close: F) -> Self
  where
    F: Fn(&[TypeTag]) -> Result<Activator> + Send + Sync + 'static,
  {
    Self {
      definition,
      close: Arc::new(close),
    }
  }

  pub fn definition(&self) -> &GenericDefinition {
    &self.definition
  }

  pub(crate) fn close(&self, args: &[TypeTag]) -> Result<Activator> {
    (self.close)(args)
  }
}

#[derive(Clone)]
pub(crate) enum Activation {
  Concrete(Arc<Activator>),
  Open(OpenGeneric),
  Instance(Instance),
}

/// The registration record binding a key and a source type to a concrete
/// target and a lifetime.
#[derive(Clone)]
pub struct ComponentDescriptor {
  id: ComponentId,
  key: Option<Arc<str>>,
  source: TypeTag,
  target: TypeTag,
  lifetime: Lifetime,
  activation: Activation,
}

impl ComponentDescriptor {
  /// Creates a descriptor from already erased parts. This is the entry point
  /// for discovery mechanisms that hand the container
  /// `(key, source, target, lifetime)` tuples.
  pub fn new(key: Option<&str>, source: TypeTag, lifetime: Lifetime, activator: Activator) -> Self {
    Self {
      id: ComponentId::next(),
      key: key.map(Arc::from),
      source,
      target: activator.target().clone(),
      lifetime,
      activation: Activation::Concrete(Arc::new(activator)),
    }
  }

  /// Starts a typed builder for the component type `T`.
  pub fn builder<T: Send + Sync + 'static>() -> ComponentBuilder<T> {
    ComponentBuilder::new()
  }

  /// Registers an already constructed value under its own type.
  ///
  /// The value is owned by the caller's registration, shared by the whole
  /// tree and never disposed by the container.
  pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
    Self::instance_as(Arc::new(value))
  }

  /// Registers an already constructed value under the service type `S`.
  pub fn instance_as<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
    let tag = TypeTag::of::<S>();
    Self {
      id: ComponentId::next(),
      key: None,
      source: tag.clone(),
      target: tag,
      lifetime: Lifetime::Singleton,
      activation: Activation::Instance(Instance::new(value)),
    }
  }

  /// Registers an open generic target against an open generic source.
  pub fn open_generic(source: GenericDefinition, target: OpenGeneric) -> Self {
    Self {
      id: ComponentId::next(),
      key: None,
      source: TypeTag::open(&source),
      target: TypeTag::open(target.definition()),
      lifetime: Lifetime::Transient,
      activation: Activation::Open(target),
    }
  }

  pub(crate) fn from_activator(source: TypeTag, activator: Activator) -> Self {
    Self::new(None, source, Lifetime::default(), activator)
  }

  pub fn with_key(mut self, key: impl AsRef<str>) -> Self {
    self.key = Some(Arc::from(key.as_ref()));
    self
  }

  /// Sets the lifetime. Pre-built instances always stay `Singleton`.
  pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
    if !matches!(self.activation, Activation::Instance(_)) {
      self.lifetime = lifetime;
    }
    self
  }

  pub fn singleton(self) -> Self {
    self.with_lifetime(Lifetime::Singleton)
  }

  pub fn scoped(self) -> Self {
    self.with_lifetime(Lifetime::Scope)
  }

  pub fn transient(self) -> Self {
    self.with_lifetime(Lifetime::Transient)
  }

  pub fn id(&self) -> ComponentId {
    self.id
  }

  pub fn key(&self) -> Option<&str> {
    self.key.as_deref()
  }

  pub fn source(&self) -> &TypeTag {
    &self.source
  }

  pub fn target(&self) -> &TypeTag {
    &self.target
  }

  pub fn lifetime(&self) -> Lifetime {
    self.lifetime
  }

  pub fn is_open_generic(&self) -> bool {
    matches!(self.activation, Activation::Open(_))
  }

  pub(crate) fn activation(&self) -> &Activation {
    &self.activation
  }

  /// Stamps the descriptor with a fresh id as it enters a registry.
  pub(crate) fn registered(mut self) -> Self {
    self.id = ComponentId::next();
    self
  }

  pub(crate) fn instance_key(&self) -> InstanceKey {
    InstanceKey {
      component: self.id,
      service: self.source.identity().clone(),
    }
  }

  /// A closed view of an open generic descriptor. It keeps the id, key and
  /// lifetime of the open registration.
  pub(crate) fn specialize(&self, source: TypeTag, target: TypeTag, activator: Arc<Activator>) -> Self {
    Self {
      id: self.id,
      key: self.key.clone(),
      source,
      target,
      lifetime: self.lifetime,
      activation: Activation::Concrete(activator),
    }
  }
}

impl fmt::Debug for ComponentDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let activation = match self.activation {
      Activation::Concrete(_) => "<activator>",
      Activation::Open(_) => "<open generic>",
      Activation::Instance(_) => "<instance>",
    };
    f.debug_struct("ComponentDescriptor")
      .field("id", &self.id)
      .field("key", &self.key)
      .field("source", &self.source)
      .field("target", &self.target)
      .field("lifetime", &self.lifetime)
      .field("activation", &activation)
      .finish()
  }
}
