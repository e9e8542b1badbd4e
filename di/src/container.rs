//! The main `Container` struct and its associated methods.

use crate::activation::ActivationEngine;
use crate::builder::{ContainerBuilder, ContainerOptions};
use crate::core::{Instance, ResolutionGuard};
use crate::descriptor::{Activation, ComponentDescriptor, Lifetime};
use crate::error::{Error, Result};
use crate::lifetime::{InstanceStore, LifetimeStore, TransientStore};
use crate::parameter::ParameterOverride;
use crate::registry::ComponentRegistry;
use crate::types::TypeTag;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, trace, warn};

use std::any::type_name;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
  Active,
  Destroyed,
}

/// Something to notify when a node is destroyed.
enum Subscriber {
  Handler(Box<dyn FnOnce() + Send>),
  Child(Weak<Node>),
}

struct Node {
  registry: Arc<ComponentRegistry>,
  scope: InstanceStore,
  singletons: Arc<InstanceStore>,
  parent: Option<Weak<Node>>,
  // `None` on the root itself.
  root: Option<Weak<Node>>,
  options: ContainerOptions,
  state: RwLock<NodeState>,
  subscribers: Mutex<Vec<Subscriber>>,
  depth: usize,
}

impl Node {
  /// Moves the node to `Destroyed`. Returns `false` if it already was.
  ///
  /// The state flips under the write lock, which waits for in-flight
  /// resolutions on this node to finish. Everything else runs after the lock
  /// is released.
  fn teardown(&self) -> bool {
    {
      let mut state = self.state.write();
      if *state == NodeState::Destroyed {
        return false;
      }
      *state = NodeState::Destroyed;
    }

    let subscribers = std::mem::take(&mut *self.subscribers.lock());
    for subscriber in subscribers {
      match subscriber {
        Subscriber::Handler(handler) => {
          if catch_unwind(AssertUnwindSafe(handler)).is_err() {
            warn!(depth = self.depth, "OnDestroy handler panicked; continuing teardown");
          }
        }
        Subscriber::Child(child) => {
          if let Some(child) = child.upgrade() {
            child.teardown();
          }
        }
      }
    }

    self.scope.dispose();
    if self.root.is_none() {
      self.singletons.dispose();
    }
    debug!(depth = self.depth, "Destroyed container");
    true
  }
}

impl Drop for Node {
  fn drop(&mut self) {
    if *self.state.get_mut() == NodeState::Active {
      self.teardown();
    }
  }
}

/// A node of the container hierarchy.
///
/// `Container` is a cheap, cloneable handle. Every node of one tree shares
/// the registry and the singleton store of its root and owns a private scope
/// store. Children are created with [`Container::new_child`]; a parent never
/// owns its children, but destroying it destroys them.
///
/// Dropping the last handle of an active node destroys it.
///
/// ```
/// use fibre_di::{ComponentDescriptor, Container};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct RequestId;
///
/// let root = Container::new();
/// root
///   .register(ComponentDescriptor::builder::<RequestId>().default_constructor().build().scoped())
///   .unwrap();
///
/// let request = root.new_child().unwrap();
/// let a = request.resolve::<RequestId>().unwrap().unwrap();
/// let b = request.resolve::<RequestId>().unwrap().unwrap();
/// let c = root.resolve::<RequestId>().unwrap().unwrap();
///
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(!Arc::ptr_eq(&a, &c));
/// ```
#[derive(Clone)]
pub struct Container {
  node: Arc<Node>,
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

impl Container {
  /// Creates a new, empty root container with default options.
  pub fn new() -> Self {
    Self::with_options(ContainerOptions::default())
  }

  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub(crate) fn with_options(options: ContainerOptions) -> Self {
    debug!(?options, "Created root container");
    Self {
      node: Arc::new(Node {
        registry: Arc::new(ComponentRegistry::new()),
        scope: InstanceStore::new("scope"),
        singletons: Arc::new(InstanceStore::new("singleton")),
        parent: None,
        root: None,
        options,
        state: RwLock::new(NodeState::Active),
        subscribers: Mutex::new(Vec::new()),
        depth: 0,
      }),
    }
  }

  /// Holds the node open for the duration of an operation.
  fn enter(&self) -> Result<RwLockReadGuard<'_, NodeState>> {
    // Recursive, because activation re-enters the node it runs in.
    let state = self.node.state.read_recursive();
    match *state {
      NodeState::Active => Ok(state),
      NodeState::Destroyed => Err(Error::Destroyed),
    }
  }

  // --- Registration ---

  /// Registers a descriptor. Duplicate `(key, source)` pairs are allowed.
  pub fn register(&self, descriptor: ComponentDescriptor) -> Result<&Self> {
    let _state = self.enter()?;
    self.node.registry.add(descriptor);
    Ok(self)
  }

  pub fn register_all(&self, descriptors: impl IntoIterator<Item = ComponentDescriptor>) -> Result<&Self> {
    let _state = self.enter()?;
    self.node.registry.add_all(descriptors);
    Ok(self)
  }

  /// Registers the descriptor only if its `(key, source)` pair is free.
  pub fn try_register(&self, descriptor: ComponentDescriptor) -> Result<bool> {
    let _state = self.enter()?;
    Ok(self.node.registry.try_add(descriptor))
  }

  /// Removes every registration of `(key, source)`. The registry is shared
  /// by the whole tree, so the removal is visible from every node.
  pub fn unregister(&self, key: Option<&str>, source: &TypeTag) -> Result<&Self> {
    let _state = self.enter()?;
    self.node.registry.remove(key, source);
    Ok(self)
  }

  pub fn unregister_type<S: ?Sized + 'static>(&self, key: Option<&str>) -> Result<&Self> {
    self.unregister(key, &TypeTag::of::<S>())
  }

  pub fn is_registered(&self, key: Option<&str>, source: &TypeTag) -> bool {
    self.node.registry.is_registered(key, source)
  }

  pub fn is_registered_type<S: ?Sized + 'static>(&self, key: Option<&str>) -> bool {
    self.is_registered(key, &TypeTag::of::<S>())
  }

  // --- Resolution ---

  /// Resolves `(key, service)`.
  ///
  /// Returns `Ok(None)` if nothing is registered. A collection tag returns
  /// every registration of its element type as one collection instance, see
  /// [`Instance::items`]. When several descriptors match, the most recently
  /// registered one is activated.
  ///
  /// # Errors
  ///
  /// Fails if activation fails, if the graph is cyclic or too deep, or if
  /// the container has been destroyed.
  pub fn resolve_tag(&self, key: Option<&str>, service: &TypeTag) -> Result<Option<Instance>> {
    self.resolve_with_overrides(key, service, &[])
  }

  /// Resolution with explicit parameter overrides applied to the activated
  /// component. Reached by parameter resolvers through `ResolveContext`.
  pub(crate) fn resolve_with_overrides(
    &self,
    key: Option<&str>,
    service: &TypeTag,
    overrides: &[ParameterOverride],
  ) -> Result<Option<Instance>> {
    if let Some(element) = service.element() {
      let items = self.collect_with(element, overrides)?;
      return Ok((!items.is_empty()).then(|| Instance::from_items(items, element)));
    }

    let _state = self.enter()?;
    let descriptors = self.node.registry.lookup(key, service)?;
    match descriptors.last() {
      Some(descriptor) => self.activate(descriptor, overrides).map(Some),
      None => Ok(None),
    }
  }

  /// Every registration of `element`, activated, in registration order.
  pub(crate) fn collect(&self, element: &TypeTag) -> Result<Vec<Instance>> {
    self.collect_with(element, &[])
  }

  fn collect_with(&self, element: &TypeTag, overrides: &[ParameterOverride]) -> Result<Vec<Instance>> {
    let _state = self.enter()?;
    let descriptors = self.node.registry.lookup_all(element)?;
    descriptors
      .iter()
      .map(|descriptor| self.activate(descriptor, overrides))
      .collect()
  }

  fn activate(&self, descriptor: &ComponentDescriptor, overrides: &[ParameterOverride]) -> Result<Instance> {
    let activator = match descriptor.activation() {
      Activation::Instance(instance) => return Ok(instance.clone()),
      Activation::Open(_) => {
        return Err(Error::configuration(
          descriptor.target().name(),
          "an open generic component needs type arguments",
        ))
      }
      Activation::Concrete(activator) => activator,
    };

    let key = descriptor.instance_key();
    let lifetime = descriptor.lifetime();
    // Re-entering a cached component would block on its own initialization,
    // so cycles through Scope and Singleton components are always checked.
    let options = ContainerOptions {
      detect_cycles: self.node.options.detect_cycles || lifetime != Lifetime::Transient,
      ..self.node.options
    };
    let _guard = ResolutionGuard::enter(&key, descriptor.target().name(), &options)?;

    let run = |container: &Container| {
      trace!(
        component = %descriptor.target(),
        service = %descriptor.source(),
        key = descriptor.key(),
        ?lifetime,
        "Activating component"
      );
      ActivationEngine::new(container, overrides).activate(descriptor, activator)
    };

    match lifetime {
      Lifetime::Transient => TransientStore.get_or_create(&key, &mut || run(self)),
      Lifetime::Scope => self.node.scope.get_or_create(&key, &mut || run(self)),
      Lifetime::Singleton => {
        // Singleton dependencies come from the root, never from the scope
        // store of the requesting node.
        let root = self.root()?;
        self.node.singletons.get_or_create(&key, &mut || run(&root))
      }
    }
  }

  /// Resolves the service `S` registered without a key.
  ///
  /// ```
  /// use fibre_di::{ComponentDescriptor, Container};
  ///
  /// let container = Container::new();
  /// assert!(container.resolve::<String>().unwrap().is_none());
  ///
  /// container.register(ComponentDescriptor::instance("ready".to_string())).unwrap();
  /// assert_eq!(*container.resolve::<String>().unwrap().unwrap(), "ready");
  /// ```
  pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>> {
    self.resolve_typed(None)
  }

  pub fn resolve_keyed<S: ?Sized + Send + Sync + 'static>(&self, key: &str) -> Result<Option<Arc<S>>> {
    self.resolve_typed(Some(key))
  }

  fn resolve_typed<S: ?Sized + Send + Sync + 'static>(&self, key: Option<&str>) -> Result<Option<Arc<S>>> {
    match self.resolve_tag(key, &TypeTag::of::<S>())? {
      Some(instance) => downcast(&instance).map(Some),
      None => Ok(None),
    }
  }

  /// Every registration of `S`, regardless of key, in registration order.
  pub fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>> {
    self.collect(&TypeTag::of::<S>())?.iter().map(downcast::<S>).collect()
  }

  /// Like [`resolve`](Self::resolve), but reports a missing registration as
  /// `Error::NotRegistered`.
  pub fn resolve_required<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>> {
    self.resolve::<S>()?.ok_or_else(|| Error::NotRegistered {
      service: type_name::<S>().to_owned(),
    })
  }

  // --- Hierarchy ---

  /// Creates a child node sharing this node's registry (including future
  /// registrations) and the root's singleton store, with an empty scope
  /// store of its own. The child is destroyed with this node.
  pub fn new_child(&self) -> Result<Container> {
    let _state = self.enter()?;
    let parent = Arc::downgrade(&self.node);
    let node = Arc::new(Node {
      registry: Arc::clone(&self.node.registry),
      scope: InstanceStore::new("scope"),
      singletons: Arc::clone(&self.node.singletons),
      parent: Some(parent.clone()),
      root: Some(self.node.root.clone().unwrap_or(parent)),
      options: self.node.options,
      state: RwLock::new(NodeState::Active),
      subscribers: Mutex::new(Vec::new()),
      depth: self.node.depth + 1,
    });

    let mut subscribers = self.node.subscribers.lock();
    subscribers.retain(|subscriber| match subscriber {
      Subscriber::Child(child) => child.strong_count() > 0,
      Subscriber::Handler(_) => true,
    });
    subscribers.push(Subscriber::Child(Arc::downgrade(&node)));
    debug!(depth = node.depth, "Created child container");

    Ok(Container { node })
  }

  /// The parent node, if this is a child and the parent is still alive.
  pub fn parent(&self) -> Option<Container> {
    let node = self.node.parent.as_ref()?.upgrade()?;
    Some(Container { node })
  }

  fn root(&self) -> Result<Container> {
    match &self.node.root {
      None => Ok(self.clone()),
      Some(root) => root.upgrade().map(|node| Container { node }).ok_or(Error::Destroyed),
    }
  }

  pub fn is_root(&self) -> bool {
    self.node.root.is_none()
  }

  /// The number of ancestors of this node.
  pub fn depth(&self) -> usize {
    self.node.depth
  }

  /// The registry shared by every node of this tree.
  pub fn registry(&self) -> &ComponentRegistry {
    &self.node.registry
  }

  pub fn options(&self) -> ContainerOptions {
    self.node.options
  }

  /// The number of instances cached in this node's scope store.
  pub fn scoped_count(&self) -> usize {
    self.node.scope.len()
  }

  /// Subscribes a handler to this node's destruction. Handlers run once, in
  /// subscription order, before the node's instances are disposed.
  pub fn on_destroy(&self, handler: impl FnOnce() + Send + 'static) -> Result<()> {
    let _state = self.enter()?;
    self.node.subscribers.lock().push(Subscriber::Handler(Box::new(handler)));
    Ok(())
  }

  /// Destroys this node and, through it, every descendant.
  ///
  /// Waits for resolutions in flight on this node to finish, fires the
  /// `on_destroy` handlers, disposes the scope store and, on the root, the
  /// singleton store. Registrations are left untouched.
  ///
  /// Calling `destroy` from inside a resolution running on the same node
  /// (e.g. from a factory) deadlocks; it is the caller's responsibility to
  /// avoid it.
  ///
  /// # Errors
  ///
  /// Returns `Error::Destroyed` if the node was already destroyed.
  pub fn destroy(&self) -> Result<()> {
    if self.node.teardown() {
      Ok(())
    } else {
      Err(Error::Destroyed)
    }
  }

  pub fn is_destroyed(&self) -> bool {
    *self.node.state.read_recursive() == NodeState::Destroyed
  }
}

fn downcast<S: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Result<Arc<S>> {
  instance
    .downcast::<S>()
    .ok_or_else(|| Error::mismatch(instance.target().name(), type_name::<S>()))
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("depth", &self.node.depth)
      .field("destroyed", &self.is_destroyed())
      .field("registry", &self.node.registry)
      .field("scoped", &self.node.scope.len())
      .finish()
  }
}
