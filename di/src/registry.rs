//! The component registry: the descriptor table shared by a container tree.

use crate::activator::Activator;
use crate::descriptor::{Activation, ComponentDescriptor};
use crate::error::{Error, Result};
use crate::types::{TypeIdentity, TypeTag};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use std::sync::Arc;

/// Cache key of one open generic specialization: the open target definition
/// plus the ordered type arguments of the request.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct SpecializationKey {
  target: TypeIdentity,
  args: Vec<TypeIdentity>,
}

/// Holds every registered descriptor, grouped by source type.
///
/// Descriptors sharing one `(key, source)` pair are kept in registration
/// order; duplicates are intentional and feed collection resolution.
/// Lookups return owned snapshots, so a resolution never observes a
/// registration that races it halfway through.
#[derive(Default)]
pub struct ComponentRegistry {
  descriptors: DashMap<TypeIdentity, Vec<ComponentDescriptor>>,
  specializations: DashMap<SpecializationKey, Arc<Activator>>,
}

fn same_key(descriptor: &ComponentDescriptor, key: Option<&str>) -> bool {
  descriptor.key() == key
}

impl ComponentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a descriptor. Duplicate `(key, source)` pairs are allowed.
  pub fn add(&self, descriptor: ComponentDescriptor) {
    debug!(
      component = %descriptor.target(),
      service = %descriptor.source(),
      key = descriptor.key(),
      lifetime = ?descriptor.lifetime(),
      "Registered component"
    );
    self
      .descriptors
      .entry(descriptor.source().identity().clone())
      .or_default()
      .push(descriptor.registered());
  }

  pub fn add_all(&self, descriptors: impl IntoIterator<Item = ComponentDescriptor>) {
    for descriptor in descriptors {
      self.add(descriptor);
    }
  }

  /// Adds the descriptor only if nothing is registered under its
  /// `(key, source)` pair. The check and the insert are atomic.
  pub fn try_add(&self, descriptor: ComponentDescriptor) -> bool {
    match self.descriptors.entry(descriptor.source().identity().clone()) {
      Entry::Occupied(mut entry) => {
        if entry.get().iter().any(|existing| same_key(existing, descriptor.key())) {
          return false;
        }
        entry.get_mut().push(descriptor.registered());
      }
      Entry::Vacant(entry) => {
        entry.insert(vec![descriptor.registered()]);
      }
    }
    true
  }

  /// Removes every descriptor registered under `(key, source)` and returns
  /// how many were removed.
  pub fn remove(&self, key: Option<&str>, source: &TypeTag) -> usize {
    let identity = source.identity();
    let (removed, open_removed) = match self.descriptors.get_mut(identity) {
      Some(mut list) => {
        let before = list.len();
        let open_removed = list
          .iter()
          .any(|descriptor| same_key(descriptor, key) && descriptor.is_open_generic());
        list.retain(|descriptor| !same_key(descriptor, key));
        (before - list.len(), open_removed)
      }
      None => return 0,
    };
    self.descriptors.remove_if(identity, |_, list| list.is_empty());

    if open_removed {
      // Specializations are keyed by target definition, which a removed open
      // registration may share with others, so drop them all.
      self.specializations.clear();
    }
    if removed > 0 {
      debug!(service = %source, key, removed, "Unregistered components");
    }
    removed
  }

  /// Returns `true` if a lookup of `(key, source)` would find a descriptor.
  pub fn is_registered(&self, key: Option<&str>, source: &TypeTag) -> bool {
    if let Some(element) = source.element() {
      return self
        .descriptors
        .get(element.identity())
        .is_some_and(|list| !list.is_empty());
    }
    if self.has_exact(key, source) {
      return true;
    }
    source.open_form().is_some_and(|open| self.has_exact(key, &open))
  }

  fn has_exact(&self, key: Option<&str>, source: &TypeTag) -> bool {
    self
      .descriptors
      .get(source.identity())
      .is_some_and(|list| list.iter().any(|descriptor| same_key(descriptor, key)))
  }

  /// The descriptors serving a request for `(key, source)`, in registration
  /// order.
  ///
  /// A collection tag returns every descriptor of its element type,
  /// regardless of key. A closed generic tag with no exact registration falls
  /// back to the registrations of its open form, specialized for the
  /// request's type arguments.
  ///
  /// # Errors
  ///
  /// Returns `Error::Configuration` if an open generic registration cannot
  /// be specialized for the requested arguments.
  pub fn lookup(&self, key: Option<&str>, source: &TypeTag) -> Result<Vec<ComponentDescriptor>> {
    if let Some(element) = source.element() {
      return self.lookup_all(element);
    }

    let exact = self.snapshot(source, |descriptor| same_key(descriptor, key));
    if !exact.is_empty() || !source.is_closed() {
      return Ok(exact);
    }

    match source.open_form() {
      Some(open) => self
        .snapshot(&open, |descriptor| same_key(descriptor, key))
        .iter()
        .map(|descriptor| self.specialize(descriptor, source))
        .collect(),
      None => Ok(exact),
    }
  }

  /// Every descriptor registered for `element`, regardless of key, in
  /// registration order.
  pub fn lookup_all(&self, element: &TypeTag) -> Result<Vec<ComponentDescriptor>> {
    let all = self.snapshot(element, |_| true);

    if all.is_empty() && element.is_closed() {
      if let Some(open) = element.open_form() {
        return self
          .snapshot(&open, |_| true)
          .iter()
          .map(|descriptor| self.specialize(descriptor, element))
          .collect();
      }
    }
    Ok(all)
  }

  fn snapshot(&self, source: &TypeTag, keep: impl Fn(&ComponentDescriptor) -> bool) -> Vec<ComponentDescriptor> {
    self
      .descriptors
      .get(source.identity())
      .map(|list| list.iter().filter(|descriptor| keep(descriptor)).cloned().collect())
      .unwrap_or_default()
  }

  fn specialize(&self, open: &ComponentDescriptor, source: &TypeTag) -> Result<ComponentDescriptor> {
    let Activation::Open(generic) = open.activation() else {
      return Err(Error::configuration(
        open.target().name(),
        "registered against an open generic source without an open generic target",
      ));
    };
    let args = source.type_args();
    let definition = generic.definition();
    if definition.arity() != args.len() {
      return Err(Error::configuration(
        open.target().name(),
        format!("expects {} type arguments, {} were requested", definition.arity(), args.len()),
      ));
    }

    let target = TypeTag::closed(definition, args.iter().cloned());
    let cache_key = SpecializationKey {
      target: open.target().identity().clone(),
      args: args.iter().map(|arg| arg.identity().clone()).collect(),
    };

    // The map guard is released before `close` runs.
    let cached = self.specializations.get(&cache_key).map(|entry| entry.value().clone());
    let activator = match cached {
      Some(activator) => activator,
      None => {
        let closed = generic
          .close(args)
          .map_err(|err| Error::configuration(target.name(), format!("cannot specialize: {err}")))?;
        debug!(component = %target, service = %source, "Specialized open generic");
        self
          .specializations
          .entry(cache_key)
          .or_insert_with(|| Arc::new(closed))
          .value()
          .clone()
      }
    };

    Ok(open.specialize(source.clone(), target, activator))
  }

  /// A snapshot of every registered descriptor, in registration order.
  pub fn descriptors(&self) -> Vec<ComponentDescriptor> {
    let mut all: Vec<_> = self
      .descriptors
      .iter()
      .flat_map(|entry| entry.value().clone())
      .collect();
    all.sort_by_key(ComponentDescriptor::id);
    all
  }

  /// The number of registered descriptors.
  pub fn len(&self) -> usize {
    self.descriptors.iter().map(|entry| entry.value().len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The number of cached open generic specializations.
  pub fn specialization_count(&self) -> usize {
    self.specializations.len()
  }
}

impl std::fmt::Debug for ComponentRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ComponentRegistry")
      .field("descriptors", &self.len())
      .field("specializations", &self.specializations.len())
      .finish()
  }
}
