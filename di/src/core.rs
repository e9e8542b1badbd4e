//! Core data structures shared by the registry, the lifetime stores and the
//! activation engine.

use crate::builder::ContainerOptions;
use crate::descriptor::ComponentId;
use crate::error::{Error, Result};
use crate::types::{TypeIdentity, TypeTag};

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

thread_local! {
  // The components currently being activated on this thread, outermost first.
  // Re-entering a component that is already on the stack is a cycle.
  static RESOLVING_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

struct Frame {
  key: InstanceKey,
  name: String,
}

/// An RAII guard that tracks the activation stack of the current thread.
///
/// When created, it pushes the component onto the thread-local stack and
/// fails if the component is already on it or if the stack is too deep.
/// When dropped, it pops the component again.
pub(crate) struct ResolutionGuard {
  _not_send: std::marker::PhantomData<*const ()>,
}

impl ResolutionGuard {
  pub(crate) fn enter(key: &InstanceKey, name: &str, options: &ContainerOptions) -> Result<Self> {
    RESOLVING_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();

      if options.detect_cycles {
        if let Some(start) = stack.iter().position(|frame| frame.key == *key) {
          let chain = stack[start..]
            .iter()
            .map(|frame| frame.name.as_str())
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join(" -> ");
          return Err(Error::Cycle { chain });
        }
      }

      if stack.len() >= options.max_depth {
        return Err(Error::DepthExceeded {
          component: name.to_owned(),
          limit: options.max_depth,
        });
      }

      stack.push(Frame {
        key: key.clone(),
        name: name.to_owned(),
      });
      Ok(Self {
        _not_send: std::marker::PhantomData,
      })
    })
  }
}

impl Drop for ResolutionGuard {
  fn drop(&mut self) {
    RESOLVING_STACK.with(|stack| {
      stack.borrow_mut().pop();
    });
  }
}

/// The cache key of one constructed instance inside a lifetime store.
///
/// Keyed by descriptor rather than by `(Key, SourceType)` alone so that
/// several cached descriptors sharing an identity each keep their own
/// instance; the service identity separates the specializations of one open
/// generic descriptor.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct InstanceKey {
  pub(crate) component: ComponentId,
  pub(crate) service: TypeIdentity,
}

/// A type-erased, shareable component instance.
///
/// Internally this holds an `Arc<S>` where `S` is the service type the
/// instance was resolved as, so trait objects round-trip through the
/// container unchanged.
#[derive(Clone)]
pub struct Instance {
  value: Arc<dyn Any + Send + Sync>,
  target: TypeTag,
}

impl Instance {
  /// Wraps a value. The target tag is the tag of `S`.
  pub fn new<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
    Self::with_target(value, TypeTag::of::<S>())
  }

  /// Wraps a value whose concrete type is described by `target`.
  pub fn with_target<S: ?Sized + Send + Sync + 'static>(value: Arc<S>, target: TypeTag) -> Self {
    Self {
      value: Arc::new(value),
      target,
    }
  }

  /// Bundles resolved instances into one collection instance of `element`,
  /// e.g. to supply an override for a collection parameter.
  pub fn from_items(items: Vec<Instance>, element: &TypeTag) -> Self {
    Self {
      value: Arc::new(items),
      target: TypeTag::collection_of(element.clone()),
    }
  }

  /// Returns the instance as `Arc<S>` if it was resolved as `S`.
  pub fn downcast<S: ?Sized + 'static>(&self) -> Option<Arc<S>> {
    self.value.downcast_ref::<Arc<S>>().cloned()
  }

  /// The members of a collection instance.
  pub fn items(&self) -> Option<&[Instance]> {
    self.value.downcast_ref::<Vec<Instance>>().map(Vec::as_slice)
  }

  /// The concrete type this instance was activated from.
  pub fn target(&self) -> &TypeTag {
    &self.target
  }

  /// Returns `true` if both handles refer to the same activation.
  pub fn ptr_eq(&self, other: &Instance) -> bool {
    Arc::ptr_eq(&self.value, &other.value)
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Instance({})", self.target)
  }
}
