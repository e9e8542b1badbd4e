//! Lifetime stores: the per-lifetime instance caches.

use crate::core::{Instance, InstanceKey};
use crate::error::{Error, Result};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Releases one disposable instance.
pub(crate) type Disposer = Box<dyn FnOnce() + Send>;

/// A freshly activated instance and, if its component is disposable, the
/// disposer its owning store runs at teardown.
pub(crate) struct Activated {
  pub(crate) instance: Instance,
  pub(crate) disposer: Option<Disposer>,
}

/// A per-lifetime instance cache.
pub(crate) trait LifetimeStore: Send + Sync {
  /// Returns the cached instance for `key`, or runs `create` and caches its
  /// result according to the store's policy.
  fn get_or_create(&self, key: &InstanceKey, create: &mut dyn FnMut() -> Result<Activated>) -> Result<Instance>;

  /// The number of cached instances.
  fn len(&self) -> usize;

  /// Disposes every owned instance. Runs at most once.
  fn dispose(&self);
}

/// The null store behind `Lifetime::Transient`: every request constructs.
#[derive(Debug, Default)]
pub(crate) struct TransientStore;

impl LifetimeStore for TransientStore {
  fn get_or_create(&self, _: &InstanceKey, create: &mut dyn FnMut() -> Result<Activated>) -> Result<Instance> {
    // Transient instances belong to the caller, so their disposer is dropped.
    create().map(|activated| activated.instance)
  }

  fn len(&self) -> usize {
    0
  }

  fn dispose(&self) {}
}

#[derive(Default)]
struct Disposal {
  disposed: bool,
  disposers: Vec<(InstanceKey, Disposer)>,
}

/// The caching store behind `Lifetime::Scope` and `Lifetime::Singleton`.
///
/// Each key maps to a `OnceCell`. The cell is cloned out of the map before
/// construction starts, so no shard lock is held while a factory runs and
/// recursive resolutions through the same store cannot deadlock. The first
/// initializer wins; concurrent callers block on the cell and receive the
/// winner's instance.
pub(crate) struct InstanceStore {
  label: &'static str,
  cells: DashMap<InstanceKey, Arc<OnceCell<Instance>>>,
  disposal: Mutex<Disposal>,
}

impl InstanceStore {
  pub(crate) fn new(label: &'static str) -> Self {
    Self {
      label,
      cells: DashMap::new(),
      disposal: Mutex::new(Disposal::default()),
    }
  }

  pub(crate) fn is_disposed(&self) -> bool {
    self.disposal.lock().disposed
  }
}

impl LifetimeStore for InstanceStore {
  fn get_or_create(&self, key: &InstanceKey, create: &mut dyn FnMut() -> Result<Activated>) -> Result<Instance> {
    let cell = self.cells.entry(key.clone()).or_default().value().clone();

    if let Some(instance) = cell.get() {
      trace!(store = self.label, ?key, "Cache hit");
      return Ok(instance.clone());
    }

    let created = cell.get_or_try_init(|| -> Result<Instance> {
      if self.is_disposed() {
        return Err(Error::Destroyed);
      }
      let Activated { instance, disposer } = create()?;
      if let Some(disposer) = disposer {
        let mut disposal = self.disposal.lock();
        if disposal.disposed {
          drop(disposal);
          disposer();
          return Err(Error::Destroyed);
        }
        disposal.disposers.push((key.clone(), disposer));
      }
      trace!(store = self.label, ?key, "Cached new instance");
      Ok(instance)
    });

    match created {
      Ok(instance) => Ok(instance.clone()),
      Err(err) => {
        // Drop the cell this call used, unless another caller filled it since.
        self
          .cells
          .remove_if(key, |_, current| Arc::ptr_eq(current, &cell) && current.get().is_none());
        Err(err)
      }
    }
  }

  fn len(&self) -> usize {
    self.cells.iter().filter(|cell| cell.value().get().is_some()).count()
  }

  fn dispose(&self) {
    let disposers = {
      let mut disposal = self.disposal.lock();
      if disposal.disposed {
        return;
      }
      disposal.disposed = true;
      std::mem::take(&mut disposal.disposers)
    };

    debug!(store = self.label, count = disposers.len(), "Disposing instances");
    for (key, disposer) in disposers.into_iter().rev() {
      if catch_unwind(AssertUnwindSafe(disposer)).is_err() {
        warn!(store = self.label, ?key, "Dispose panicked; continuing teardown");
      }
    }
    self.cells.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::descriptor::ComponentId;
  use crate::types::TypeTag;

  use std::sync::atomic::{AtomicUsize, Ordering};

  fn key(id: u64) -> InstanceKey {
    InstanceKey {
      component: ComponentId::from_raw(id),
      service: TypeTag::of::<u32>().identity().clone(),
    }
  }

  fn activated(value: u32, log: Option<(Arc<Mutex<Vec<u32>>>, u32)>) -> Activated {
    Activated {
      instance: Instance::new(Arc::new(value)),
      disposer: log.map(|(log, tag)| Box::new(move || log.lock().push(tag)) as Disposer),
    }
  }

  #[test]
  fn transient_store_always_creates() {
    let store = TransientStore;
    let calls = AtomicUsize::new(0);
    let mut create = || -> Result<Activated> {
      calls.fetch_add(1, Ordering::SeqCst);
      Ok(activated(1, None))
    };
    let a = store.get_or_create(&key(1), &mut create).unwrap();
    let b = store.get_or_create(&key(1), &mut create).unwrap();
    assert!(!a.ptr_eq(&b));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn instance_store_caches_per_key() {
    let store = InstanceStore::new("scope");
    let a = store.get_or_create(&key(1), &mut || Ok(activated(1, None))).unwrap();
    let b = store.get_or_create(&key(1), &mut || Ok(activated(2, None))).unwrap();
    let c = store.get_or_create(&key(2), &mut || Ok(activated(3, None))).unwrap();
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn failed_creation_leaves_the_cell_empty() {
    let store = InstanceStore::new("scope");
    let err = store
      .get_or_create(&key(1), &mut || Err(Error::activation("Flaky", "not yet")))
      .unwrap_err();
    assert!(matches!(err, Error::Activation { .. }));
    assert_eq!(store.len(), 0);
    assert!(store.cells.is_empty());
    assert!(store.get_or_create(&key(1), &mut || Ok(activated(1, None))).is_ok());
  }

  #[test]
  fn failed_keys_do_not_accumulate() {
    let store = InstanceStore::new("singleton");
    for id in 1..=5 {
      let _ = store.get_or_create(&key(id), &mut || Err(Error::activation("Flaky", "down")));
    }
    store.get_or_create(&key(6), &mut || Ok(activated(6, None))).unwrap();

    assert_eq!(store.cells.len(), 1);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn dispose_runs_once_in_reverse_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let store = InstanceStore::new("scope");
    for id in 1..=3 {
      store
        .get_or_create(&key(id as u64), &mut || Ok(activated(id, Some((log.clone(), id)))))
        .unwrap();
    }

    store.dispose();
    store.dispose();

    assert_eq!(*log.lock(), vec![3, 2, 1]);
    assert!(store.is_disposed());
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn disposed_store_rejects_new_instances() {
    let store = InstanceStore::new("scope");
    store.dispose();

    let err = store.get_or_create(&key(1), &mut || Ok(activated(1, None))).unwrap_err();
    assert!(matches!(err, Error::Destroyed));
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn panicking_disposer_does_not_stop_teardown() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let store = InstanceStore::new("singleton");
    store
      .get_or_create(&key(1), &mut || Ok(activated(1, Some((log.clone(), 1)))))
      .unwrap();
    store
      .get_or_create(&key(2), &mut || {
        Ok(Activated {
          instance: Instance::new(Arc::new(2_u32)),
          disposer: Some(Box::new(|| panic!("disposer failed"))),
        })
      })
      .unwrap();

    store.dispose();
    assert_eq!(*log.lock(), vec![1]);
  }
}
