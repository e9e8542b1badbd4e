mod common;

use common::{connection, init_tracing, Connection, DisposalLog};
use fibre_di::{ComponentDescriptor, Container, Error};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// --- Destroy and Disposal Tests ---

#[test]
fn test_destroy_disposes_scope_instances_exactly_once() {
  init_tracing();
  // Arrange
  let log = DisposalLog::default();
  let root = Container::new();
  root
    .register(connection("session", &log).scoped())
    .unwrap()
    .register(connection("cache", &log).scoped())
    .unwrap();
  let child = root.new_child().unwrap();
  child.resolve_keyed::<Connection>("session").unwrap().unwrap();
  child.resolve_keyed::<Connection>("session").unwrap().unwrap();
  child.resolve_keyed::<Connection>("cache").unwrap().unwrap();

  // Act
  child.destroy().unwrap();
  let _ = child.destroy();

  // Assert: reverse creation order, once each.
  assert_eq!(log.entries(), vec!["cache", "session"]);
}

#[test]
fn test_child_destroy_leaves_singletons_alone() {
  let log = DisposalLog::default();
  let root = Container::new();
  root
    .register(connection("pool", &log).singleton())
    .unwrap()
    .register(connection("request", &log).scoped())
    .unwrap();

  let child = root.new_child().unwrap();
  let pool = child.resolve_keyed::<Connection>("pool").unwrap().unwrap();
  child.resolve_keyed::<Connection>("request").unwrap().unwrap();
  child.destroy().unwrap();

  assert_eq!(log.entries(), vec!["request"]);
  let again = root.resolve_keyed::<Connection>("pool").unwrap().unwrap();
  assert!(Arc::ptr_eq(&pool, &again));

  root.destroy().unwrap();
  assert_eq!(log.entries(), vec!["request", "pool"]);
}

#[test]
fn test_transient_instances_are_never_disposed() {
  let log = DisposalLog::default();
  let root = Container::new();
  root.register(connection("temp", &log)).unwrap();

  root.resolve_keyed::<Connection>("temp").unwrap().unwrap();
  root.destroy().unwrap();

  assert_eq!(log.count("temp"), 0);
}

#[test]
fn test_root_destroy_cascades_to_descendants() {
  let log = DisposalLog::default();
  let root = Container::new();
  root.register(connection("scoped", &log).scoped()).unwrap();
  let child = root.new_child().unwrap();
  let grandchild = child.new_child().unwrap();
  grandchild.resolve_keyed::<Connection>("scoped").unwrap().unwrap();
  child.resolve_keyed::<Connection>("scoped").unwrap().unwrap();

  root.destroy().unwrap();

  assert!(child.is_destroyed());
  assert!(grandchild.is_destroyed());
  assert_eq!(log.count("scoped"), 2);
}

#[test]
fn test_destroy_keeps_registrations() {
  let root = Container::new();
  root.register(ComponentDescriptor::instance(7_u64)).unwrap();
  let child = root.new_child().unwrap();

  child.destroy().unwrap();

  assert!(root.is_registered_type::<u64>(None));
  let sibling = root.new_child().unwrap();
  assert_eq!(*sibling.resolve::<u64>().unwrap().unwrap(), 7);
}

#[test]
fn test_on_destroy_handlers_fire_once_before_disposal() {
  let log = DisposalLog::default();
  let root = Container::new();
  root.register(connection("db", &log).scoped()).unwrap();
  let child = root.new_child().unwrap();
  child.resolve_keyed::<Connection>("db").unwrap().unwrap();

  let handler_log = log.clone();
  child.on_destroy(move || handler_log.record("handler")).unwrap();
  child.destroy().unwrap();
  let _ = child.destroy();

  assert_eq!(log.entries(), vec!["handler", "db"]);
  assert!(matches!(child.on_destroy(|| {}), Err(Error::Destroyed)));
}

#[test]
fn test_destroyed_child_fails_resolution_but_parent_works() {
  let log = DisposalLog::default();
  let root = Container::new();
  root.register(connection("db", &log).scoped()).unwrap();
  let child = root.new_child().unwrap();
  child.destroy().unwrap();

  assert!(matches!(
    child.resolve_keyed::<Connection>("db"),
    Err(Error::Destroyed)
  ));
  assert!(root.resolve_keyed::<Connection>("db").unwrap().is_some());
}

#[test]
fn test_destroy_waits_for_inflight_resolution() {
  // A resolution that is running when destroy is called finishes first; its
  // instance is then disposed with the node.
  struct Slow;
  let started = Arc::new(AtomicUsize::new(0));
  let log = DisposalLog::default();
  let root = Container::new();
  let signal = started.clone();
  let dispose_log = log.clone();
  root
    .register(
      ComponentDescriptor::builder::<Slow>()
        .factory(move || {
          signal.store(1, Ordering::SeqCst);
          thread::sleep(Duration::from_millis(100));
          Ok(Slow)
        })
        .build()
        .scoped(),
    )
    .unwrap();
  let child = root.new_child().unwrap();
  child.on_destroy(move || dispose_log.record("destroyed")).unwrap();

  thread::scope(|s| {
    let resolver = s.spawn(|| child.resolve::<Slow>());
    while started.load(Ordering::SeqCst) == 0 {
      thread::yield_now();
    }
    child.destroy().unwrap();
    assert!(resolver.join().unwrap().unwrap().is_some());
  });

  assert_eq!(log.entries(), vec!["destroyed"]);
  assert!(child.is_destroyed());
}

#[test]
fn test_panicking_dispose_does_not_stop_teardown() {
  struct Faulty;
  impl fibre_di::Dispose for Faulty {
    fn dispose(&self) {
      panic!("faulty dispose");
    }
  }

  let log = DisposalLog::default();
  let root = Container::new();
  root
    .register(connection("first", &log).scoped())
    .unwrap()
    .register(
      ComponentDescriptor::builder::<Faulty>()
        .factory(|| Ok(Faulty))
        .disposable()
        .build()
        .scoped(),
    )
    .unwrap();
  root.resolve_keyed::<Connection>("first").unwrap().unwrap();
  root.resolve::<Faulty>().unwrap().unwrap();

  root.destroy().unwrap();
  assert_eq!(log.entries(), vec!["first"]);
}
