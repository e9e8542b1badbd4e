//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use fibre_di::{ComponentDescriptor, Dispose};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
  TRACING.call_once(|| {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  });
}

// --- Services ---

pub trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

#[derive(Default)]
pub struct EnglishGreeter;

impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

#[derive(Default)]
pub struct GermanGreeter;

impl Greeter for GermanGreeter {
  fn greet(&self) -> String {
    "Hallo!".to_string()
  }
}

pub fn english() -> ComponentDescriptor {
  ComponentDescriptor::builder::<EnglishGreeter>()
    .default_constructor()
    .build_as::<dyn Greeter>(|greeter| greeter)
}

pub fn german() -> ComponentDescriptor {
  ComponentDescriptor::builder::<GermanGreeter>()
    .default_constructor()
    .build_as::<dyn Greeter>(|greeter| greeter)
}

// --- Disposal tracking ---

/// Records the names of disposed components, in disposal order.
#[derive(Clone, Default)]
pub struct DisposalLog(Arc<Mutex<Vec<String>>>);

impl DisposalLog {
  pub fn record(&self, name: &str) {
    self.0.lock().push(name.to_owned());
  }

  pub fn entries(&self) -> Vec<String> {
    self.0.lock().clone()
  }

  pub fn count(&self, name: &str) -> usize {
    self.0.lock().iter().filter(|entry| *entry == name).count()
  }
}

/// A disposable component that reports to a shared log.
pub struct Connection {
  pub name: &'static str,
  log: DisposalLog,
}

impl Dispose for Connection {
  fn dispose(&self) {
    self.log.record(self.name);
  }
}

pub fn connection(name: &'static str, log: &DisposalLog) -> ComponentDescriptor {
  let log = log.clone();
  ComponentDescriptor::builder::<Connection>()
    .factory(move || {
      Ok(Connection {
        name,
        log: log.clone(),
      })
    })
    .disposable()
    .build()
    .with_key(name)
}

// --- Construction counting ---

/// Counts how many times a factory ran.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
  pub fn bump(&self) -> usize {
    self.0.fetch_add(1, Ordering::SeqCst) + 1
  }

  pub fn get(&self) -> usize {
    self.0.load(Ordering::SeqCst)
  }
}
