//! Collection resolution: every registration of a service, in order.

use fibre_di::{ComponentDescriptor, Container};
use std::sync::Arc;

trait Bootstrapper: Send + Sync {
  fn run(&self);
}

#[derive(Default)]
struct Logging;
impl Bootstrapper for Logging {
  fn run(&self) {
    println!("  logging configured");
  }
}

#[derive(Default)]
struct Database;
impl Bootstrapper for Database {
  fn run(&self) {
    println!("  database migrated");
  }
}

#[derive(Default)]
struct Messaging;
impl Bootstrapper for Messaging {
  fn run(&self) {
    println!("  message broker connected");
  }
}

struct Application {
  bootstrappers: Vec<Arc<dyn Bootstrapper>>,
}

fn bootstrapper<T: Bootstrapper + Default + 'static>() -> ComponentDescriptor {
  ComponentDescriptor::builder::<T>()
    .default_constructor()
    .build_as::<dyn Bootstrapper>(|b| b)
    .singleton()
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();
  container
    .register_all([bootstrapper::<Logging>(), bootstrapper::<Database>(), bootstrapper::<Messaging>()])?
    .register(
      ComponentDescriptor::builder::<Application>()
        .factory(|bootstrappers: Vec<Arc<dyn Bootstrapper>>| Ok(Application { bootstrappers }))
        .build(),
    )?;

  let app = container.resolve_required::<Application>()?;
  println!("Starting {} bootstrappers:", app.bootstrappers.len());
  for bootstrapper in &app.bootstrappers {
    bootstrapper.run();
  }

  // A single resolution picks the most recent registration.
  let last = container.resolve_required::<dyn Bootstrapper>()?;
  assert!(Arc::ptr_eq(&last, &app.bootstrappers[2]));
  Ok(())
}
