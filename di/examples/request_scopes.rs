//! One child container per request: scoped components live exactly as long
//! as the request, singletons as long as the application.

use fibre_di::{ComponentDescriptor, Container, Dispose};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_REQUEST: AtomicU32 = AtomicU32::new(1);

struct ConnectionPool;

impl Dispose for ConnectionPool {
  fn dispose(&self) {
    println!("  pool closed");
  }
}

struct RequestContext {
  id: u32,
  pool: Arc<ConnectionPool>,
}

impl Dispose for RequestContext {
  fn dispose(&self) {
    println!("  request {} finished", self.id);
  }
}

fn handle(root: &Container, path: &str) -> fibre_di::Result<()> {
  let request = root.new_child()?;
  let context = request.resolve_required::<RequestContext>()?;
  let again = request.resolve_required::<RequestContext>()?;
  assert!(Arc::ptr_eq(&context, &again));
  println!("  request {} handles {path}", context.id);
  request.destroy()
}

fn main() -> fibre_di::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let root = Container::new();
  root
    .register(
      ComponentDescriptor::builder::<ConnectionPool>()
        .factory(|| Ok(ConnectionPool))
        .disposable()
        .build()
        .singleton(),
    )?
    .register(
      ComponentDescriptor::builder::<RequestContext>()
        .factory(|pool: Arc<ConnectionPool>| {
          Ok(RequestContext {
            id: NEXT_REQUEST.fetch_add(1, Ordering::Relaxed),
            pool,
          })
        })
        .disposable()
        .build()
        .scoped(),
    )?;
  root.on_destroy(|| println!("  application shutting down"))?;

  println!("Serving requests:");
  for path in ["/", "/users", "/orders"] {
    handle(&root, path)?;
  }

  let pool = root.resolve_required::<ConnectionPool>()?;
  let context = root.new_child()?.resolve_required::<RequestContext>()?;
  assert!(Arc::ptr_eq(&pool, &context.pool));

  println!("Shutting down:");
  root.destroy()
}
