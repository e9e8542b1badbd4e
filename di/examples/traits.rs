use fibre_di::{global, resolve, ComponentDescriptor};
use std::sync::Arc;

// 1. Define the abstraction (the trait)
trait Logger: Send + Sync {
  fn log(&self, message: &str);
}

// 2. Define a concrete implementation
#[derive(Default)]
struct ConsoleLogger;
impl Logger for ConsoleLogger {
  fn log(&self, message: &str) {
    println!("[CONSOLE LOG]: {}", message);
  }
}

// 3. Define a service that depends on the abstraction
struct ReportService {
  logger: Arc<dyn Logger>,
}

impl ReportService {
  fn generate_report(&self) {
    self.logger.log("Starting report generation.");
    self.logger.log("Finished report generation.");
  }
}

fn main() -> fibre_di::Result<()> {
  // --- Registration ---

  // ConsoleLogger is activated as Arc<ConsoleLogger> and served as Arc<dyn Logger>.
  global().register(
    ComponentDescriptor::builder::<ConsoleLogger>()
      .default_constructor()
      .build_as::<dyn Logger>(|logger| logger)
      .singleton(),
  )?;

  // ReportService declares its dependency as a typed factory parameter; the
  // container supplies it.
  global().register(
    ComponentDescriptor::builder::<ReportService>()
      .factory(|logger: Arc<dyn Logger>| Ok(ReportService { logger }))
      .build()
      .singleton(),
  )?;

  // --- Resolution and Usage ---
  println!("Resolving the high-level service...");
  let report_service = resolve!(ReportService);

  println!("Using the service...");
  report_service.generate_report();

  // The same logger instance is shared with anyone else asking for it.
  assert!(Arc::ptr_eq(&report_service.logger, &resolve!(trait Logger)));
  Ok(())
}
