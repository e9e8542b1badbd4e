//! The process-wide root container.

use crate::container::Container;
use once_cell::sync::Lazy;

// Created on first access, in a thread-safe manner, and never destroyed.
static GLOBAL_CONTAINER: Lazy<Container> = Lazy::new(Container::new);

/// Provides a reference to the global root container.
///
/// Use it to register components from anywhere in an application; the
/// [`resolve!`](crate::resolve) macro resolves from it.
///
/// # Examples
///
/// ```
/// use fibre_di::{global, ComponentDescriptor};
///
/// fn register_services() {
///   global()
///     .register(ComponentDescriptor::instance(String::from("Hello from global!")))
///     .unwrap();
/// }
/// # register_services();
/// ```
pub fn global() -> &'static Container {
  &GLOBAL_CONTAINER
}
