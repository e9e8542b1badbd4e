//! # Fibre DI
//!
//! A thread-safe, hierarchical dependency-injection runtime for Rust.
//!
//! Components are described by [`ComponentDescriptor`]s: a source type callers
//! resolve against, a concrete target, an optional key and a [`Lifetime`].
//! Containers form a tree. Every node shares the registry of its root, so
//! registrations made anywhere are visible everywhere, while instances are
//! cached per lifetime:
//!
//! - **Transient**: a new instance for every resolution.
//! - **Scope**: one instance per container node.
//! - **Singleton**: one instance per root, shared by all descendants.
//!
//! Rust has no runtime reflection, so components declare their dependencies
//! as typed factory parameters (`Arc<T>`, `Option<Arc<T>>` or `Vec<Arc<T>>`),
//! and types are described at runtime by [`TypeTag`]s. Open generic
//! components are closed on demand through a [`GenericDefinition`].
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{ComponentDescriptor, Container};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!   fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!   message: Arc<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!   fn greet(&self) -> String {
//!     self.message.to_string()
//!   }
//! }
//!
//! let root = Container::new();
//! root
//!   .register(ComponentDescriptor::instance(String::from("Hello, World!")).with_key("greeting"))
//!   .unwrap()
//!   .register(
//!     ComponentDescriptor::builder::<EnglishGreeter>()
//!       .constructor(
//!         fibre_di::Constructor::new(|message: Arc<String>| Ok(EnglishGreeter { message }))
//!           .named(["message"])
//!           .keyed("message", "greeting"),
//!       )
//!       .build_as::<dyn Greeter>(|greeter| greeter)
//!       .singleton(),
//!   )
//!   .unwrap();
//!
//! let request = root.new_child().unwrap();
//! let greeter = request.resolve::<dyn Greeter>().unwrap().unwrap();
//! assert_eq!(greeter.greet(), "Hello, World!");
//! ```

mod activation;
mod activator;
mod builder;
mod container;
mod core;
mod dependency;
mod descriptor;
mod error;
mod global;
mod lifetime;
mod macros;
mod parameter;
mod registry;
mod types;

pub use activation::{ParameterResolver, ResolveContext};
pub use activator::{Activator, ComponentBuilder, Constructor, Dispose, MemberKind, Method};
pub use builder::{ContainerBuilder, ContainerOptions};
pub use container::Container;
pub use crate::core::Instance;
pub use dependency::{Dependencies, Dependency, Factory, MethodFactory, Resolved};
pub use descriptor::{ComponentDescriptor, ComponentId, Lifetime, OpenGeneric};
pub use error::{BuildError, Error, Result};
pub use global::global;
pub use parameter::{OverrideTarget, OverrideValue, Parameter, ParameterOverride};
pub use registry::ComponentRegistry;
pub use types::{GenericDefinition, TypeIdentity, TypeTag};
