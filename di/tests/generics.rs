mod common;

use common::init_tracing;
use fibre_di::{
  Activator, ComponentBuilder, ComponentDescriptor, Constructor, Container, Error, GenericDefinition, OpenGeneric,
  TypeTag,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::any::type_name;
use std::sync::Arc;

// --- Test Fixtures ---

/// The service contract: `Storage<T>`.
trait Storage: Send + Sync {
  fn element_type(&self) -> &'static str;
  fn len(&self) -> usize;
}

/// The implementation: `MemoryStorage<T>`.
struct MemoryStorage<T> {
  items: Mutex<Vec<T>>,
}

impl<T: Send + Sync + 'static> Storage for MemoryStorage<T> {
  fn element_type(&self) -> &'static str {
    type_name::<T>()
  }

  fn len(&self) -> usize {
    self.items.lock().len()
  }
}

struct StorageOf;
struct MemoryStorageOf;

fn storage() -> GenericDefinition {
  GenericDefinition::new::<StorageOf>(1).with_name("Storage")
}

fn memory_storage() -> GenericDefinition {
  GenericDefinition::new::<MemoryStorageOf>(1).with_name("MemoryStorage")
}

fn close<T: Send + Sync + 'static>(args: &[TypeTag]) -> Activator {
  ComponentBuilder::<MemoryStorage<T>>::new()
    .with_target(TypeTag::closed(&memory_storage(), args.iter().cloned()))
    .factory(|| {
      Ok(MemoryStorage {
        items: Mutex::new(Vec::new()),
      })
    })
    .into_activator_as::<dyn Storage>(|storage| storage)
}

/// `MemoryStorage<T>` registered against `Storage<T>` for strings and
/// integers.
fn open_storage() -> ComponentDescriptor {
  ComponentDescriptor::open_generic(
    storage(),
    OpenGeneric::new(memory_storage(), |args| {
      let arg = &args[0];
      if arg.is::<String>() {
        Ok(close::<String>(args))
      } else if arg.is::<i32>() {
        Ok(close::<i32>(args))
      } else {
        Err(Error::activation("MemoryStorage", format!("unsupported element type {arg}")))
      }
    }),
  )
}

fn storage_of<T: 'static>() -> TypeTag {
  TypeTag::closed(&storage(), [TypeTag::of::<T>()])
}

// --- Open Generic Tests ---

#[test]
fn test_closed_requests_produce_distinct_specializations() {
  init_tracing();
  // Arrange
  let container = Container::new();
  container.register(open_storage()).unwrap();

  // Act
  let strings = container.resolve_tag(None, &storage_of::<String>()).unwrap().unwrap();
  let numbers = container.resolve_tag(None, &storage_of::<i32>()).unwrap().unwrap();

  // Assert
  assert_ne!(strings.target(), numbers.target());
  assert_eq!(strings.target().definition(), Some(&memory_storage()));
  assert_eq!(strings.target().type_args(), &[TypeTag::of::<String>()]);
  assert_eq!(numbers.target().type_args(), &[TypeTag::of::<i32>()]);
  assert_eq!(
    strings.downcast::<dyn Storage>().unwrap().element_type(),
    type_name::<String>()
  );
  assert_eq!(numbers.downcast::<dyn Storage>().unwrap().element_type(), "i32");
  assert_eq!(strings.target().name(), "MemoryStorage<alloc::string::String>");
}

#[test]
fn test_specializations_are_cached() {
  let container = Container::new();
  container.register(open_storage()).unwrap();

  for _ in 0..3 {
    container.resolve_tag(None, &storage_of::<String>()).unwrap().unwrap();
  }
  container.resolve_tag(None, &storage_of::<i32>()).unwrap().unwrap();

  assert_eq!(container.registry().specialization_count(), 2);
}

#[test]
fn test_open_generic_lifetime_applies_per_closed_type() {
  let container = Container::new();
  container.register(open_storage().singleton()).unwrap();
  let child = container.new_child().unwrap();

  let a = container.resolve_tag(None, &storage_of::<String>()).unwrap().unwrap();
  let b = child.resolve_tag(None, &storage_of::<String>()).unwrap().unwrap();
  let c = container.resolve_tag(None, &storage_of::<i32>()).unwrap().unwrap();

  assert!(a.ptr_eq(&b));
  assert!(!a.ptr_eq(&c));
  assert_eq!(a.downcast::<dyn Storage>().unwrap().len(), 0);
}

#[test]
fn test_exact_registration_beats_the_open_form() {
  struct Fixed;
  impl Storage for Fixed {
    fn element_type(&self) -> &'static str {
      "fixed"
    }
    fn len(&self) -> usize {
      0
    }
  }

  let container = Container::new();
  container.register(open_storage()).unwrap();
  let exact = ComponentDescriptor::new(
    None,
    storage_of::<String>(),
    fibre_di::Lifetime::Transient,
    ComponentBuilder::<Fixed>::new()
      .factory(|| Ok(Fixed))
      .into_activator_as::<dyn Storage>(|fixed| fixed),
  );
  container.register(exact).unwrap();

  let strings = container.resolve_tag(None, &storage_of::<String>()).unwrap().unwrap();
  let numbers = container.resolve_tag(None, &storage_of::<i32>()).unwrap().unwrap();
  assert_eq!(strings.downcast::<dyn Storage>().unwrap().element_type(), "fixed");
  assert_eq!(numbers.downcast::<dyn Storage>().unwrap().element_type(), "i32");
}

#[test]
fn test_unsupported_type_arguments_are_configuration_errors() {
  let container = Container::new();
  container.register(open_storage()).unwrap();

  let err = container.resolve_tag(None, &storage_of::<f64>()).unwrap_err();
  assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_wrong_arity_is_a_configuration_error() {
  let container = Container::new();
  container.register(open_storage()).unwrap();
  let pair = GenericDefinition::new::<StorageOf>(2).with_name("Storage");

  let request = TypeTag::closed(&pair, [TypeTag::of::<String>(), TypeTag::of::<i32>()]);
  let err = container.resolve_tag(None, &request).unwrap_err();
  assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_open_form_cannot_be_resolved_directly() {
  let container = Container::new();
  container.register(open_storage()).unwrap();

  let err = container.resolve_tag(None, &TypeTag::open(&storage())).unwrap_err();
  assert!(matches!(err, Error::Configuration { .. }));
}

#[test]
fn test_unregistered_open_generic_resolves_to_none() {
  let container = Container::new();
  assert!(container.resolve_tag(None, &storage_of::<String>()).unwrap().is_none());
  assert!(!container.is_registered(None, &storage_of::<String>()));
}

struct Catalog {
  names: Arc<dyn Storage>,
  counts: Arc<dyn Storage>,
  archives: Vec<Arc<dyn Storage>>,
  backup: Option<Arc<dyn Storage>>,
}

impl std::fmt::Debug for Catalog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Catalog").finish_non_exhaustive()
  }
}

#[test]
fn test_constructor_and_member_parameters_receive_specialized_generics() {
  init_tracing();
  // Arrange
  let container = Container::new();
  container
    .register(open_storage().singleton())
    .unwrap()
    .register(
      ComponentDescriptor::builder::<Catalog>()
        .constructor(
          Constructor::new(
            |names: Arc<dyn Storage>, counts: Arc<dyn Storage>, archives: Vec<Arc<dyn Storage>>| {
              Ok(Catalog {
                names,
                counts,
                archives,
                backup: None,
              })
            },
          )
          .named(["names", "counts", "archives"])
          .service("names", storage_of::<String>())
          .service("counts", storage_of::<i32>())
          .service("archives", storage_of::<String>()),
        )
        .property_as("backup", storage_of::<i32>(), |catalog: &mut Catalog, backup| {
          catalog.backup = backup;
        })
        .build(),
    )
    .unwrap();

  // Act
  let catalog = container.resolve_required::<Catalog>().unwrap();

  // Assert
  assert_eq!(catalog.names.element_type(), type_name::<String>());
  assert_eq!(catalog.counts.element_type(), type_name::<i32>());
  assert_eq!(catalog.archives.len(), 1);
  assert!(Arc::ptr_eq(&catalog.archives[0], &catalog.names));
  let backup = catalog.backup.as_ref().unwrap();
  assert!(Arc::ptr_eq(backup, &catalog.counts));
  assert_eq!(container.registry().specialization_count(), 2);
}

#[test]
fn test_unsupported_specialized_parameter_fails_activation() {
  // Arrange
  let container = Container::new();
  container
    .register(open_storage())
    .unwrap()
    .register(
      ComponentDescriptor::builder::<Catalog>()
        .constructor(
          Constructor::new(|names: Arc<dyn Storage>| {
            Ok(Catalog {
              counts: Arc::clone(&names),
              names,
              archives: Vec::new(),
              backup: None,
            })
          })
          .service("arg0", storage_of::<f64>()),
        )
        .build(),
    )
    .unwrap();

  // Act
  let err = container.resolve::<Catalog>().unwrap_err();

  // Assert
  assert!(matches!(err, Error::Configuration { .. }));
}
