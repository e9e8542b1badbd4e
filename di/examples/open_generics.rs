//! Open generic registration: `Repository<T>` served by `MemoryRepository<T>`,
//! closed for each entity type on first request.

use fibre_di::{
  Activator, ComponentBuilder, ComponentDescriptor, Container, Error, GenericDefinition, OpenGeneric, TypeTag,
};
use std::any::type_name;
use std::sync::Arc;

trait Repository: Send + Sync {
  fn describe(&self) -> String;
}

struct MemoryRepository<T> {
  rows: Vec<T>,
}

impl<T: Send + Sync + 'static> Repository for MemoryRepository<T> {
  fn describe(&self) -> String {
    format!("{} rows of {}", self.rows.len(), type_name::<T>())
  }
}

struct User;
struct Order;

struct RepositoryOf;
struct MemoryRepositoryOf;

fn repository() -> GenericDefinition {
  GenericDefinition::new::<RepositoryOf>(1).with_name("Repository")
}

fn memory_repository() -> GenericDefinition {
  GenericDefinition::new::<MemoryRepositoryOf>(1).with_name("MemoryRepository")
}

fn close<T: Send + Sync + 'static>(args: &[TypeTag]) -> Activator {
  ComponentBuilder::<MemoryRepository<T>>::new()
    .with_target(TypeTag::closed(&memory_repository(), args.iter().cloned()))
    .factory(|| Ok(MemoryRepository { rows: Vec::new() }))
    .into_activator_as::<dyn Repository>(|repository| repository)
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();
  container.register(
    ComponentDescriptor::open_generic(
      repository(),
      OpenGeneric::new(memory_repository(), |args| match &args[0] {
        arg if arg.is::<User>() => Ok(close::<User>(args)),
        arg if arg.is::<Order>() => Ok(close::<Order>(args)),
        arg => Err(Error::activation("MemoryRepository", format!("no repository for {arg}"))),
      }),
    )
    .scoped(),
  )?;

  for request in [
    TypeTag::closed(&repository(), [TypeTag::of::<User>()]),
    TypeTag::closed(&repository(), [TypeTag::of::<Order>()]),
  ] {
    let Some(instance) = container.resolve_tag(None, &request)? else {
      unreachable!("the open registration serves every closed request");
    };
    let repository: Arc<dyn Repository> = instance.downcast().expect("served as dyn Repository");
    println!("{request} -> {}: {}", instance.target(), repository.describe());
  }

  let unsupported = TypeTag::closed(&repository(), [TypeTag::of::<String>()]);
  match container.resolve_tag(None, &unsupported) {
    Err(err) => println!("{unsupported}: {err}"),
    Ok(_) => unreachable!("String has no repository"),
  }
  println!("{} specializations cached", container.registry().specialization_count());
  Ok(())
}
