//! Runtime type tags.
//!
//! Rust has no runtime reflection and cannot instantiate generic types on
//! demand, so the container describes the types it works with as values: a
//! `TypeTag` is either a plain Rust type, the "collection of T" shape, an open
//! generic definition or a closed combination of a definition with type
//! arguments.

use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Structural identity of a [`TypeTag`]. Display names never take part in it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeIdentity {
  Type(TypeId),
  Open(TypeId),
  Closed(TypeId, Arc<[TypeIdentity]>),
  Collection(Arc<TypeIdentity>),
}

/// An open generic type definition, e.g. `Repository<_>`.
///
/// A definition is identified by a marker type chosen by the caller and by
/// its arity. The marker never gets instantiated.
///
/// ```
/// use fibre_di::{GenericDefinition, TypeTag};
///
/// struct RepositoryOf;
///
/// let repository = GenericDefinition::new::<RepositoryOf>(1).with_name("Repository");
/// let closed = TypeTag::closed(&repository, [TypeTag::of::<u64>()]);
///
/// assert_eq!(closed.name(), "Repository<u64>");
/// assert_eq!(closed.type_args(), &[TypeTag::of::<u64>()]);
/// ```
#[derive(Clone, Copy)]
pub struct GenericDefinition {
  marker: TypeId,
  name: &'static str,
  arity: usize,
}

impl GenericDefinition {
  pub fn new<M: ?Sized + 'static>(arity: usize) -> Self {
    Self {
      marker: TypeId::of::<M>(),
      name: type_name::<M>(),
      arity,
    }
  }

  /// Overrides the display name, which otherwise is the marker's type name.
  pub fn with_name(mut self, name: &'static str) -> Self {
    self.name = name;
    self
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn arity(&self) -> usize {
    self.arity
  }
}

impl PartialEq for GenericDefinition {
  fn eq(&self, other: &Self) -> bool {
    self.marker == other.marker && self.arity == other.arity
  }
}

impl Eq for GenericDefinition {}

impl Hash for GenericDefinition {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.marker.hash(state);
    self.arity.hash(state);
  }
}

impl fmt::Debug for GenericDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "GenericDefinition({}, arity {})", self.name, self.arity)
  }
}

#[derive(Clone)]
enum Shape {
  Plain,
  Open(GenericDefinition),
  Closed(GenericDefinition, Arc<[TypeTag]>),
  Collection(Arc<TypeTag>),
}

/// A runtime description of a type the container can register or resolve.
#[derive(Clone)]
pub struct TypeTag {
  identity: TypeIdentity,
  name: Cow<'static, str>,
  shape: Shape,
}

impl TypeTag {
  /// The tag of a plain Rust type. `T` may be a trait object.
  pub fn of<T: ?Sized + 'static>() -> Self {
    Self {
      identity: TypeIdentity::Type(TypeId::of::<T>()),
      name: Cow::Borrowed(type_name::<T>()),
      shape: Shape::Plain,
    }
  }

  /// The "collection of `T`" shape, served by collection resolution.
  pub fn collection<T: ?Sized + 'static>() -> Self {
    Self::collection_of(Self::of::<T>())
  }

  pub fn collection_of(element: TypeTag) -> Self {
    Self {
      identity: TypeIdentity::Collection(Arc::new(element.identity.clone())),
      name: Cow::Owned(format!("Collection<{}>", element.name)),
      shape: Shape::Collection(Arc::new(element)),
    }
  }

  /// The open form of a generic definition, used as the source or target of
  /// an open generic registration.
  pub fn open(definition: &GenericDefinition) -> Self {
    let placeholders = vec!["_"; definition.arity].join(", ");
    Self {
      identity: TypeIdentity::Open(definition.marker),
      name: Cow::Owned(format!("{}<{}>", definition.name, placeholders)),
      shape: Shape::Open(*definition),
    }
  }

  /// A closed combination of a generic definition with type arguments.
  pub fn closed(definition: &GenericDefinition, args: impl IntoIterator<Item = TypeTag>) -> Self {
    let args: Arc<[TypeTag]> = args.into_iter().collect();
    let rendered = args.iter().map(|arg| arg.name()).collect::<Vec<_>>().join(", ");
    Self {
      identity: TypeIdentity::Closed(
        definition.marker,
        args.iter().map(|arg| arg.identity.clone()).collect(),
      ),
      name: Cow::Owned(format!("{}<{}>", definition.name, rendered)),
      shape: Shape::Closed(*definition, args),
    }
  }

  pub fn identity(&self) -> &TypeIdentity {
    &self.identity
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns `true` if this is the tag of the plain type `T`.
  pub fn is<T: ?Sized + 'static>(&self) -> bool {
    self.identity == TypeIdentity::Type(TypeId::of::<T>())
  }

  /// The element type of a collection tag.
  pub fn element(&self) -> Option<&TypeTag> {
    match &self.shape {
      Shape::Collection(element) => Some(element),
      _ => None,
    }
  }

  /// The generic definition of an open or closed tag.
  pub fn definition(&self) -> Option<&GenericDefinition> {
    match &self.shape {
      Shape::Open(definition) | Shape::Closed(definition, _) => Some(definition),
      _ => None,
    }
  }

  /// The type arguments of a closed tag; empty for every other shape.
  pub fn type_args(&self) -> &[TypeTag] {
    match &self.shape {
      Shape::Closed(_, args) => args,
      _ => &[],
    }
  }

  pub fn is_collection(&self) -> bool {
    matches!(self.shape, Shape::Collection(_))
  }

  pub fn is_open(&self) -> bool {
    matches!(self.shape, Shape::Open(_))
  }

  pub fn is_closed(&self) -> bool {
    matches!(self.shape, Shape::Closed(..))
  }

  /// The open form of a closed tag.
  pub fn open_form(&self) -> Option<TypeTag> {
    match &self.shape {
      Shape::Closed(definition, _) => Some(TypeTag::open(definition)),
      _ => None,
    }
  }
}

impl PartialEq for TypeTag {
  fn eq(&self, other: &Self) -> bool {
    self.identity == other.identity
  }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.identity.hash(state);
  }
}

impl fmt::Debug for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeTag({})", self.name)
  }
}

impl fmt::Display for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Greeter {}
  struct ListOf;
  struct MapOf;

  #[test]
  fn plain_tags_compare_by_type() {
    assert_eq!(TypeTag::of::<String>(), TypeTag::of::<String>());
    assert_ne!(TypeTag::of::<String>(), TypeTag::of::<u32>());
    assert!(TypeTag::of::<dyn Greeter>().is::<dyn Greeter>());
    assert!(!TypeTag::of::<dyn Greeter>().is_collection());
  }

  #[test]
  fn collection_tag_exposes_element() {
    let tag = TypeTag::collection::<dyn Greeter>();
    assert!(tag.is_collection());
    assert_eq!(tag.element(), Some(&TypeTag::of::<dyn Greeter>()));
    assert_ne!(tag, TypeTag::of::<dyn Greeter>());
  }

  #[test]
  fn closed_tags_depend_on_arguments() {
    let list = GenericDefinition::new::<ListOf>(1).with_name("List");
    let strings = TypeTag::closed(&list, [TypeTag::of::<String>()]);
    let numbers = TypeTag::closed(&list, [TypeTag::of::<i32>()]);

    assert_ne!(strings, numbers);
    assert_eq!(strings, TypeTag::closed(&list, [TypeTag::of::<String>()]));
    assert_eq!(strings.name(), "List<alloc::string::String>");
    assert_eq!(strings.open_form(), Some(TypeTag::open(&list)));
    assert_eq!(TypeTag::open(&list).name(), "List<_>");
  }

  #[test]
  fn definitions_with_distinct_markers_differ() {
    let list = GenericDefinition::new::<ListOf>(1);
    let map = GenericDefinition::new::<MapOf>(2);
    assert_ne!(list, map);
    assert_ne!(TypeTag::open(&list), TypeTag::open(&map));
    assert_eq!(map.arity(), 2);
  }
}
