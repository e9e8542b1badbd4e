//! Activation metadata: how a component is constructed and wired.
//!
//! A [`ComponentBuilder`] collects constructors, injected members, injection
//! methods and parameter overrides for one component type and erases them
//! into an [`Activator`], which the activation engine drives.

use crate::core::Instance;
use crate::dependency::{Dependencies, Dependency, Factory, MethodFactory, Resolved};
use crate::descriptor::ComponentDescriptor;
use crate::error::{Error, Result};
use crate::lifetime::{Activated, Disposer};
use crate::parameter::{Parameter, ParameterOverride, Signature};
use crate::types::TypeTag;

use once_cell::sync::OnceCell;

use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A component that releases resources when its owning store is torn down.
///
/// Only Scope and Singleton instances are disposed; transient instances are
/// owned by the caller.
pub trait Dispose {
  fn dispose(&self);
}

/// A component value under construction.
pub(crate) type Value = Box<dyn Any + Send>;

type BuildFn<T> = dyn Fn(Vec<Resolved>, &[Parameter]) -> Result<T> + Send + Sync;
type InvokeFn<T> = dyn Fn(&mut T, Vec<Resolved>, &[Parameter]) -> Result<()> + Send + Sync;
type AssignFn = dyn Fn(&mut Value, Resolved, &Parameter) -> Result<()> + Send + Sync;
type FinishFn = dyn Fn(Value) -> Result<Activated> + Send + Sync;

/// A constructor taking its dependencies as typed parameters.
///
/// ```
/// use fibre_di::{Constructor, Result};
/// use std::sync::Arc;
///
/// struct Pool {
///   address: Arc<String>,
/// }
///
/// let constructor = Constructor::new(|address: Arc<String>| -> Result<Pool> { Ok(Pool { address }) })
///   .inject()
///   .named(["address"])
///   .keyed("address", "primary");
///
/// assert_eq!(constructor.parameters()[0].name(), "address");
/// assert_eq!(constructor.parameters()[0].key(), Some("primary"));
/// ```
pub struct Constructor<T> {
  signature: Signature,
  marked: bool,
  build: Box<BuildFn<T>>,
}

impl<T: Send + 'static> Constructor<T> {
  pub fn new<F, Args>(factory: F) -> Self
  where
    F: Factory<T, Args>,
    Args: Dependencies,
  {
    Self {
      signature: Signature::new(Args::parameters()),
      marked: false,
      build: Box::new(move |arguments, parameters| factory.call(Args::from_arguments(arguments, parameters)?)),
    }
  }

  /// Marks this constructor as the one to inject through.
  pub fn inject(mut self) -> Self {
    self.marked = true;
    self
  }

  /// Renames the parameters in declaration order. Names default to
  /// `arg0`, `arg1` and so on.
  pub fn named<I, N>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = N>,
    N: Into<Cow<'static, str>>,
  {
    self.signature.rename(names);
    self
  }

  /// Resolves the named parameter under an explicit registry key.
  pub fn keyed(mut self, parameter: &str, key: impl AsRef<str>) -> Self {
    self.signature.update(parameter, |p| p.with_key(key));
    self
  }

  /// Resolves the named parameter as `service` instead of its Rust type,
  /// e.g. a closed generic served by an open generic registration.
  pub fn service(mut self, parameter: &str, service: TypeTag) -> Self {
    self.signature.update(parameter, |p| p.with_service(service));
    self
  }

  /// A fallback used only when nothing is registered for the parameter.
  pub fn default_value<V: ?Sized + Send + Sync + 'static>(mut self, parameter: &str, value: Arc<V>) -> Self {
    self.signature.update(parameter, |p| p.with_default(Instance::new(value)));
    self
  }

  pub fn parameters(&self) -> &[Parameter] {
    &self.signature.parameters
  }

  pub fn is_marked(&self) -> bool {
    self.marked
  }
}

/// A method invoked once after construction and member injection.
pub struct Method<T> {
  name: Cow<'static, str>,
  signature: Signature,
  invoke: Box<InvokeFn<T>>,
}

impl<T: Send + 'static> Method<T> {
  pub fn new<F, Args>(name: impl Into<Cow<'static, str>>, method: F) -> Self
  where
    F: MethodFactory<T, Args>,
    Args: Dependencies,
  {
    Self {
      name: name.into(),
      signature: Signature::new(Args::parameters()),
      invoke: Box::new(move |target, arguments, parameters| {
        method.call(target, Args::from_arguments(arguments, parameters)?)
      }),
    }
  }

  pub fn named<I, N>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = N>,
    N: Into<Cow<'static, str>>,
  {
    self.signature.rename(names);
    self
  }

  pub fn keyed(mut self, parameter: &str, key: impl AsRef<str>) -> Self {
    self.signature.update(parameter, |p| p.with_key(key));
    self
  }

  pub fn service(mut self, parameter: &str, service: TypeTag) -> Self {
    self.signature.update(parameter, |p| p.with_service(service));
    self
  }

  pub fn default_value<V: ?Sized + Send + Sync + 'static>(mut self, parameter: &str, value: Arc<V>) -> Self {
    self.signature.update(parameter, |p| p.with_default(Instance::new(value)));
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

/// Whether an injected member is a property or a field. Both are resolved
/// and assigned the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
  Property,
  Field,
}

pub(crate) struct ConstructorSlot {
  pub(crate) signature: Signature,
  marked: bool,
  build: Box<BuildFn<Value>>,
}

impl ConstructorSlot {
  pub(crate) fn build(&self, arguments: Vec<Resolved>) -> Result<Value> {
    (self.build)(arguments, &self.signature.parameters)
  }
}

pub(crate) struct MemberSlot {
  pub(crate) kind: MemberKind,
  pub(crate) parameter: Parameter,
  assign: Box<AssignFn>,
}

impl MemberSlot {
  pub(crate) fn assign(&self, value: &mut Value, resolved: Resolved) -> Result<()> {
    (self.assign)(value, resolved, &self.parameter)
  }
}

pub(crate) struct MethodSlot {
  pub(crate) name: Cow<'static, str>,
  pub(crate) signature: Signature,
  invoke: Box<InvokeFn<Value>>,
}

impl MethodSlot {
  pub(crate) fn invoke(&self, value: &mut Value, arguments: Vec<Resolved>) -> Result<()> {
    (self.invoke)(value, arguments, &self.signature.parameters)
  }
}

fn unerase<'a, T: 'static>(value: &'a mut Value, component: &TypeTag) -> Result<&'a mut T> {
  value
    .downcast_mut::<T>()
    .ok_or_else(|| Error::mismatch(component.name(), type_name::<T>()))
}

/// A typed builder for the activation metadata of component type `T`.
///
/// ```
/// use fibre_di::{ComponentDescriptor, Container};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///   fn greet(&self) -> String;
/// }
///
/// struct English {
///   name: Arc<String>,
/// }
///
/// impl Greeter for English {
///   fn greet(&self) -> String {
///     format!("Hello, {}!", self.name)
///   }
/// }
///
/// let container = Container::new();
/// container
///   .register(ComponentDescriptor::instance("World".to_string()))
///   .unwrap()
///   .register(
///     ComponentDescriptor::builder::<English>()
///       .factory(|name: Arc<String>| Ok(English { name }))
///       .build_as::<dyn Greeter>(|english| english),
///   )
///   .unwrap();
///
/// let greeter = container.resolve::<dyn Greeter>().unwrap().unwrap();
/// assert_eq!(greeter.greet(), "Hello, World!");
/// ```
pub struct ComponentBuilder<T> {
  target: TypeTag,
  constructors: Vec<ConstructorSlot>,
  members: Vec<MemberSlot>,
  methods: Vec<MethodSlot>,
  overrides: Vec<ParameterOverride>,
  dispose: Option<fn(&T)>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Default for ComponentBuilder<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Send + Sync + 'static> ComponentBuilder<T> {
  pub fn new() -> Self {
    Self {
      target: TypeTag::of::<T>(),
      constructors: Vec::new(),
      members: Vec::new(),
      methods: Vec::new(),
      overrides: Vec::new(),
      dispose: None,
      _marker: PhantomData,
    }
  }

  /// Describes the target with a different tag, e.g. the closed tag of an
  /// open generic specialization.
  pub fn with_target(mut self, target: TypeTag) -> Self {
    self.target = target;
    self
  }

  pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
    let Constructor {
      signature,
      marked,
      build,
    } = constructor;
    self.constructors.push(ConstructorSlot {
      signature,
      marked,
      build: Box::new(move |arguments, parameters| build(arguments, parameters).map(|value| Box::new(value) as Value)),
    });
    self
  }

  /// Shorthand for a single unmarked constructor.
  pub fn factory<F, Args>(self, factory: F) -> Self
  where
    F: Factory<T, Args>,
    Args: Dependencies,
  {
    self.constructor(Constructor::new(factory))
  }

  pub fn default_constructor(self) -> Self
  where
    T: Default,
  {
    self.factory(|| Ok(T::default()))
  }

  fn member<D, F>(mut self, kind: MemberKind, parameter: Parameter, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    let component = self.target.clone();
    self.members.push(MemberSlot {
      kind,
      parameter,
      assign: Box::new(move |value, resolved, parameter| {
        let dependency = D::from_resolved(resolved, parameter)?;
        assign(unerase::<T>(value, &component)?, dependency);
        Ok(())
      }),
    });
    self
  }

  /// Injects a property after construction.
  pub fn property<D, F>(self, name: impl Into<Cow<'static, str>>, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Property, D::parameter(name.into()), assign)
  }

  pub fn property_keyed<D, F>(self, name: impl Into<Cow<'static, str>>, key: impl AsRef<str>, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Property, D::parameter(name.into()).with_key(key), assign)
  }

  /// Injects a property resolved as `service` instead of its Rust type.
  pub fn property_as<D, F>(self, name: impl Into<Cow<'static, str>>, service: TypeTag, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Property, D::parameter(name.into()).with_service(service), assign)
  }

  /// Injects a field after construction.
  pub fn field<D, F>(self, name: impl Into<Cow<'static, str>>, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Field, D::parameter(name.into()), assign)
  }

  pub fn field_keyed<D, F>(self, name: impl Into<Cow<'static, str>>, key: impl AsRef<str>, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Field, D::parameter(name.into()).with_key(key), assign)
  }

  pub fn field_as<D, F>(self, name: impl Into<Cow<'static, str>>, service: TypeTag, assign: F) -> Self
  where
    D: Dependency,
    F: Fn(&mut T, D) + Send + Sync + 'static,
  {
    self.member(MemberKind::Field, D::parameter(name.into()).with_service(service), assign)
  }

  pub fn method(mut self, method: Method<T>) -> Self {
    let Method { name, signature, invoke } = method;
    let component = self.target.clone();
    self.methods.push(MethodSlot {
      name,
      signature,
      invoke: Box::new(move |value, arguments, parameters| {
        invoke(unerase::<T>(value, &component)?, arguments, parameters)
      }),
    });
    self
  }

  /// Binds a descriptor-level override. Overrides passed at resolution time
  /// take precedence.
  pub fn with_parameter(mut self, parameter: ParameterOverride) -> Self {
    self.overrides.push(parameter);
    self
  }

  /// Hands Scope and Singleton instances to their store for disposal.
  pub fn disposable(mut self) -> Self
  where
    T: Dispose,
  {
    self.dispose = Some(<T as Dispose>::dispose);
    self
  }

  pub fn into_activator(self) -> Activator {
    self.into_activator_as::<T>(|value| value)
  }

  /// Erases the builder, exposing the instance as service type `S`.
  pub fn into_activator_as<S>(self, cast: impl Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static) -> Activator
  where
    S: ?Sized + Send + Sync + 'static,
  {
    let target = self.target.clone();
    let dispose = self.dispose;
    let finish = move |value: Value| -> Result<Activated> {
      let value = value
        .downcast::<T>()
        .map_err(|_| Error::mismatch(target.name(), type_name::<T>()))?;
      let value: Arc<T> = Arc::from(value);
      let disposer = dispose.map(|dispose| {
        let owned = Arc::clone(&value);
        Box::new(move || dispose(&owned)) as Disposer
      });
      Ok(Activated {
        instance: Instance::with_target(cast(value), target.clone()),
        disposer,
      })
    };

    Activator {
      target: self.target,
      constructors: self.constructors,
      members: self.members,
      methods: self.methods,
      overrides: self.overrides,
      finish: Box::new(finish),
      selected: OnceCell::new(),
    }
  }

  /// Builds a descriptor whose source and target are both `T`.
  pub fn build(self) -> ComponentDescriptor {
    ComponentDescriptor::from_activator(TypeTag::of::<T>(), self.into_activator())
  }

  /// Builds a descriptor registered against service type `S`, usually a
  /// trait object implemented by `T`.
  pub fn build_as<S>(self, cast: impl Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static) -> ComponentDescriptor
  where
    S: ?Sized + Send + Sync + 'static,
  {
    ComponentDescriptor::from_activator(TypeTag::of::<S>(), self.into_activator_as(cast))
  }
}

/// The erased activation metadata of one concrete component type.
pub struct Activator {
  target: TypeTag,
  constructors: Vec<ConstructorSlot>,
  members: Vec<MemberSlot>,
  methods: Vec<MethodSlot>,
  overrides: Vec<ParameterOverride>,
  finish: Box<FinishFn>,
  selected: OnceCell<usize>,
}

impl Activator {
  pub fn target(&self) -> &TypeTag {
    &self.target
  }

  /// The constructor to activate through.
  ///
  /// The choice is made on first use and cached. A marked constructor wins.
  /// Without marks the sole constructor is used, or the parameterless one
  /// when there are several.
  pub(crate) fn select(&self) -> Result<&ConstructorSlot> {
    let index = self.selected.get_or_try_init(|| self.choose())?;
    Ok(&self.constructors[*index])
  }

  fn choose(&self) -> Result<usize> {
    let component = self.target.name();
    let marked: Vec<usize> = (0..self.constructors.len())
      .filter(|&index| self.constructors[index].marked)
      .collect();
    match marked.as_slice() {
      [index] => return Ok(*index),
      [] => {}
      many => {
        return Err(Error::configuration(
          component,
          format!("{} constructors are marked for injection", many.len()),
        ))
      }
    }

    match self.constructors.len() {
      0 => Err(Error::configuration(component, "no constructor available")),
      1 => Ok(0),
      count => {
        let parameterless: Vec<usize> = (0..count)
          .filter(|&index| self.constructors[index].signature.parameters.is_empty())
          .collect();
        match parameterless.as_slice() {
          [index] => Ok(*index),
          _ => Err(Error::configuration(
            component,
            format!("{count} constructors are available and none is marked for injection"),
          )),
        }
      }
    }
  }

  pub(crate) fn members(&self) -> &[MemberSlot] {
    &self.members
  }

  pub(crate) fn methods(&self) -> &[MethodSlot] {
    &self.methods
  }

  pub(crate) fn overrides(&self) -> &[ParameterOverride] {
    &self.overrides
  }

  pub(crate) fn finish(&self, value: Value) -> Result<Activated> {
    (self.finish)(value)
  }
}

impl fmt::Debug for Activator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Activator")
      .field("target", &self.target)
      .field("constructors", &self.constructors.len())
      .field("members", &self.members.len())
      .field("methods", &self.methods.len())
      .field("overrides", &self.overrides.len())
      .finish()
  }
}
