//! Typed injection points.
//!
//! A factory declares its dependencies as typed parameters. Each parameter
//! type implements [`Dependency`], which describes the injection point to the
//! container and converts the resolved value back into the typed form.

use crate::core::Instance;
use crate::error::{Error, Result};
use crate::parameter::Parameter;
use crate::types::TypeTag;

use std::any::type_name;
use std::borrow::Cow;
use std::sync::Arc;

/// The outcome of resolving one injection point.
#[derive(Clone, Debug)]
pub enum Resolved {
  /// Nothing was registered and no default applied.
  Missing,
  One(Instance),
  /// The members of a collection, in registration order.
  Many(Vec<Instance>),
}

impl Resolved {
  /// Wraps an instance, unpacking it when it holds a collection.
  pub(crate) fn from_instance(instance: Instance, parameter: &Parameter) -> Self {
    match instance.items() {
      Some(items) if parameter.is_collection() => Resolved::Many(items.to_vec()),
      _ => Resolved::One(instance),
    }
  }
}

/// A type that can be injected into a constructor or method parameter.
pub trait Dependency: Sized + Send + 'static {
  fn parameter(name: Cow<'static, str>) -> Parameter;

  fn from_resolved(resolved: Resolved, parameter: &Parameter) -> Result<Self>;
}

fn downcast<S: ?Sized + Send + Sync + 'static>(instance: &Instance, parameter: &Parameter) -> Result<Arc<S>> {
  instance
    .downcast::<S>()
    .ok_or_else(|| Error::mismatch(parameter.service().name(), type_name::<S>()))
}

/// A required dependency.
impl<S: ?Sized + Send + Sync + 'static> Dependency for Arc<S> {
  fn parameter(name: Cow<'static, str>) -> Parameter {
    Parameter::required(name, TypeTag::of::<S>())
  }

  fn from_resolved(resolved: Resolved, parameter: &Parameter) -> Result<Self> {
    match resolved {
      Resolved::One(instance) => downcast::<S>(&instance, parameter),
      _ => Err(Error::mismatch(parameter.service().name(), type_name::<S>())),
    }
  }
}

/// An optional dependency: `None` when nothing is registered.
impl<S: ?Sized + Send + Sync + 'static> Dependency for Option<Arc<S>> {
  fn parameter(name: Cow<'static, str>) -> Parameter {
    Parameter::optional(name, TypeTag::of::<S>())
  }

  fn from_resolved(resolved: Resolved, parameter: &Parameter) -> Result<Self> {
    match resolved {
      Resolved::Missing => Ok(None),
      Resolved::One(instance) => downcast::<S>(&instance, parameter).map(Some),
      Resolved::Many(_) => Err(Error::mismatch(parameter.service().name(), type_name::<S>())),
    }
  }
}

/// Every registration of `S`, in registration order.
impl<S: ?Sized + Send + Sync + 'static> Dependency for Vec<Arc<S>> {
  fn parameter(name: Cow<'static, str>) -> Parameter {
    Parameter::collection(name, TypeTag::of::<S>())
  }

  fn from_resolved(resolved: Resolved, parameter: &Parameter) -> Result<Self> {
    match resolved {
      Resolved::Missing => Ok(Vec::new()),
      Resolved::One(instance) => downcast::<S>(&instance, parameter).map(|item| vec![item]),
      Resolved::Many(items) => items.iter().map(|item| downcast::<S>(item, parameter)).collect(),
    }
  }
}

const ARG_NAMES: [&str; 6] = ["arg0", "arg1", "arg2", "arg3", "arg4", "arg5"];

/// A tuple of dependencies: the argument list of a factory.
pub trait Dependencies: Sized + Send + 'static {
  fn parameters() -> Vec<Parameter>;

  /// Converts resolved values back into the typed tuple. `arguments` and
  /// `parameters` line up with the list returned by `parameters()`.
  fn from_arguments(arguments: Vec<Resolved>, parameters: &[Parameter]) -> Result<Self>;
}

impl Dependencies for () {
  fn parameters() -> Vec<Parameter> {
    Vec::new()
  }

  fn from_arguments(_: Vec<Resolved>, _: &[Parameter]) -> Result<Self> {
    Ok(())
  }
}

macro_rules! define_dependencies {
  ($($T:ident => $index:tt),+) => {
    impl<$($T: Dependency),+> Dependencies for ($($T,)+) {
      fn parameters() -> Vec<Parameter> {
        vec![$($T::parameter(Cow::Borrowed(ARG_NAMES[$index])),)+]
      }

      fn from_arguments(arguments: Vec<Resolved>, parameters: &[Parameter]) -> Result<Self> {
        let mut arguments = arguments.into_iter();
        Ok((
          $(
          $T::from_resolved(arguments.next().unwrap_or(Resolved::Missing), &parameters[$index])?,
          )+
        ))
      }
    }
  };
}

define_dependencies! { D1 => 0 }
define_dependencies! { D1 => 0, D2 => 1 }
define_dependencies! { D1 => 0, D2 => 1, D3 => 2 }
define_dependencies! { D1 => 0, D2 => 1, D3 => 2, D4 => 3 }
define_dependencies! { D1 => 0, D2 => 1, D3 => 2, D4 => 3, D5 => 4 }
define_dependencies! { D1 => 0, D2 => 1, D3 => 2, D4 => 3, D5 => 4, D6 => 5 }

/// A constructor function taking its dependencies as typed parameters.
pub trait Factory<T, Args>: Send + Sync + 'static {
  fn call(&self, args: Args) -> Result<T>;
}

/// An injection method: receives the instance under construction followed by
/// its dependencies.
pub trait MethodFactory<T, Args>: Send + Sync + 'static {
  fn call(&self, target: &mut T, args: Args) -> Result<()>;
}

macro_rules! define_factory ({ $($param:ident)* } => {
  impl<F, T, $($param,)*> Factory<T, ($($param,)*)> for F
  where
    F: Fn($($param),*) -> Result<T> + Send + Sync + 'static,
  {
    #[inline]
    #[allow(non_snake_case)]
    fn call(&self, ($($param,)*): ($($param,)*)) -> Result<T> {
      (self)($($param,)*)
    }
  }

  impl<F, T, $($param,)*> MethodFactory<T, ($($param,)*)> for F
  where
    F: Fn(&mut T, $($param),*) -> Result<()> + Send + Sync + 'static,
  {
    #[inline]
    #[allow(non_snake_case)]
    fn call(&self, target: &mut T, ($($param,)*): ($($param,)*)) -> Result<()> {
      (self)(target, $($param,)*)
    }
  }
});

define_factory! {}
define_factory! { D1 }
define_factory! { D1 D2 }
define_factory! { D1 D2 D3 }
define_factory! { D1 D2 D3 D4 }
define_factory! { D1 D2 D3 D4 D5 }
define_factory! { D1 D2 D3 D4 D5 D6 }
