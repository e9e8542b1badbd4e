//! The activation engine: turns a descriptor into a fully wired instance.

use crate::activator::Activator;
use crate::container::Container;
use crate::core::Instance;
use crate::dependency::Resolved;
use crate::descriptor::ComponentDescriptor;
use crate::error::{Error, Result};
use crate::lifetime::Activated;
use crate::parameter::{OverrideValue, Parameter, ParameterOverride};
use crate::types::TypeTag;

use tracing::trace;

/// A custom value provider bound to one injection point by a
/// [`ParameterOverride`].
///
/// Returning `Ok(None)` means "no value": the parameter's default applies,
/// then optional parameters receive nothing and required ones fail. The
/// registry is never consulted for an overridden parameter.
pub trait ParameterResolver: Send + Sync + 'static {
  fn resolve(&self, context: &ResolveContext<'_>, parameter: &Parameter) -> Result<Option<Instance>>;
}

impl<F> ParameterResolver for F
where
  F: Fn(&ResolveContext<'_>, &Parameter) -> Result<Option<Instance>> + Send + Sync + 'static,
{
  fn resolve(&self, context: &ResolveContext<'_>, parameter: &Parameter) -> Result<Option<Instance>> {
    self(context, parameter)
  }
}

/// What a [`ParameterResolver`] sees: the container the component is being
/// activated in and the component's descriptor.
pub struct ResolveContext<'a> {
  container: &'a Container,
  component: &'a ComponentDescriptor,
}

impl<'a> ResolveContext<'a> {
  pub fn container(&self) -> &'a Container {
    self.container
  }

  pub fn component(&self) -> &'a ComponentDescriptor {
    self.component
  }

  /// Resolves through the container while applying explicit overrides to
  /// the activated component.
  pub fn resolve_with_overrides(
    &self,
    key: Option<&str>,
    service: &TypeTag,
    overrides: &[ParameterOverride],
  ) -> Result<Option<Instance>> {
    self.container.resolve_with_overrides(key, service, overrides)
  }
}

/// Activates one descriptor inside one container.
///
/// Nested dependencies are resolved through `container`, so they land in the
/// lifetime stores of the node the engine runs in.
pub(crate) struct ActivationEngine<'a> {
  container: &'a Container,
  overrides: &'a [ParameterOverride],
}

impl<'a> ActivationEngine<'a> {
  pub(crate) fn new(container: &'a Container, overrides: &'a [ParameterOverride]) -> Self {
    Self { container, overrides }
  }

  pub(crate) fn activate(&self, descriptor: &ComponentDescriptor, activator: &Activator) -> Result<Activated> {
    let component = descriptor.target().name();

    let constructor = activator.select()?;
    constructor.signature.validate(component)?;
    let arguments = constructor
      .signature
      .parameters
      .iter()
      .enumerate()
      .map(|(position, parameter)| self.resolve_parameter(descriptor, activator, parameter, Some(position)))
      .collect::<Result<Vec<_>>>()?;
    let mut value = constructor.build(arguments)?;
    trace!(component, "Constructed instance");

    for member in activator.members() {
      let resolved = self.resolve_parameter(descriptor, activator, &member.parameter, None)?;
      member.assign(&mut value, resolved)?;
      trace!(component, member = member.parameter.name(), kind = ?member.kind, "Injected member");
    }

    for method in activator.methods() {
      method.signature.validate(component)?;
      let arguments = method
        .signature
        .parameters
        .iter()
        .map(|parameter| self.resolve_parameter(descriptor, activator, parameter, None))
        .collect::<Result<Vec<_>>>()?;
      method.invoke(&mut value, arguments)?;
      trace!(component, method = %method.name, "Invoked injection method");
    }

    activator.finish(value)
  }

  fn find_override<'o>(
    &'o self,
    activator: &'o Activator,
    parameter: &Parameter,
    position: Option<usize>,
  ) -> Option<&'o OverrideValue> {
    self
      .overrides
      .iter()
      .chain(activator.overrides())
      .find(|candidate| candidate.target().matches(parameter, position))
      .map(ParameterOverride::supplied)
  }

  fn resolve_parameter(
    &self,
    descriptor: &ComponentDescriptor,
    activator: &Activator,
    parameter: &Parameter,
    position: Option<usize>,
  ) -> Result<Resolved> {
    if let Some(supplied) = self.find_override(activator, parameter, position) {
      let value = match supplied {
        OverrideValue::Value(instance) => Some(instance.clone()),
        OverrideValue::Resolver(resolver) => {
          let context = ResolveContext {
            container: self.container,
            component: descriptor,
          };
          resolver.resolve(&context, parameter)?
        }
      };
      return settle(descriptor, parameter, value);
    }

    if let Some(element) = parameter.service().element() {
      let items = self.container.collect(element)?;
      if !items.is_empty() {
        return Ok(Resolved::Many(items));
      }
      return settle(descriptor, parameter, None);
    }

    let value = self
      .container
      .resolve_with_overrides(parameter.key(), parameter.service(), &[])?;
    settle(descriptor, parameter, value)
  }
}

/// Applies the fallbacks for a parameter the container or an override did
/// not fill.
fn settle(descriptor: &ComponentDescriptor, parameter: &Parameter, value: Option<Instance>) -> Result<Resolved> {
  match value.or_else(|| parameter.default_value().cloned()) {
    Some(instance) => Ok(Resolved::from_instance(instance, parameter)),
    None if parameter.is_required() => Err(Error::Resolution {
      component: descriptor.target().name().to_owned(),
      parameter: parameter.name().to_owned(),
      service: parameter.service().name().to_owned(),
    }),
    None => Ok(Resolved::Missing),
  }
}
