//! Injection points and per-parameter overrides.

use crate::activation::{ParameterResolver, ResolveContext};
use crate::core::Instance;
use crate::error::{Error, Result};
use crate::types::TypeTag;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// One injection point: a constructor or method parameter, a property or a
/// field.
#[derive(Clone)]
pub struct Parameter {
  name: Cow<'static, str>,
  service: TypeTag,
  key: Option<Arc<str>>,
  required: bool,
  default: Option<Instance>,
}

impl Parameter {
  /// A parameter that fails activation when it cannot be resolved.
  pub fn required(name: impl Into<Cow<'static, str>>, service: TypeTag) -> Self {
    Self {
      name: name.into(),
      service,
      key: None,
      required: true,
      default: None,
    }
  }

  /// A parameter that resolves to nothing when it is not registered.
  pub fn optional(name: impl Into<Cow<'static, str>>, service: TypeTag) -> Self {
    Self {
      required: false,
      ..Self::required(name, service)
    }
  }

  /// A parameter receiving every registration of `element`.
  pub fn collection(name: impl Into<Cow<'static, str>>, element: TypeTag) -> Self {
    Self::optional(name, TypeTag::collection_of(element))
  }

  pub fn with_key(mut self, key: impl AsRef<str>) -> Self {
    self.key = Some(Arc::from(key.as_ref()));
    self
  }

  /// Retargets the parameter at another service tag, typically a closed
  /// generic. Collection parameters keep their shape and retarget their
  /// element.
  pub fn with_service(mut self, service: TypeTag) -> Self {
    self.service = if self.is_collection() {
      TypeTag::collection_of(service)
    } else {
      service
    };
    self
  }

  pub fn with_default(mut self, value: Instance) -> Self {
    self.default = Some(value);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn service(&self) -> &TypeTag {
    &self.service
  }

  pub fn key(&self) -> Option<&str> {
    self.key.as_deref()
  }

  pub fn is_required(&self) -> bool {
    self.required
  }

  pub fn is_collection(&self) -> bool {
    self.service.is_collection()
  }

  pub fn default_value(&self) -> Option<&Instance> {
    self.default.as_ref()
  }

  fn rename(&mut self, name: Cow<'static, str>) {
    self.name = name;
  }
}

impl fmt::Debug for Parameter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Parameter")
      .field("name", &self.name)
      .field("service", &self.service)
      .field("key", &self.key)
      .field("required", &self.required)
      .field("has_default", &self.default.is_some())
      .finish()
  }
}

/// The ordered parameter list of a constructor or an injection method.
///
/// Naming mistakes (keying a parameter that does not exist) are recorded and
/// reported as configuration errors at first activation.
#[derive(Clone, Debug, Default)]
pub(crate) struct Signature {
  pub(crate) parameters: Vec<Parameter>,
  problems: Vec<String>,
}

impl Signature {
  pub(crate) fn new(parameters: Vec<Parameter>) -> Self {
    Self {
      parameters,
      problems: Vec::new(),
    }
  }

  pub(crate) fn rename<I, N>(&mut self, names: I)
  where
    I: IntoIterator<Item = N>,
    N: Into<Cow<'static, str>>,
  {
    let count = self.parameters.len();
    for (index, name) in names.into_iter().enumerate() {
      match self.parameters.get_mut(index) {
        Some(parameter) => parameter.rename(name.into()),
        None => self.problems.push(format!(
          "name '{}' given for parameter {index}, but only {count} parameters exist",
          name.into()
        )),
      }
    }
  }

  pub(crate) fn update(&mut self, name: &str, update: impl FnOnce(Parameter) -> Parameter) {
    match self.parameters.iter().position(|parameter| parameter.name() == name) {
      Some(index) => {
        let parameter = self.parameters[index].clone();
        self.parameters[index] = update(parameter);
      }
      None => self.problems.push(format!("no parameter named '{name}'")),
    }
  }

  pub(crate) fn validate(&self, component: &str) -> Result<()> {
    match self.problems.first() {
      Some(problem) => Err(Error::configuration(component, problem.clone())),
      None => Ok(()),
    }
  }
}

/// Selects the injection point an override applies to.
///
/// Positions only address constructor parameters; names and types address
/// every injection point of the component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverrideTarget {
  Position(usize),
  Name(Cow<'static, str>),
  Typed(TypeTag),
  TypedNamed(TypeTag, Cow<'static, str>),
}

impl OverrideTarget {
  pub fn position(index: usize) -> Self {
    OverrideTarget::Position(index)
  }

  pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
    OverrideTarget::Name(name.into())
  }

  pub fn typed<S: ?Sized + 'static>() -> Self {
    OverrideTarget::Typed(TypeTag::of::<S>())
  }

  /// Matches by `(type, name)` so two parameters of the same type can be
  /// told apart.
  pub fn typed_named<S: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
    OverrideTarget::TypedNamed(TypeTag::of::<S>(), name.into())
  }

  pub(crate) fn matches(&self, parameter: &Parameter, position: Option<usize>) -> bool {
    match self {
      OverrideTarget::Position(index) => position == Some(*index),
      OverrideTarget::Name(name) => parameter.name() == name,
      OverrideTarget::Typed(service) => parameter.service() == service,
      OverrideTarget::TypedNamed(service, name) => {
        parameter.service() == service && parameter.name() == name
      }
    }
  }
}

/// What an override supplies.
#[derive(Clone)]
pub enum OverrideValue {
  /// A fixed value.
  Value(Instance),
  /// A custom resolver consulted instead of the registry.
  Resolver(Arc<dyn ParameterResolver>),
}

impl fmt::Debug for OverrideValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OverrideValue::Value(instance) => write!(f, "Value({})", instance.target()),
      OverrideValue::Resolver(_) => f.write_str("Resolver(..)"),
    }
  }
}

/// An explicit value provider bound to one injection point. A matched
/// override bypasses the registry entirely.
///
/// ```
/// use fibre_di::{OverrideTarget, ParameterOverride};
/// use std::sync::Arc;
///
/// let address = ParameterOverride::value(OverrideTarget::name("address"), Arc::new("10.0.0.7:5432".to_string()));
/// assert_eq!(address.target(), &OverrideTarget::name("address"));
/// ```
#[derive(Clone, Debug)]
pub struct ParameterOverride {
  target: OverrideTarget,
  value: OverrideValue,
}

impl ParameterOverride {
  pub fn new(target: OverrideTarget, value: OverrideValue) -> Self {
    Self { target, value }
  }

  /// Supplies a fixed value of service type `S`.
  pub fn value<S: ?Sized + Send + Sync + 'static>(target: OverrideTarget, value: Arc<S>) -> Self {
    Self::new(target, OverrideValue::Value(Instance::new(value)))
  }

  pub fn instance(target: OverrideTarget, instance: Instance) -> Self {
    Self::new(target, OverrideValue::Value(instance))
  }

  /// Supplies the value through a closure. For a resolver type of your own,
  /// build the override from `OverrideValue::Resolver`.
  pub fn resolver<F>(target: OverrideTarget, resolver: F) -> Self
  where
    F: Fn(&ResolveContext<'_>, &Parameter) -> Result<Option<Instance>> + Send + Sync + 'static,
  {
    Self::new(target, OverrideValue::Resolver(Arc::new(resolver)))
  }

  pub fn target(&self) -> &OverrideTarget {
    &self.target
  }

  pub(crate) fn supplied(&self) -> &OverrideValue {
    &self.value
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Address;

  #[test]
  fn targets_match_by_position_name_and_type() {
    let parameter = Parameter::required("primary", TypeTag::of::<Address>());

    assert!(OverrideTarget::position(1).matches(&parameter, Some(1)));
    assert!(!OverrideTarget::position(1).matches(&parameter, None));
    assert!(OverrideTarget::name("primary").matches(&parameter, None));
    assert!(OverrideTarget::typed::<Address>().matches(&parameter, None));
    assert!(OverrideTarget::typed_named::<Address>("primary").matches(&parameter, Some(0)));
    assert!(!OverrideTarget::typed_named::<Address>("replica").matches(&parameter, Some(0)));
    assert!(!OverrideTarget::typed::<String>().matches(&parameter, None));
  }

  #[test]
  fn retargeting_keeps_the_collection_shape() {
    let single = Parameter::required("port", TypeTag::of::<Address>()).with_service(TypeTag::of::<u16>());
    let many = Parameter::collection("ports", TypeTag::of::<Address>()).with_service(TypeTag::of::<u16>());

    assert_eq!(single.service(), &TypeTag::of::<u16>());
    assert_eq!(many.service(), &TypeTag::collection::<u16>());
    assert!(many.is_collection());
  }

  #[test]
  fn signature_records_unknown_names() {
    let mut signature = Signature::new(vec![Parameter::required("arg0", TypeTag::of::<Address>())]);
    signature.rename(["address", "port"]);
    signature.update("missing", |parameter| parameter.with_key("x"));

    assert_eq!(signature.parameters[0].name(), "address");
    let err = signature.validate("Pool").unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
  }

  #[test]
  fn collection_parameters_are_optional() {
    let parameter = Parameter::collection("plugins", TypeTag::of::<Address>());
    assert!(parameter.is_collection());
    assert!(!parameter.is_required());
    assert_eq!(parameter.service().element(), Some(&TypeTag::of::<Address>()));
  }
}
