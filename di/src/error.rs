//! Error types for the dependency-injection runtime.

use thiserror::Error;

/// The main error type for `fibre_di` operations.
///
/// "Not registered" is normally reported as `Ok(None)` by the `resolve*`
/// family. `Error::NotRegistered` only appears where the caller explicitly
/// asked for a required service (see `Container::resolve_required`).
#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("Service not registered: {service}")]
  NotRegistered { service: String },

  #[error("Unable to resolve parameter '{parameter}' ({service}) of {component}")]
  Resolution {
    component: String,
    parameter: String,
    service: String,
  },

  #[error("Invalid component configuration for {component}: {reason}")]
  Configuration { component: String, reason: String },

  #[error("Circular dependency detected: {chain}")]
  Cycle { chain: String },

  #[error("Resolution depth limit of {limit} exceeded while activating {component}")]
  DepthExceeded { component: String, limit: usize },

  #[error("Resolved value for {service} is not a {expected}")]
  TypeMismatch { service: String, expected: String },

  #[error("Container has been destroyed")]
  Destroyed,

  #[error("Activation of {component} failed: {reason}")]
  Activation { component: String, reason: String },
}

impl Error {
  /// Builds an activation failure. Intended for user factories that need to
  /// abort construction of a component.
  pub fn activation(component: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::Activation {
      component: component.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn configuration(component: impl Into<String>, reason: impl Into<String>) -> Self {
    Error::Configuration {
      component: component.into(),
      reason: reason.into(),
    }
  }

  pub(crate) fn mismatch(service: impl Into<String>, expected: impl Into<String>) -> Self {
    Error::TypeMismatch {
      service: service.into(),
      expected: expected.into(),
    }
  }
}

/// Errors that can occur when building a container.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The maximum resolution depth was set to zero, which would reject every
  /// resolution.
  #[error("maximum resolution depth cannot be zero")]
  ZeroDepth,
}

/// A specialized `Result` type for `fibre_di` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
