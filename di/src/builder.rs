//! A builder for configuring and creating a root `Container`.

use crate::container::Container;
use crate::descriptor::ComponentDescriptor;
use crate::error::BuildError;

/// Resolution limits shared by every node of one container tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerOptions {
  /// Fail with `Error::Cycle` when a component is re-entered while it is
  /// being activated on the same thread.
  pub detect_cycles: bool,
  /// The deepest activation chain a single resolution may build.
  pub max_depth: usize,
}

impl Default for ContainerOptions {
  fn default() -> Self {
    Self {
      detect_cycles: true,
      max_depth: 128,
    }
  }
}

/// A builder for creating a root [`Container`] with custom options and an
/// initial set of registrations.
///
/// ```
/// use fibre_di::{ComponentDescriptor, Container};
///
/// #[derive(Default)]
/// struct Clock;
///
/// let container = Container::builder()
///   .max_depth(32)
///   .register(ComponentDescriptor::builder::<Clock>().default_constructor().build().singleton())
///   .build()
///   .unwrap();
///
/// assert!(container.is_registered_type::<Clock>(None));
/// assert_eq!(container.options().max_depth, 32);
/// ```
#[derive(Debug, Default)]
pub struct ContainerBuilder {
  options: ContainerOptions,
  descriptors: Vec<ComponentDescriptor>,
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Enables or disables cycle detection. Defaults to `true`.
  ///
  /// With detection disabled a cyclic graph still fails, with
  /// `Error::DepthExceeded`, once the depth limit is reached.
  pub fn detect_cycles(mut self, enabled: bool) -> Self {
    self.options.detect_cycles = enabled;
    self
  }

  /// Sets the maximum activation depth. Defaults to 128.
  pub fn max_depth(mut self, depth: usize) -> Self {
    self.options.max_depth = depth;
    self
  }

  pub fn register(mut self, descriptor: ComponentDescriptor) -> Self {
    self.descriptors.push(descriptor);
    self
  }

  pub fn register_all(mut self, descriptors: impl IntoIterator<Item = ComponentDescriptor>) -> Self {
    self.descriptors.extend(descriptors);
    self
  }

  /// Builds the root container.
  ///
  /// # Errors
  ///
  /// Returns `BuildError::ZeroDepth` if the depth limit was set to zero.
  pub fn build(self) -> Result<Container, BuildError> {
    if self.options.max_depth == 0 {
      return Err(BuildError::ZeroDepth);
    }
    let container = Container::with_options(self.options);
    container.registry().add_all(self.descriptors);
    Ok(container)
  }
}
