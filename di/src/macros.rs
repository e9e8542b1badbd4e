//! Public macros for ergonomic service resolution.

/// Resolves a service from the global container.
///
/// Panics if the service is not registered or its activation fails. For a
/// non-panicking version, use `global().resolve::<T>()` directly.
///
/// # Examples
///
/// ```
/// use fibre_di::{global, resolve, ComponentDescriptor};
///
/// global().register(ComponentDescriptor::instance(String::from("hello"))).unwrap();
///
/// let message = resolve!(String);
/// assert_eq!(*message, "hello");
/// ```
///
/// ```
/// use fibre_di::{global, resolve, ComponentDescriptor};
///
/// trait Greeter: Send + Sync {
///   fn greet(&self) -> String;
/// }
///
/// #[derive(Default)]
/// struct EnglishGreeter;
///
/// impl Greeter for EnglishGreeter {
///   fn greet(&self) -> String {
///     "Hello!".to_string()
///   }
/// }
///
/// global()
///   .register(
///     ComponentDescriptor::builder::<EnglishGreeter>()
///       .default_constructor()
///       .build_as::<dyn Greeter>(|greeter| greeter)
///       .with_key("english")
///       .singleton(),
///   )
///   .unwrap();
///
/// let greeter = resolve!(trait Greeter, "english");
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
  // resolve!(MyService)
  ($type:ty) => {
    match $crate::global().resolve::<$type>() {
      Ok(Some(service)) => service,
      Ok(None) => panic!(
        "Failed to resolve required service: {}",
        std::any::type_name::<$type>()
      ),
      Err(err) => panic!(
        "Failed to resolve required service {}: {}",
        std::any::type_name::<$type>(),
        err
      ),
    }
  };

  // resolve!(MyService, "key")
  ($type:ty, $key:expr) => {
    match $crate::global().resolve_keyed::<$type>($key) {
      Ok(Some(service)) => service,
      Ok(None) => panic!(
        "Failed to resolve required service with key '{}': {}",
        $key,
        std::any::type_name::<$type>()
      ),
      Err(err) => panic!(
        "Failed to resolve required service with key '{}': {}: {}",
        $key,
        std::any::type_name::<$type>(),
        err
      ),
    }
  };

  // resolve!(trait MyTrait). The trait is captured as an ident so the
  // expansion can build `dyn Trait` itself.
  (trait $trait_ident:ident) => {
    match $crate::global().resolve::<dyn $trait_ident>() {
      Ok(Some(service)) => service,
      Ok(None) => panic!(
        "Failed to resolve required trait service: {}",
        std::any::type_name::<dyn $trait_ident>()
      ),
      Err(err) => panic!(
        "Failed to resolve required trait service {}: {}",
        std::any::type_name::<dyn $trait_ident>(),
        err
      ),
    }
  };

  // resolve!(trait MyTrait, "key")
  (trait $trait_ident:ident, $key:expr) => {
    match $crate::global().resolve_keyed::<dyn $trait_ident>($key) {
      Ok(Some(service)) => service,
      Ok(None) => panic!(
        "Failed to resolve required trait service with key '{}': {}",
        $key,
        std::any::type_name::<dyn $trait_ident>()
      ),
      Err(err) => panic!(
        "Failed to resolve required trait service with key '{}': {}: {}",
        $key,
        std::any::type_name::<dyn $trait_ident>(),
        err
      ),
    }
  };
}
