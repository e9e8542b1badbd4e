use fibre_di::{ComponentDescriptor, Container, Error};
use std::sync::Arc;

struct Mailer;

struct SignupService {
  mailer: Option<Arc<Mailer>>,
}

fn main() -> fibre_di::Result<()> {
  let container = Container::new();

  // A missing registration is not an error: it resolves to `None`.
  assert!(container.resolve::<Mailer>()?.is_none());
  println!("Mailer is not registered.");

  // Callers that cannot do without it ask for a required service instead.
  match container.resolve_required::<Mailer>() {
    Err(Error::NotRegistered { service }) => println!("Required service missing: {service}"),
    other => panic!("unexpected result: {:?}", other.map(|_| ())),
  }

  // Optional dependencies receive `None`; required ones fail activation.
  container.register(
    ComponentDescriptor::builder::<SignupService>()
      .factory(|mailer: Option<Arc<Mailer>>| Ok(SignupService { mailer }))
      .build(),
  )?;
  let signup = container.resolve_required::<SignupService>()?;
  println!("Signup service has a mailer: {}", signup.mailer.is_some());

  container.register(ComponentDescriptor::instance(Mailer))?;
  let signup = container.resolve_required::<SignupService>()?;
  println!("After registering one: {}", signup.mailer.is_some());
  Ok(())
}
