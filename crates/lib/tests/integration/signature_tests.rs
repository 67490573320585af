//! Step keys across checkouts at different locations.

use std::fs;
use std::sync::Arc;

use stepcache_lib::cache::{RetrieveOutcome, StoreOutcome};
use stepcache_lib::execute::BuildSession;
use stepcache_lib::node::RootTag;
use stepcache_lib::step::{BuildEnv, BuildStep};

use crate::common::Workspace;

fn seed(ws: &Workspace) {
  ws.write(RootTag::Engine, "Code/Game/Actor.cpp", "#include \"Actor.h\"\n");
  ws.write(RootTag::Engine, "Code/Game/Actor.h", "struct Actor {};\n");
  ws.write(RootTag::Output, "Gen/Version.h", "#define BUILD 42\n");
}

fn step(ws: &Workspace, session: &BuildSession) -> BuildStep {
  let step = ws.cxx_step(session, "Code/Game/Actor.cpp", "Actor.o");
  step.set_dependencies(vec![
    session.resolver().resolve(RootTag::Engine, "Code/Game/Actor.h").unwrap(),
    session.resolver().resolve(RootTag::Output, "Gen/Version.h").unwrap(),
  ]);
  step
}

#[test]
fn keys_do_not_depend_on_checkout_location() {
  let a = Workspace::new();
  let b = Workspace::new();
  assert_ne!(a.roots.engine, b.roots.engine);
  seed(&a);
  seed(&b);

  let (session_a, session_b) = (a.session(), b.session());
  let (step_a, step_b) = (step(&a, &session_a), step(&b, &session_b));

  assert_eq!(session_a.calculator().uid(&step_a), session_b.calculator().uid(&step_b));
  assert_eq!(
    session_a.calculator().sig(&step_a).unwrap(),
    session_b.calculator().sig(&step_b).unwrap()
  );
}

#[test]
fn flags_change_sig_but_not_uid() {
  let ws = Workspace::new();
  seed(&ws);
  let session = ws.session();
  let base = step(&ws, &session);

  let env = BuildEnv::new([("CXXFLAGS", vec!["-O0".to_string()])]);
  let debug = BuildStep::builder("Code/Game/Actor.cpp", "cxx")
    .input(session.resolver().resolve(RootTag::Engine, "Code/Game/Actor.cpp").unwrap())
    .output(session.resolver().declare(RootTag::Output, "Actor.o").unwrap())
    .env(Arc::new(env))
    .env_vars(["CXXFLAGS", "DEFINES", "INCLUDES"])
    .build();
  debug.set_dependencies(base.dependencies().unwrap());

  let calc = session.calculator();
  assert_eq!(calc.uid(&base), calc.uid(&debug));
  assert_ne!(calc.sig(&base).unwrap(), calc.sig(&debug).unwrap());
}

#[test]
fn entry_published_by_one_checkout_serves_another() {
  let a = Workspace::new();
  let b = Workspace::sharing(&a.cache_root);
  seed(&a);
  seed(&b);

  let session_a = a.session();
  let step_a = step(&a, &session_a);
  fs::write(a.path(RootTag::Output, "Actor.o"), b"actor object").unwrap();
  assert!(matches!(session_a.store().store(&step_a), StoreOutcome::Stored));

  let session_b = b.session();
  let step_b = step(&b, &session_b);
  assert_eq!(session_b.store().retrieve(&step_b), RetrieveOutcome::Retrieved);
  assert_eq!(fs::read(b.path(RootTag::Output, "Actor.o")).unwrap(), b"actor object");
}
