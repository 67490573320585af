//! Artifact store publication and retrieval.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use stepcache_lib::cache::{RetrieveOutcome, SkipReason, StoreOutcome, list_entries};
use stepcache_lib::config::CacheConfig;
use stepcache_lib::execute::BuildSession;
use stepcache_lib::node::RootTag;
use stepcache_lib::platform::fs::{FsOps, NativeFs};
use stepcache_lib::step::BuildStep;
use stepcache_lib::util::hash::hash_bytes;

use crate::common::Workspace;

const OBJECT: &[u8] = b"\x7fELF\x02\x01\x01\x00object\x00\xff\xfe";

fn seed(ws: &Workspace) {
  ws.write(RootTag::Engine, "Code/a.cpp", "#include \"a.h\"\nint a() { return A; }\n");
  ws.write(RootTag::Engine, "Code/a.h", "#define A 1\n");
}

/// A step whose compile already ran: edges known, object on disk.
fn compiled_step(ws: &Workspace, session: &BuildSession) -> BuildStep {
  let step = ws.cxx_step(session, "Code/a.cpp", "a.o");
  step.set_dependencies(vec![session.resolver().resolve(RootTag::Engine, "Code/a.h").unwrap()]);
  fs::write(ws.path(RootTag::Output, "a.o"), OBJECT).unwrap();
  step
}

/// The same step in a later build, before it has been produced.
fn fresh_step(ws: &Workspace, session: &BuildSession) -> BuildStep {
  let step = ws.cxx_step(session, "Code/a.cpp", "a.o");
  step.set_dependencies(vec![session.resolver().resolve(RootTag::Engine, "Code/a.h").unwrap()]);
  step
}

fn entry_dir(session: &BuildSession, step: &BuildStep) -> PathBuf {
  let identity = session.calculator().identity(step).unwrap();
  session.store().entry_dir(&identity).unwrap()
}

/// Rewrites the cache file after copying it out, as a concurrent publisher
/// replacing the entry would.
struct RacingFs {
  cache_root: PathBuf,
}

impl FsOps for RacingFs {
  fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
    let copied = NativeFs.copy_file(from, to)?;
    if from.starts_with(&self.cache_root) {
      fs::write(from, b"replaced")?;
      let later = SystemTime::now() + Duration::from_secs(60);
      filetime::set_file_mtime(from, FileTime::from_system_time(later))?;
    }
    Ok(copied)
  }

  fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    NativeFs.atomic_rename(from, to)
  }

  fn set_permissive(&self, path: &Path) -> io::Result<()> {
    NativeFs.set_permissive(path)
  }
}

/// Refuses to create entry directories, as a read-only cache share would.
struct ReadOnlyCacheFs;

impl FsOps for ReadOnlyCacheFs {
  fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
    NativeFs.copy_file(from, to)
  }

  fn atomic_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    NativeFs.atomic_rename(from, to)
  }

  fn set_permissive(&self, path: &Path) -> io::Result<()> {
    NativeFs.set_permissive(path)
  }

  fn create_dir(&self, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only share"))
  }
}

#[test]
fn round_trip_restores_identical_bytes() {
  let ws = Workspace::new();
  seed(&ws);

  let first = ws.session();
  let step = compiled_step(&ws, &first);
  assert!(matches!(first.store().store(&step), StoreOutcome::Stored));
  assert_eq!(first.metrics().stored, 1);
  fs::remove_file(ws.path(RootTag::Output, "a.o")).unwrap();

  let second = ws.session();
  let step = fresh_step(&ws, &second);
  assert_eq!(second.store().retrieve(&step), RetrieveOutcome::Retrieved);

  assert_eq!(fs::read(ws.path(RootTag::Output, "a.o")).unwrap(), OBJECT);
  let sig = second.calculator().sig(&step).unwrap();
  assert_eq!(step.outputs()[0].signature(), Some(sig));

  let summary = second.metrics();
  assert_eq!(summary.processed, 1);
  assert_eq!(summary.hits(), 1);
  assert_eq!(summary.missed, 0);
}

#[test]
fn changed_dependency_misses() {
  let ws = Workspace::new();
  seed(&ws);

  let first = ws.session();
  let step = compiled_step(&ws, &first);
  first.store().store(&step);

  ws.write(RootTag::Engine, "Code/a.h", "#define A 2\n");
  let second = ws.session();
  let step = fresh_step(&ws, &second);
  assert_eq!(second.store().retrieve(&step), RetrieveOutcome::Miss);
  assert_eq!(second.metrics().missed, 1);
}

#[test]
fn entry_replaced_during_copy_is_not_trusted() {
  let ws = Workspace::new();
  seed(&ws);

  let first = ws.session();
  let step = compiled_step(&ws, &first);
  first.store().store(&step);

  let racing = RacingFs {
    cache_root: ws.cache_root.clone(),
  };
  let second = ws.session().with_fs(Arc::new(racing));
  let step = fresh_step(&ws, &second);

  assert!(!second.store().try_retrieve(&step));
  assert_eq!(second.metrics().failed_retrieval, 1);
  assert_eq!(second.metrics().hits(), 0);
  assert_eq!(step.outputs()[0].signature(), None);
}

#[test]
fn raced_retrieval_drops_existing_output_signature() {
  let ws = Workspace::new();
  seed(&ws);

  let first = ws.session();
  let step = compiled_step(&ws, &first);
  first.store().store(&step);

  let racing = RacingFs {
    cache_root: ws.cache_root.clone(),
  };
  let second = ws.session().with_fs(Arc::new(racing));
  let step = fresh_step(&ws, &second);
  let output = ws.path(RootTag::Output, "a.o");
  fs::write(&output, b"old local object").unwrap();
  step.outputs()[0].set_signature(Some(hash_bytes(b"old local object")));

  assert_eq!(second.store().retrieve(&step), RetrieveOutcome::Raced);
  assert_eq!(fs::read(&output).unwrap(), OBJECT);
  assert_eq!(step.outputs()[0].signature(), None);
}

#[test]
fn unwritable_cache_stores_nothing() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session().with_fs(Arc::new(ReadOnlyCacheFs));
  let step = compiled_step(&ws, &session);

  assert!(matches!(session.store().store(&step), StoreOutcome::Failed(_)));
  assert!(!entry_dir(&session, &step).exists());
  assert_eq!(session.metrics().stored, 0);
}

#[test]
fn incomplete_entry_copies_nothing() {
  let ws = Workspace::new();
  seed(&ws);

  let first = ws.session();
  let step = BuildStep::builder("Code/a.cpp", "cxx")
    .input(first.resolver().resolve(RootTag::Engine, "Code/a.cpp").unwrap())
    .output(first.resolver().declare(RootTag::Output, "a.o").unwrap())
    .output(first.resolver().declare(RootTag::Output, "a.pdb").unwrap())
    .build();
  step.set_dependencies(Vec::new());
  ws.write(RootTag::Output, "a.o", "object");
  ws.write(RootTag::Output, "a.pdb", "symbols");
  assert!(matches!(first.store().store(&step), StoreOutcome::Stored));

  let dir = entry_dir(&first, &step);
  fs::remove_file(dir.join("a.pdb")).unwrap();
  fs::remove_file(ws.path(RootTag::Output, "a.o")).unwrap();
  fs::remove_file(ws.path(RootTag::Output, "a.pdb")).unwrap();

  assert_eq!(first.store().retrieve(&step), RetrieveOutcome::Miss);
  assert!(!ws.path(RootTag::Output, "a.o").exists());
}

#[test]
fn existing_entry_is_left_alone() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  let step = compiled_step(&ws, &session);
  assert!(matches!(session.store().store(&step), StoreOutcome::Stored));
  assert!(matches!(
    session.store().store(&step),
    StoreOutcome::Skipped(SkipReason::Exists)
  ));
  assert_eq!(session.metrics().stored, 1);
}

#[test]
fn entry_being_written_elsewhere_is_skipped() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  let step = compiled_step(&ws, &session);
  let dir = entry_dir(&session, &step);
  let tmp = PathBuf::from(format!("{}.tmp", dir.display()));
  fs::create_dir_all(&tmp).unwrap();

  assert!(matches!(
    session.store().store(&step),
    StoreOutcome::Skipped(SkipReason::Exists)
  ));
  assert!(!dir.exists());
}

#[test]
fn disabled_directions_do_nothing() {
  let ws = Workspace::new();
  seed(&ws);

  let config = CacheConfig {
    restore: false,
    upload: false,
    ..ws.cache_config()
  };
  let session = ws.session_with(config, ws.scanner_config());
  let step = compiled_step(&ws, &session);

  assert!(matches!(
    session.store().store(&step),
    StoreOutcome::Skipped(SkipReason::Disabled)
  ));
  assert_eq!(session.store().retrieve(&step), RetrieveOutcome::Disabled);
  assert!(!ws.cache_root.exists());
  assert_eq!(session.metrics().processed, 0);
}

#[test]
fn unknown_dependencies_are_ineligible() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  ws.write(RootTag::Output, "a.o", "object");

  assert!(matches!(
    session.store().store(&step),
    StoreOutcome::Skipped(SkipReason::Ineligible)
  ));
  assert_eq!(session.store().retrieve(&step), RetrieveOutcome::Ineligible);
  let summary = session.metrics();
  assert_eq!(summary.processed, 1);
  assert_eq!(summary.missed, 1);
}

#[test]
fn outputs_sharing_a_name_are_not_cached() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  let step = BuildStep::builder("Code/a.cpp", "cxx")
    .input(session.resolver().resolve(RootTag::Engine, "Code/a.cpp").unwrap())
    .output(session.resolver().declare(RootTag::Output, "x64/a.o").unwrap())
    .output(session.resolver().declare(RootTag::Output, "arm64/a.o").unwrap())
    .build();
  step.set_dependencies(Vec::new());

  assert!(matches!(
    session.store().store(&step),
    StoreOutcome::Skipped(SkipReason::DuplicateOutputName)
  ));
}

#[test]
fn retrieval_marks_entry_as_used() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  let step = compiled_step(&ws, &session);
  session.store().store(&step);

  let dir = entry_dir(&session, &step);
  let old = FileTime::from_unix_time(1_000_000_000, 0);
  filetime::set_file_mtime(&dir, old).unwrap();

  assert!(session.store().try_retrieve(&step));
  let touched = FileTime::from_last_modification_time(&fs::metadata(&dir).unwrap());
  assert!(touched > old);
}

#[test]
fn failed_store_leaves_no_entry() {
  let ws = Workspace::new();
  seed(&ws);

  let session = ws.session();
  // The object was never produced.
  let step = fresh_step(&ws, &session);

  assert!(matches!(session.store().store(&step), StoreOutcome::Failed(_)));
  assert!(list_entries(&ws.cache_root).unwrap().is_empty());
  let leftovers: Vec<_> = fs::read_dir(&ws.cache_root).unwrap().collect();
  assert!(leftovers.is_empty());
  assert_eq!(session.metrics().stored, 0);
}

#[test]
fn list_entries_skips_temporary_directories() {
  let ws = Workspace::new();
  seed(&ws);
  assert!(list_entries(&ws.cache_root).unwrap().is_empty());

  let session = ws.session();
  let step = compiled_step(&ws, &session);
  session.store().store(&step);
  fs::create_dir_all(ws.cache_root.join("deadbeef.tmp")).unwrap();

  let entries = list_entries(&ws.cache_root).unwrap();
  assert_eq!(entries.len(), 1);
  assert_eq!(entries[0].ssig, session.calculator().identity(&step).unwrap().ssig());
  assert_eq!(entries[0].files, 1);
  assert_eq!(entries[0].size, OBJECT.len() as u64);
  assert_eq!(entries[0].age_days(SystemTime::now()), 0);
}
