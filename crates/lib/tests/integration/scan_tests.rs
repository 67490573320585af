//! Dependency scanner against a scripted compiler.

use std::time::{Duration, Instant};

use stepcache_lib::node::{ResolveError, RootTag};
use stepcache_lib::scan::{CompileCommand, CompilerFamily, ScanError, ScannerConfig};
use stepcache_lib::step::ScanState;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::common::{Workspace, include_arg};

fn with_compiler(ws: &Workspace, compiler: CompilerFamily) -> ScannerConfig {
  ScannerConfig {
    compiler: Some(compiler),
    ..ws.scanner_config()
  }
}

#[tokio::test]
async fn records_tracked_includes_only() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/Game/a.cpp", "#include \"a.h\"");
  let header = ws.write(RootTag::Engine, "Code/Game/a.h", "#pragma once");
  let generated = ws.write(RootTag::Output, "Gen/a.gen.h", "#pragma once");
  let third_party = ws.write(RootTag::ThirdParty, "boost/config.hpp", "#pragma once");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/Game/a.cpp", "a.o");
  let command = ws.command(
    &step,
    &[
      include_arg(&header),
      include_arg(&third_party),
      include_arg("/usr/include/stdio.h"),
      include_arg(&generated),
      include_arg(&header),
    ],
  );

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  let expected = vec![
    session.resolver().resolve(RootTag::Engine, "Code/Game/a.h").unwrap(),
    session.resolver().resolve(RootTag::Output, "Gen/a.gen.h").unwrap(),
  ];
  assert_eq!(step.dependencies(), Some(expected));
  assert_eq!(report.dependencies, 2);
  assert_eq!(report.exit_code, 0);
  assert_eq!(step.state(), ScanState::Succeeded);
  assert!(ws.path(RootTag::Output, "a.o").is_file());
}

#[tokio::test]
async fn msvc_show_includes_on_stdout() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let header = ws.write(RootTag::Engine, "Code/b.h", "");

  let session = ws.session_with(ws.cache_config(), with_compiler(&ws, CompilerFamily::Msvc));
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.obj");
  let command = ws.command(&step, &[include_arg(&header), "--say=a.cpp".to_string()]);

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(report.dependencies, 1);
  assert_eq!(report.passthrough, vec!["a.cpp"]);
  assert_eq!(step.dependencies().unwrap()[0].rel_path(), "Code/b.h");
}

#[tokio::test]
async fn gcc_depfile_is_parsed() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let header = ws.write(RootTag::Engine, "Code/Shared/b.h", "");
  let third_party = ws.write(RootTag::ThirdParty, "zlib/zlib.h", "");

  let session = ws.session_with(ws.cache_config(), with_compiler(&ws, CompilerFamily::Gcc));
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(&step, &[include_arg(&header), include_arg(&third_party)]);

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  // The depfile lists the source itself first; inputs are never edges.
  assert_eq!(report.dependencies, 1);
  assert_eq!(step.dependencies().unwrap()[0].rel_path(), "Code/Shared/b.h");
}

#[tokio::test]
async fn relative_includes_resolve_against_working_directory() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  ws.write(RootTag::Engine, "Code/b.h", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  // The compiler runs in the output root, dev/BinTemp.
  let command = ws.command(&step, &[include_arg("../Code/b.h")]);

  session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  let deps = step.dependencies().unwrap();
  assert_eq!(deps.len(), 1);
  assert_eq!(deps[0].root(), RootTag::Engine);
  assert_eq!(deps[0].rel_path(), "Code/b.h");
}

#[tokio::test]
async fn missing_include_fails_the_step() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let missing = ws.path(RootTag::Engine, "Code/gone.h");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(&step, &[include_arg(&missing)]);

  let err = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(
    err,
    ScanError::Resolve {
      source: ResolveError::NotFound { .. },
      ..
    }
  ));
  assert_eq!(step.state(), ScanState::Failed);
  assert!(!step.has_known_dependencies());
}

#[tokio::test]
async fn failed_compile_keeps_previous_edges() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let header = ws.write(RootTag::Engine, "Code/b.h", "");
  let other = ws.write(RootTag::Engine, "Code/c.h", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let cancel = CancellationToken::new();

  let first = ws.command(&step, &[include_arg(&header)]);
  session.scanner().scan_and_compile(&step, &first, &cancel).await.unwrap();
  let before = step.dependencies();

  let failing = ws.command(
    &step,
    &[
      include_arg(&other),
      "--say=a.cpp(3): error C2065: 'x': undeclared identifier".to_string(),
      "--exit=2".to_string(),
    ],
  );
  let err = session.scanner().scan_and_compile(&step, &failing, &cancel).await.unwrap_err();

  let ScanError::CompileFailed(failure) = err else {
    panic!("expected compile failure, got {err:?}");
  };
  assert_eq!(failure.exit_code, Some(2));
  assert_eq!(failure.module, "CryCommon");
  assert_eq!(failure.configuration, "profile");
  assert!(failure.output.contains("error C2065"));
  assert!(failure.command_line.contains("--exit=2"));
  assert!(failure.to_string().contains("failed with exit code 2"));

  assert_eq!(step.dependencies(), before);
  assert_eq!(step.state(), ScanState::Failed);
}

#[tokio::test]
#[traced_test]
async fn diagnostics_are_passed_to_the_log() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let header = ws.write(RootTag::Engine, "Code/b.h", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(
    &step,
    &[include_arg(&header), "--say=warning: unused variable 'x'".to_string()],
  );

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(report.passthrough, vec!["warning: unused variable 'x'"]);
  assert!(logs_contain("warning: unused variable 'x'"));
}

#[tokio::test]
async fn stdout_diagnostics_come_before_stderr() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(
    &step,
    &["--warn=a.cpp:1: warning: first".to_string(), "--say=a.cpp".to_string()],
  );

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(report.passthrough, vec!["a.cpp", "a.cpp:1: warning: first"]);
}

#[tokio::test]
async fn long_command_lines_use_a_response_file() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");
  let header = ws.write(RootTag::Engine, "Code/b.h", "");

  let scanner = ScannerConfig {
    max_command_len: 16,
    ..ws.scanner_config()
  };
  let session = ws.session_with(ws.cache_config(), scanner);
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(&step, &[include_arg(&header), "--report-rsp".to_string()]);

  let report = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap();

  let rsp = report
    .passthrough
    .iter()
    .find_map(|line| line.strip_prefix("rsp:"))
    .unwrap();
  assert_ne!(rsp, "none");
  assert!(rsp.ends_with(".rsp"));
  assert!(!std::path::Path::new(rsp).exists());
  assert_eq!(report.dependencies, 1);
}

#[tokio::test]
async fn cancellation_stops_the_compile() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(&step, &["--sleep=10".to_string()]);
  let cancel = CancellationToken::new();

  let trigger = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(200)).await;
    trigger.cancel();
  });

  let started = Instant::now();
  let err = session.scanner().scan_and_compile(&step, &command, &cancel).await.unwrap_err();

  assert!(matches!(err, ScanError::Cancelled { .. }));
  assert!(started.elapsed() < Duration::from_secs(5));
  assert_eq!(step.state(), ScanState::Failed);
  assert!(!step.has_known_dependencies());
}

#[tokio::test]
async fn cancelled_before_start_never_runs() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = ws.command(&step, &[]);
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = session.scanner().scan_and_compile(&step, &command, &cancel).await.unwrap_err();

  assert!(matches!(err, ScanError::Cancelled { .. }));
  assert!(!ws.path(RootTag::Output, "a.o").exists());
}

#[tokio::test]
async fn unknown_compiler_is_rejected() {
  let ws = Workspace::new();
  ws.write(RootTag::Engine, "Code/a.cpp", "");

  let session = ws.session();
  let step = ws.cxx_step(&session, "Code/a.cpp", "a.o");
  let command = CompileCommand::new("/usr/bin/nvcc", ["-c"]);

  let err = session
    .scanner()
    .scan_and_compile(&step, &command, &CancellationToken::new())
    .await
    .unwrap_err();

  assert!(matches!(err, ScanError::UnsupportedCompiler { .. }));
  assert_eq!(step.state(), ScanState::NotRun);
}
