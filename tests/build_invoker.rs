#![cfg(unix)]

mod common;
use crate::common::{TestResult, init_tracing, with_timeout, write_script};

use hotloop::build::{BuildBackend, CommandBuilder};
use hotloop::errors::HotloopError;

#[tokio::test]
async fn successful_build_captures_stdout_then_stderr() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "build.sh", "echo compiled\necho 'a warning' >&2");

    let mut builder = CommandBuilder::new(script.display().to_string());
    let result = with_timeout(builder.build()).await;

    assert!(result.success);
    assert!(result.failure.is_none());
    assert_eq!(result.output, "compiled\na warning\n");
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_a_build_failure_with_output() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(
        dir.path(),
        "broken.sh",
        "echo './main.go:3:1: syntax error' >&2\nexit 2",
    );

    let mut builder = CommandBuilder::new(script.display().to_string());
    let result = with_timeout(builder.build()).await;

    assert!(!result.success);
    assert!(result.output.contains("syntax error"));
    match result.failure {
        Some(HotloopError::BuildFailed { command, status }) => {
            assert_eq!(command, script.display().to_string());
            assert!(status.contains('2'), "status was {status}");
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn arguments_are_passed_through() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "args.sh", "echo \"$#:$1:$2\"");

    let mut builder = CommandBuilder::new(format!("{} one   two", script.display()));
    let result = with_timeout(builder.build()).await;

    assert!(result.success);
    assert_eq!(result.output.trim(), "2:one:two");
    Ok(())
}

#[tokio::test]
async fn output_directory_is_created_before_building() -> TestResult {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("temp").join("hotloop-app");
    // Fails unless the parent of -o already exists when it runs.
    let script = write_script(dir.path(), "gobuild.sh", "touch \"$2\"");

    let mut builder = CommandBuilder::new(format!("{} -o {}", script.display(), out.display()));
    let result = with_timeout(builder.build()).await;

    assert!(result.success, "build failed: {}", result.output);
    assert!(out.exists());
    Ok(())
}

#[tokio::test]
async fn builder_can_be_reused() -> TestResult {
    let dir = tempfile::tempdir()?;
    let counter = dir.path().join("count");
    let script = write_script(
        dir.path(),
        "count.sh",
        &format!("echo x >> {}", counter.display()),
    );

    let mut builder = CommandBuilder::new(script.display().to_string());
    for _ in 0..3 {
        assert!(with_timeout(builder.build()).await.success);
    }
    assert_eq!(std::fs::read_to_string(&counter)?.lines().count(), 3);
    Ok(())
}
