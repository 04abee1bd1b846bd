#![cfg(unix)]

mod common;
use crate::common::{TestResult, eventually, init_tracing, pid_alive, with_timeout, write_script};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hotloop::exec::{
    ExitOutcome, ProcessSupervisor, StopOutcome, SupervisorOptions, SupervisorState, for_platform,
};
use hotloop::types::{Platform, PortReclaim};
use hotloop_test_utils::fakes::{RecordingTermination, TerminationCall};

const COOPERATIVE: &str = "exec sleep 30";
const STUBBORN: &str = "trap '' TERM\nwhile true; do sleep 0.1; done";

fn recording() -> Arc<RecordingTermination> {
    Arc::new(RecordingTermination::wrapping(for_platform(Platform::Posix)))
}

fn options(script: &Path) -> SupervisorOptions {
    let mut opts = SupervisorOptions::new(script.display().to_string());
    opts.settle_delay = Duration::from_millis(10);
    opts
}

#[tokio::test]
async fn restart_stops_old_process_gracefully() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "app.sh", COOPERATIVE);
    let provider = recording();
    let mut sup = ProcessSupervisor::new(options(&script), provider.clone());

    let first = with_timeout(sup.start()).await?;
    assert_eq!(sup.state(), SupervisorState::Running { pid: first });
    assert!(pid_alive(first));

    let second = with_timeout(sup.start()).await?;
    assert_ne!(first, second);
    assert!(sup.is_running());
    assert!(eventually(Duration::from_secs(2), || !pid_alive(first)).await);
    assert_eq!(provider.calls(), vec![TerminationCall::Graceful(first)]);

    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::Graceful);
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert!(eventually(Duration::from_secs(2), || !pid_alive(second)).await);
    Ok(())
}

#[tokio::test]
async fn stubborn_process_is_killed_after_grace_period() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "stubborn.sh", STUBBORN);
    let provider = recording();
    let mut sup = ProcessSupervisor::new(options(&script), provider.clone());

    let pid = with_timeout(sup.start()).await?;
    // Give the shell time to install its trap.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let outcome = with_timeout(sup.stop()).await;
    let took = started.elapsed();

    assert_eq!(outcome, StopOutcome::Forced);
    assert!(took >= Duration::from_millis(500), "escalated after {took:?}");
    assert!(took < Duration::from_secs(3), "stop took {took:?}");
    assert_eq!(
        provider.calls(),
        vec![TerminationCall::Graceful(pid), TerminationCall::Force(pid)]
    );
    assert_eq!(sup.state(), SupervisorState::Idle);
    assert_eq!(sup.last_exit(), Some(ExitOutcome::Signaled));
    assert!(eventually(Duration::from_secs(2), || !pid_alive(pid)).await);
    Ok(())
}

#[tokio::test]
async fn process_that_exits_on_its_own_reads_idle() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "oneshot.sh", "exit 3");
    let provider = recording();
    let mut sup = ProcessSupervisor::new(options(&script), provider.clone());

    with_timeout(sup.start()).await?;
    assert!(eventually(Duration::from_secs(2), || sup.state() == SupervisorState::Idle).await);
    assert_eq!(sup.last_exit(), Some(ExitOutcome::Code(3)));

    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::AlreadyExited);
    assert!(provider.calls().is_empty(), "no signals for an exited process");
    Ok(())
}

#[tokio::test]
async fn stop_twice_and_when_idle_is_harmless() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "app.sh", COOPERATIVE);
    let mut sup = ProcessSupervisor::new(options(&script), recording());

    assert_eq!(sup.stop().await, StopOutcome::NotRunning);
    with_timeout(sup.start()).await?;
    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::Graceful);
    assert_eq!(sup.stop().await, StopOutcome::NotRunning);
    assert_eq!(sup.pid(), None);
    Ok(())
}

#[tokio::test]
async fn run_env_is_passed_to_child() -> TestResult {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("env.out");
    let script = write_script(
        dir.path(),
        "env.sh",
        &format!("echo \"$HOTLOOP_TEST_VALUE\" > {}\nexec sleep 30", out.display()),
    );
    let mut opts = options(&script);
    opts.env.insert("HOTLOOP_TEST_VALUE".into(), "from-config".into());
    let mut sup = ProcessSupervisor::new(opts, recording());

    with_timeout(sup.start()).await?;
    assert!(eventually(Duration::from_secs(2), || out.exists()).await);
    assert!(
        eventually(Duration::from_secs(2), || {
            std::fs::read_to_string(&out).map(|s| s.trim() == "from-config").unwrap_or(false)
        })
        .await
    );
    with_timeout(sup.stop()).await;
    Ok(())
}

#[tokio::test]
async fn restart_reclaims_configured_port() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "app.sh", COOPERATIVE);
    let own = std::process::id();
    let provider = Arc::new(
        RecordingTermination::wrapping(for_platform(Platform::Posix)).with_listeners(&[4_000_001, own]),
    );
    let mut opts = options(&script);
    opts.port = Some(18080);
    opts.port_reclaim = PortReclaim::Always;
    let mut sup = ProcessSupervisor::new(opts, provider.clone());

    with_timeout(sup.start()).await?;
    assert!(provider.forced().is_empty(), "nothing to reclaim on first start");

    with_timeout(sup.start()).await?;
    assert_eq!(provider.forced(), vec![4_000_001], "own pid must be skipped");
    assert!(provider.calls().contains(&TerminationCall::FindListeners(18080)));

    with_timeout(sup.stop()).await;
    Ok(())
}

#[tokio::test]
async fn reclaim_policy_never_and_auto_respect_provider() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "app.sh", COOPERATIVE);

    for (policy, provider_default) in [(PortReclaim::Never, true), (PortReclaim::Auto, false)] {
        let provider = Arc::new(
            RecordingTermination::wrapping(for_platform(Platform::Posix))
                .with_listeners(&[4_000_002])
                .reclaiming_by_default(provider_default),
        );
        let mut opts = options(&script);
        opts.port = Some(18081);
        opts.port_reclaim = policy;
        let mut sup = ProcessSupervisor::new(opts, provider.clone());

        with_timeout(sup.start()).await?;
        with_timeout(sup.start()).await?;
        with_timeout(sup.stop()).await;

        assert!(
            !provider.calls().iter().any(|c| matches!(c, TerminationCall::FindListeners(_))),
            "{policy:?} looked up listeners"
        );
    }

    // Auto follows a provider that reclaims by default.
    let provider = Arc::new(
        RecordingTermination::wrapping(for_platform(Platform::Posix))
            .with_listeners(&[4_000_003])
            .reclaiming_by_default(true),
    );
    let mut opts = options(&script);
    opts.port = Some(18082);
    let mut sup = ProcessSupervisor::new(opts, provider.clone());
    with_timeout(sup.start()).await?;
    with_timeout(sup.start()).await?;
    assert_eq!(provider.forced(), vec![4_000_003]);
    with_timeout(sup.stop()).await;
    Ok(())
}

#[tokio::test]
async fn forced_stop_reclaims_port() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "stubborn.sh", STUBBORN);
    let provider = Arc::new(
        RecordingTermination::wrapping(for_platform(Platform::Posix)).with_listeners(&[4_000_004]),
    );
    let mut opts = options(&script);
    opts.port = Some(18083);
    opts.port_reclaim = PortReclaim::Always;
    let mut sup = ProcessSupervisor::new(opts, provider.clone());

    let pid = with_timeout(sup.start()).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::Forced);
    assert_eq!(provider.forced(), vec![pid, 4_000_004]);
    Ok(())
}

#[tokio::test]
async fn stop_after_self_exit_still_reclaims_port() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "oneshot.sh", "exit 0");
    let provider = Arc::new(
        RecordingTermination::wrapping(for_platform(Platform::Posix)).with_listeners(&[4_000_005]),
    );
    let mut opts = options(&script);
    opts.port = Some(18084);
    opts.port_reclaim = PortReclaim::Always;
    let mut sup = ProcessSupervisor::new(opts, provider.clone());

    with_timeout(sup.start()).await?;
    assert!(eventually(Duration::from_secs(2), || sup.state() == SupervisorState::Idle).await);

    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::AlreadyExited);
    assert_eq!(provider.forced(), vec![4_000_005], "orphaned listener must be killed");
    assert!(
        !provider.calls().iter().any(|c| matches!(c, TerminationCall::Graceful(_))),
        "no signals for an exited process"
    );
    Ok(())
}

#[tokio::test]
async fn clean_shutdown_leaves_port_alone() -> TestResult {
    let dir = tempfile::tempdir()?;
    let script = write_script(dir.path(), "app.sh", COOPERATIVE);
    let provider = Arc::new(
        RecordingTermination::wrapping(for_platform(Platform::Posix)).with_listeners(&[4_000_006]),
    );
    let mut opts = options(&script);
    opts.port = Some(18085);
    opts.port_reclaim = PortReclaim::Always;
    let mut sup = ProcessSupervisor::new(opts, provider.clone());

    with_timeout(sup.start()).await?;
    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::Graceful);
    assert!(provider.forced().is_empty());
    Ok(())
}
