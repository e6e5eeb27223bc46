mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::time::Duration;

use tokio::time::sleep;

use wmlkit::errors::WmlkitError;
use wmlkit::exec::{KillSwitch, ProcessSession, WaitStatus};

fn sh(script: &str) -> ProcessSession {
    ProcessSession::new("sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn chatty_child_on_both_pipes_does_not_deadlock() -> TestResult {
    init_tracing();

    // Well past the usual 64 KiB pipe buffer on each stream.
    let script = r#"
i=0
while [ $i -lt 4000 ]; do
  echo "stdout line $i padding padding padding"
  echo "stderr line $i padding padding padding" 1>&2
  i=$((i+1))
done
"#;
    let mut session = sh(script);
    session.start()?;
    assert!(session.start_output_monitor());
    assert!(session.start_error_monitor());

    let status = with_timeout(session.wait()).await;
    assert_eq!(status, WaitStatus::Exited(0));

    let out = session.output_text();
    let err = session.error_text();
    assert_eq!(out.lines().count(), 4000);
    assert_eq!(err.lines().count(), 4000);
    assert_eq!(out.lines().next(), Some("stdout line 0 padding padding padding"));
    assert_eq!(err.lines().last(), Some("stderr line 3999 padding padding padding"));

    Ok(())
}

/// Writes `lines` lines to the given descriptor and nothing to the other.
fn one_sided(lines: u32, fd: u8) -> ProcessSession {
    sh(&format!(
        r#"
i=0
while [ $i -lt {lines} ]; do
  echo "line $i padding padding padding padding" 1>&{fd}
  i=$((i+1))
done
"#
    ))
}

#[tokio::test]
async fn silent_stdout_with_chatty_stderr_does_not_deadlock() -> TestResult {
    init_tracing();

    let mut session = one_sided(5000, 2);
    session.start()?;
    assert!(session.start_output_monitor());
    assert!(session.start_error_monitor());

    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Exited(0));
    assert_eq!(session.output_text(), "");
    assert_eq!(session.error_text().lines().count(), 5000);

    Ok(())
}

#[tokio::test]
async fn chatty_stdout_with_silent_stderr_does_not_deadlock() -> TestResult {
    init_tracing();

    let mut session = one_sided(5000, 1);
    session.start()?;
    assert!(session.start_output_monitor());
    assert!(session.start_error_monitor());

    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Exited(0));
    assert_eq!(session.output_text().lines().count(), 5000);
    assert_eq!(session.error_text(), "");

    Ok(())
}

#[tokio::test]
async fn direct_reads_strip_line_terminators() -> TestResult {
    init_tracing();

    let mut session = sh(r"printf 'first\r\nsecond\nthird'");
    session.start()?;
    session.start_error_monitor();

    let mut lines = Vec::new();
    while let Some(line) = with_timeout(session.read_stdout_line()).await {
        lines.push(line);
    }
    assert_eq!(lines, vec!["first", "second", "third"]);

    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Exited(0));
    // Readers are closed once the wait returned.
    assert_eq!(session.read_stdout_line().await, None);

    Ok(())
}

#[tokio::test]
async fn exit_code_is_reported_and_wait_is_repeatable() -> TestResult {
    init_tracing();

    let mut session = sh("echo oops 1>&2; exit 3");
    session.start()?;
    session.start_output_monitor();
    session.start_error_monitor();

    let first = with_timeout(session.wait()).await;
    let second = with_timeout(session.wait()).await;
    assert_eq!(first, WaitStatus::Exited(3));
    assert_eq!(second, first);
    assert!(!first.success());
    assert_eq!(session.error_text(), "oops\n");
    assert!(!session.is_running());

    Ok(())
}

#[tokio::test]
async fn wait_before_start_reports_not_started() {
    init_tracing();

    let mut session = sh("true");
    assert_eq!(session.wait().await, WaitStatus::NotStarted);
    assert!(!session.is_running());
    assert_eq!(session.pid(), None);
}

#[tokio::test]
async fn missing_binary_is_a_start_error() {
    init_tracing();

    let mut session = ProcessSession::new("/definitely/not/here/wesnoth", vec![]);
    match session.start() {
        Err(WmlkitError::Start { binary, .. }) => {
            assert_eq!(binary.to_string_lossy(), "/definitely/not/here/wesnoth");
        }
        other => panic!("expected Start error, got {other:?}"),
    }
    assert_eq!(session.wait().await, WaitStatus::NotStarted);
}

#[tokio::test]
async fn monitors_are_single_consumer() -> TestResult {
    init_tracing();

    let mut session = sh("echo hi");
    session.start()?;
    assert!(session.start_output_monitor());
    assert!(!session.start_output_monitor());
    assert!(session.take_stdout().is_none());
    assert!(session.take_stderr().is_some());

    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Exited(0));
    assert_eq!(session.output_text(), "hi\n");

    Ok(())
}

#[tokio::test]
async fn kill_and_wait_terminates_a_long_running_child() -> TestResult {
    init_tracing();

    let mut session = sh("echo started; sleep 30");
    session.start()?;
    session.start_output_monitor();
    session.start_error_monitor();
    assert!(session.pid().is_some());

    with_timeout(session.kill(true)).await;

    assert!(session.was_killed());
    assert!(!session.is_running());
    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Interrupted);

    Ok(())
}

#[tokio::test]
async fn kill_switch_from_another_task_interrupts_wait() -> TestResult {
    init_tracing();

    let mut session = sh("sleep 30");
    session.start()?;
    session.start_output_monitor();
    session.start_error_monitor();

    let switch = session.kill_switch();
    let killer = tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        switch.kill();
    });

    let status = with_timeout(session.wait()).await;
    killer.await?;

    assert_eq!(status, WaitStatus::Interrupted);
    assert!(session.was_killed());

    Ok(())
}

#[tokio::test]
async fn kill_switch_raised_before_wait_is_honoured() -> TestResult {
    init_tracing();

    let mut session = sh("sleep 30");
    session.start()?;
    session.kill_switch().kill();

    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Interrupted);

    Ok(())
}

#[tokio::test]
async fn killing_one_session_leaves_its_siblings_alone() -> TestResult {
    init_tracing();

    let cancel = KillSwitch::new();
    let mut stopped = sh("sleep 30").with_cancel(cancel.clone());
    let mut sibling = sh("sleep 0.2; echo done").with_cancel(cancel.clone());
    stopped.start()?;
    sibling.start()?;
    sibling.start_output_monitor();
    sibling.start_error_monitor();

    with_timeout(stopped.kill(true)).await;
    assert!(stopped.was_killed());
    assert!(!cancel.is_killed());

    assert_eq!(with_timeout(sibling.wait()).await, WaitStatus::Exited(0));
    assert!(!sibling.was_killed());
    assert_eq!(sibling.output_text(), "done\n");

    Ok(())
}

#[tokio::test]
async fn shared_cancel_interrupts_every_attached_session() -> TestResult {
    init_tracing();

    let cancel = KillSwitch::new();
    let mut first = sh("sleep 30").with_cancel(cancel.clone());
    let mut second = sh("sleep 30").with_cancel(cancel.clone());
    first.start()?;
    second.start()?;

    let switch = cancel.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(100)).await;
        switch.kill();
    });

    assert_eq!(with_timeout(first.wait()).await, WaitStatus::Interrupted);
    assert_eq!(with_timeout(second.wait()).await, WaitStatus::Interrupted);
    assert!(first.was_killed() && second.was_killed());

    Ok(())
}

#[tokio::test]
async fn raised_shared_cancel_refuses_to_start() -> TestResult {
    init_tracing();

    let cancel = KillSwitch::new();
    cancel.kill();
    let mut session = sh("echo never").with_cancel(cancel);

    match session.start() {
        Err(WmlkitError::Cancelled(label)) => assert_eq!(label, "sh"),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(!session.is_running());
    assert_eq!(session.pid(), None);
    assert_eq!(with_timeout(session.wait()).await, WaitStatus::NotStarted);

    Ok(())
}

#[tokio::test]
async fn working_dir_is_applied() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let mut session = sh("pwd").with_working_dir(dir.path());
    session.start()?;
    session.start_output_monitor();
    session.start_error_monitor();
    assert_eq!(with_timeout(session.wait()).await, WaitStatus::Exited(0));

    let printed = session.output_text();
    let expected = dir.path().canonicalize()?;
    assert_eq!(
        std::path::Path::new(printed.trim()).canonicalize()?,
        expected
    );

    Ok(())
}
