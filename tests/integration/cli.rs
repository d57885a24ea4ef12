//! End-to-end tests of the ptrack binary

use super::helpers::{assert_close, TrackerFixture};
use ptrack::commands::run::track;
use ptrack::config::TrackerConfig;
use ptrack::progress::{QuerySubject, TaskSnapshot};
use std::process::{Command, Output};
use tempfile::TempDir;

const PTRACK: &str = env!("CARGO_BIN_EXE_ptrack");

fn ptrack(tracker: &TrackerFixture, args: &[&str]) -> Output {
    Command::new(PTRACK)
        .arg("--socket")
        .arg(tracker.socket_path())
        .args(args)
        .env_remove("PTRACK_SOCKETPATH")
        .env_remove("PTRACK_TASKID")
        .output()
        .expect("Failed to run ptrack")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_cli_reports_to_tracker() {
    let tracker = TrackerFixture::start();

    let output = ptrack(&tracker, &["declare", "download", "--weight", "2"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1");

    let output = ptrack(
        &tracker,
        &["progress", "0.5", "--task", "1", "--message", "half", "--code", "3"],
    );
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1");

    let output = ptrack(&tracker, &["query", "progress"]);
    assert!(output.status.success());
    let snapshot: TaskSnapshot = serde_json::from_str(&stdout(&output)).unwrap();
    assert_close(snapshot.progress, 0.5);
    let last = snapshot.last.unwrap();
    assert_eq!(last.message, "half");
    assert_eq!(last.code, serde_json::json!(3));

    let output = ptrack(&tracker, &["done", "--task", "1"]);
    assert!(output.status.success());

    let output = ptrack(&tracker, &["query", "tasks"]);
    let tree: TaskSnapshot = serde_json::from_str(&stdout(&output)).unwrap();
    assert_close(tree.progress, 1.0);
    assert_eq!(tree.children[0].title, "download");

    tracker.stop();
}

#[test]
fn test_cli_default_task_from_environment() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();
    let parent = client.declare_task("parent", None, 1.0).unwrap();

    let output = Command::new(PTRACK)
        .args(["declare", "child"])
        .env("PTRACK_SOCKETPATH", tracker.socket_path())
        .env("PTRACK_TASKID", parent.to_string())
        .output()
        .expect("Failed to run ptrack");
    assert!(output.status.success());

    let tree = client.query(QuerySubject::Tasks).unwrap();
    assert_eq!(tree.find(parent).unwrap().children.len(), 1);

    tracker.stop();
}

#[test]
fn test_cli_without_tracker_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = Command::new(PTRACK)
        .arg("--socket")
        .arg(temp_dir.path().join("absent.sock"))
        .args(["query"])
        .output()
        .expect("Failed to run ptrack");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not connected"));
}

#[test]
fn test_cli_rejects_unknown_subject() {
    let tracker = TrackerFixture::start();
    let output = ptrack(&tracker, &["query", "nonexistent-subject"]);
    assert!(!output.status.success());
    tracker.stop();
}

#[test]
fn test_run_tracks_child_reports() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let socket = temp_dir.path().join("run.sock");
    let script = format!(
        "id=$({PTRACK} declare step) && {PTRACK} progress 0.5 --task $id && {PTRACK} done --task $id"
    );

    let result = track(
        TrackerConfig::new(&socket),
        &["sh".to_string(), "-c".to_string(), script],
    )
    .expect("run should succeed");

    assert_eq!(result.exit_code, 0);
    let tasks = result.tasks.expect("task tree available");
    assert_eq!(tasks.children.len(), 1);
    assert_eq!(tasks.children[0].title, "step");
    assert_close(tasks.progress, 1.0);
    assert!(!socket.exists());
}

#[test]
fn test_run_propagates_exit_code() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = Command::new(PTRACK)
        .arg("--socket")
        .arg(temp_dir.path().join("run.sock"))
        .args(["run", "--title", "Job", "--", "sh", "-c", "exit 3"])
        .output()
        .expect("Failed to run ptrack");

    assert_eq!(output.status.code(), Some(3));
    let tree: TaskSnapshot = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(tree.title, "Job");
    assert!(tree.children.is_empty());
}
