//! Client behaviour against a live tracker

use super::helpers::{assert_close, TrackerFixture};
use ptrack::client::{TrackerClient, CLIENT_DEFAULT_WEIGHT};
use ptrack::config::{TrackerConfig, SOCKET_PATH_ENV, TASK_ID_ENV};
use ptrack::progress::{QuerySubject, MAX_SNAPSHOT_DEPTH};
use serde_json::json;

#[test]
fn test_client_declare_and_report() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();

    let build = client
        .declare_task("build", None, CLIENT_DEFAULT_WEIGHT)
        .expect("declare should succeed");
    let test = client
        .declare_task("test", None, CLIENT_DEFAULT_WEIGHT)
        .expect("declare should succeed");
    assert_eq!((build, test), (1, 2));

    assert_eq!(
        client.set_task_progress(Some(build), 0.5, Some("compiling"), None),
        Some(build)
    );
    assert_eq!(
        client.set_task_done(Some(test), Some("passed"), Some(json!(0))),
        Some(test)
    );

    let progress = client.get_progress().expect("query should succeed");
    assert_close(progress.progress, 0.75);
    let last = progress.last.expect("last task present");
    assert_eq!(last.id, test);
    assert_eq!(last.message, "passed");
    assert_eq!(last.code, json!(0));

    tracker.stop();
}

#[test]
fn test_client_default_task_id() {
    let tracker = TrackerFixture::start();

    let mut setup = tracker.client();
    let parent = setup
        .declare_task("parent", None, CLIENT_DEFAULT_WEIGHT)
        .unwrap();

    let config = tracker.config.clone().with_default_task_id(parent);
    let mut child = TrackerClient::connect(&config);
    assert_eq!(child.default_task_id(), parent);

    let sub = child
        .declare_task("sub", None, CLIENT_DEFAULT_WEIGHT)
        .unwrap();
    child.set_task_done(None, Some("parent finished"), None);

    let tree = setup.query(QuerySubject::Tasks).unwrap();
    let parent_snapshot = tree.find(parent).unwrap();
    assert_eq!(parent_snapshot.children[0].id, sub);
    assert_eq!(parent_snapshot.message, "parent finished");
    assert_close(parent_snapshot.progress, 1.0);

    tracker.stop();
}

#[test]
fn test_client_error_response_is_none() {
    let tracker = TrackerFixture::start_with(|config| config.with_strict_updates(true));
    let mut client = tracker.client();

    assert_eq!(client.set_task_done(Some(42), None, None), None);
    assert_eq!(client.declare_task("bad weight", None, -1.0), None);

    // Still connected and usable
    assert!(client.is_connected());
    assert_eq!(
        client.declare_task("ok", None, CLIENT_DEFAULT_WEIGHT),
        Some(1)
    );

    tracker.stop();
}

#[test]
fn test_unknown_task_update_is_acknowledged() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();

    assert_eq!(client.set_task_progress(Some(42), 0.3, None, None), Some(42));
    assert_eq!(client.set_task_done(Some(42), None, None), Some(42));

    tracker.stop();
}

#[test]
fn test_client_disconnects_when_tracker_stops() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();
    assert_eq!(client.declare_task("a", None, 1.0), Some(1));

    tracker.stop();

    assert_eq!(client.declare_task("b", None, 1.0), None);
    assert!(!client.is_connected());
}

#[test]
fn test_many_clients_share_one_tree() {
    let tracker = TrackerFixture::start();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let config = tracker.config.clone();
            std::thread::spawn(move || {
                let mut client = TrackerClient::connect(&config);
                let id = client
                    .declare_task(&format!("worker-{i}"), None, 1.0)
                    .expect("declare should succeed");
                for step in 1..=4 {
                    client.set_task_progress(Some(id), step as f64 / 4.0, None, None);
                }
                id
            })
        })
        .collect();

    let mut ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let mut monitor = tracker.client();
    let tree = monitor.query(QuerySubject::Tasks).unwrap();
    assert_eq!(tree.count(), 5);
    assert_close(tree.progress, 1.0);

    tracker.stop();
}

#[test]
fn test_client_decodes_deep_task_tree() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();

    let mut parent = 0;
    for level in 1..100 {
        parent = client
            .declare_task(&format!("level {level}"), Some(parent), CLIENT_DEFAULT_WEIGHT)
            .expect("declare should succeed");
    }
    client.set_task_done(Some(parent), None, None);

    let tree = client
        .query(QuerySubject::Tasks)
        .expect("deep tree should decode");
    assert_eq!(tree.count(), 100);
    assert_eq!(tree.find(parent).map(|task| task.title.as_str()), Some("level 99"));
    assert_close(tree.progress, 1.0);

    tracker.stop();
}

#[test]
fn test_client_tree_past_depth_limit_is_none() {
    let tracker = TrackerFixture::start();
    let mut client = tracker.client();

    let mut parent = 0;
    for _ in 0..MAX_SNAPSHOT_DEPTH {
        parent = client
            .declare_task("nested", Some(parent), CLIENT_DEFAULT_WEIGHT)
            .unwrap();
    }

    assert!(client.query(QuerySubject::Tasks).is_none());
    assert!(client.is_connected());
    assert_eq!(client.get_progress().map(|p| p.id), Some(0));

    tracker.stop();
}

#[test]
fn test_client_invalid_task_id_variable_falls_back_to_root() {
    let tracker = TrackerFixture::start();
    let socket_path = tracker.socket_path();

    let config = TrackerConfig::from_lookup(|name| match name {
        SOCKET_PATH_ENV => Some(socket_path.clone().into_os_string()),
        TASK_ID_ENV => Some("not-a-number".into()),
        _ => None,
    })
    .expect("socket path is set");
    let mut client = TrackerClient::connect(&config);

    assert!(client.is_connected());
    assert_eq!(client.default_task_id(), 0);
    let id = client.declare_task("orphan", None, CLIENT_DEFAULT_WEIGHT).unwrap();
    let tree = client.query(QuerySubject::Tasks).unwrap();
    assert_eq!(tree.children.last().map(|task| task.id), Some(id));

    tracker.stop();
}
