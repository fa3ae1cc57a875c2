//! Integration tests for cross-board moves and locking.

use project_board::config::BoardPaths;
use project_board::types::{STATUS_COMPLETED, STATUS_PENDING, STATUS_WORKING};
use project_board::{BoardError, BoardName, BoardScope, BoardStore, ErrorCode, Task};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn setup_store() -> (TempDir, BoardStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = BoardStore::new(BoardPaths::in_dir(dir.path()))
        .with_lock_timeout(Duration::from_secs(5))
        .with_lock_poll(Duration::from_millis(5));
    (dir, store)
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn ids(store: &BoardStore, board: BoardName) -> Vec<String> {
    store
        .read(board)
        .unwrap()
        .into_iter()
        .map(|t| t.task_id)
        .collect()
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn task_walks_every_board() {
        let (_dir, store) = setup_store();
        let added = store
            .add_task_to_backlog(fields(json!({"name": "Draft release notes"})), "Agent-1")
            .unwrap();
        let id = added.task_id.clone();

        // Promote: backlog -> ready, status unchanged
        let promoted = store.promote_task_to_ready(&id, "Agent-1").unwrap();
        assert_eq!(promoted.task_id, id);
        assert_eq!(promoted.status, STATUS_PENDING);
        assert!(ids(&store, BoardName::Backlog).is_empty());
        assert_eq!(ids(&store, BoardName::Ready), [id.clone()]);

        // Claim: ready -> working
        let claimed = store.claim_ready_task(&id, "Agent-2").unwrap();
        assert_eq!(claimed.status, STATUS_WORKING);
        assert_eq!(claimed.claimed_by.as_deref(), Some("Agent-2"));
        assert_eq!(claimed.assigned_agent.as_deref(), Some("Agent-2"));
        assert!(claimed.timestamp_claimed_utc.is_some());
        assert!(ids(&store, BoardName::Ready).is_empty());
        assert_eq!(ids(&store, BoardName::Working), [id.clone()]);

        // Complete: working -> completed
        let completed = store
            .move_task_to_completed(&id, "Agent-2", Some(fields(json!({"status": "COMPLETED"}))))
            .unwrap();
        assert_eq!(completed.status, STATUS_COMPLETED);
        assert_eq!(completed.completed_by.as_deref(), Some("Agent-2"));
        assert!(completed.timestamp_completed_utc.is_some());
        assert!(ids(&store, BoardName::Working).is_empty());
        assert_eq!(ids(&store, BoardName::Completed), [id.clone()]);

        let found = store.get_task(&id, BoardScope::Any).unwrap();
        assert_eq!(found.board, BoardName::Completed);
        let notes = found.task.notes.unwrap();
        assert_eq!(notes.lines().count(), 3);
        assert!(notes.contains("Claimed by Agent-2."));
    }

    #[test]
    fn claim_keeps_existing_assignment() {
        let (_dir, store) = setup_store();
        let mut task = Task::new("t-1", "x");
        task.assigned_agent = Some("Agent-7".into());
        store.save(BoardName::Ready, &[task]).unwrap();

        let claimed = store.claim_ready_task("t-1", "Agent-2").unwrap();
        assert_eq!(claimed.assigned_agent.as_deref(), Some("Agent-7"));
        assert_eq!(claimed.claimed_by.as_deref(), Some("Agent-2"));
    }

    #[test]
    fn complete_defaults_to_completed_status() {
        let (_dir, store) = setup_store();
        let mut task = Task::new("t-1", "x");
        task.status = STATUS_WORKING.into();
        store.save(BoardName::Working, &[task]).unwrap();

        let done = store.move_task_to_completed("t-1", "Agent-2", None).unwrap();
        assert_eq!(done.status, STATUS_COMPLETED);
    }

    #[test]
    fn complete_applies_updates_and_custom_status() {
        let (_dir, store) = setup_store();
        let mut task = Task::new("t-1", "x");
        task.status = STATUS_WORKING.into();
        store.save(BoardName::Working, &[task]).unwrap();

        let done = store
            .move_task_to_completed(
                "t-1",
                "Agent-2",
                Some(fields(json!({"status": "FAILED", "result": "flaky upstream"}))),
            )
            .unwrap();
        assert_eq!(done.status, "FAILED");
        assert_eq!(done.extra.get("result"), Some(&json!("flaky upstream")));
    }

    #[test]
    fn status_gate_is_case_insensitive() {
        let (_dir, store) = setup_store();
        let mut task = Task::new("t-1", "x");
        task.status = "pending".into();
        store.save(BoardName::Backlog, &[task]).unwrap();

        let promoted = store.promote_task_to_ready("t-1", "Agent-1").unwrap();
        assert_eq!(promoted.status, "pending");
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn promote_ineligible_status_leaves_boards_untouched() {
        let (_dir, store) = setup_store();
        let mut task = Task::new("t-1", "x");
        task.status = STATUS_WORKING.into();
        store.save(BoardName::Backlog, &[task]).unwrap();
        let backlog_before = std::fs::read(store.board_path(BoardName::Backlog)).unwrap();

        let err = store.promote_task_to_ready("t-1", "Agent-1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::IneligibleStatus);
        match err {
            BoardError::IneligibleStatus { status, required, .. } => {
                assert_eq!(status, STATUS_WORKING);
                assert_eq!(required, STATUS_PENDING);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(
            std::fs::read(store.board_path(BoardName::Backlog)).unwrap(),
            backlog_before
        );
        assert!(!store.board_path(BoardName::Ready).exists());
    }

    #[test]
    fn move_of_missing_task_fails() {
        let (_dir, store) = setup_store();
        let err = store.claim_ready_task("ghost", "Agent-2").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TaskNotFound);
        assert!(err.to_string().contains("ready"));
    }

    #[test]
    fn duplicate_in_destination_aborts_move() {
        let (_dir, store) = setup_store();
        store
            .save(BoardName::Backlog, &[Task::new("t-1", "backlog copy")])
            .unwrap();
        store
            .save(BoardName::Ready, &[Task::new("t-1", "ready copy")])
            .unwrap();

        let err = store.promote_task_to_ready("t-1", "Agent-1").unwrap_err();
        assert!(matches!(
            err,
            BoardError::DuplicateTask {
                board: BoardName::Ready,
                ..
            }
        ));
        assert_eq!(ids(&store, BoardName::Backlog), ["t-1"]);
        assert_eq!(ids(&store, BoardName::Ready), ["t-1"]);
        let ready = store.read(BoardName::Ready).unwrap();
        assert_eq!(ready[0].name.as_deref(), Some("ready copy"));
    }
}

mod concurrency_tests {
    use super::*;

    #[test]
    fn concurrent_claims_have_one_winner() {
        let (_dir, store) = setup_store();
        store
            .save(BoardName::Ready, &[Task::new("t-1", "contested")])
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["Agent-A", "Agent-B"]
            .into_iter()
            .map(|agent| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.claim_ready_task("t-1", agent)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        assert_eq!(losers[0].code(), ErrorCode::TaskNotFound);

        assert!(ids(&store, BoardName::Ready).is_empty());
        assert_eq!(ids(&store, BoardName::Working), ["t-1"]);
    }

    #[test]
    fn concurrent_adds_are_all_kept() {
        let (_dir, store) = setup_store();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .add_task_to_backlog(
                            fields(json!({"task_id": format!("t-{i}"), "name": "parallel"})),
                            "Agent-1",
                        )
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut stored = ids(&store, BoardName::Backlog);
        stored.sort();
        let mut expected: Vec<String> = (0..8).map(|i| format!("t-{i}")).collect();
        expected.sort();
        assert_eq!(stored, expected);
    }

    #[test]
    fn held_lock_times_out_other_writers() {
        let (_dir, store) = setup_store();
        store
            .save(BoardName::Backlog, &[Task::new("t-1", "x")])
            .unwrap();
        let impatient = store
            .clone()
            .with_lock_timeout(Duration::from_millis(200));

        let guard = store.lock(BoardName::Ready).unwrap();
        let started = Instant::now();
        let err = impatient.promote_task_to_ready("t-1", "Agent-1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::LockTimeout);
        assert!(started.elapsed() >= Duration::from_millis(200));
        drop(guard);

        // Nothing moved while the lock was held elsewhere
        assert_eq!(ids(&store, BoardName::Backlog), ["t-1"]);
        store.promote_task_to_ready("t-1", "Agent-1").unwrap();
        assert_eq!(ids(&store, BoardName::Ready), ["t-1"]);
    }

    #[test]
    fn huge_lock_timeout_is_accepted() {
        let (_dir, store) = setup_store();
        let patient = store.with_lock_timeout(Duration::from_secs(u64::MAX / 2));
        patient
            .save(BoardName::Backlog, &[Task::new("t-1", "x")])
            .unwrap();
        assert_eq!(ids(&patient, BoardName::Backlog), ["t-1"]);
        patient.promote_task_to_ready("t-1", "Agent-1").unwrap();
    }

    #[test]
    fn opposite_direction_moves_do_not_deadlock() {
        let (_dir, store) = setup_store();
        let backlog: Vec<_> = (0..10).map(|i| Task::new(format!("b-{i}"), "x")).collect();
        let ready: Vec<_> = (0..10).map(|i| Task::new(format!("r-{i}"), "x")).collect();
        store.save(BoardName::Backlog, &backlog).unwrap();
        store.save(BoardName::Ready, &ready).unwrap();

        let promoter = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    store
                        .promote_task_to_ready(&format!("b-{i}"), "Agent-1")
                        .unwrap();
                }
            })
        };
        let claimer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..10 {
                    store.claim_ready_task(&format!("r-{i}"), "Agent-2").unwrap();
                }
            })
        };
        promoter.join().unwrap();
        claimer.join().unwrap();

        assert!(ids(&store, BoardName::Backlog).is_empty());
        assert_eq!(ids(&store, BoardName::Ready).len(), 10);
        assert_eq!(ids(&store, BoardName::Working).len(), 10);
    }
}
