//! Integration tests for the cross-board audit, board summary and event
//! forwarding.

use project_board::board::reconcile::CrossBoardDuplicate;
use project_board::config::BoardPaths;
use project_board::logging::{EventLevel, EventSink, Logger};
use project_board::{BoardName, BoardStore, ErrorCode, Task};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn setup_store() -> (TempDir, BoardStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = BoardStore::new(BoardPaths::in_dir(dir.path()));
    (dir, store)
}

fn with_status(id: &str, status: &str) -> Task {
    let mut task = Task::new(id, id);
    task.status = status.to_string();
    task
}

mod reconcile_tests {
    use super::*;

    #[test]
    fn clean_boards_report_nothing() {
        let (_dir, store) = setup_store();
        store
            .save(BoardName::Backlog, &[Task::new("a", "a")])
            .unwrap();
        store
            .save(BoardName::Ready, &[Task::new("b", "b")])
            .unwrap();

        let report = store.reconcile(false).unwrap();
        assert!(report.is_clean());
        assert!(!report.repaired);
    }

    #[test]
    fn interrupted_move_is_reported_without_repair() {
        let (_dir, store) = setup_store();
        // What a crash between the destination and source writes leaves behind
        store
            .save(BoardName::Ready, &[with_status("t-1", "PENDING")])
            .unwrap();
        store
            .save(BoardName::Working, &[with_status("t-1", "WORKING")])
            .unwrap();

        let report = store.reconcile(false).unwrap();
        assert_eq!(
            report.cross_board,
            vec![CrossBoardDuplicate {
                task_id: "t-1".into(),
                boards: vec![BoardName::Ready, BoardName::Working],
                keep: BoardName::Working,
            }]
        );
        assert!(!report.repaired);
        assert_eq!(store.read(BoardName::Ready).unwrap().len(), 1);
    }

    #[test]
    fn repair_keeps_furthest_stage_copy() {
        let (_dir, store) = setup_store();
        store
            .save(
                BoardName::Backlog,
                &[with_status("t-1", "PENDING"), Task::new("other", "x")],
            )
            .unwrap();
        store
            .save(BoardName::Ready, &[with_status("t-1", "PENDING")])
            .unwrap();
        store
            .save(BoardName::Completed, &[with_status("t-1", "COMPLETED")])
            .unwrap();

        let report = store.reconcile(true).unwrap();
        assert!(report.repaired);
        assert_eq!(report.cross_board.len(), 1);
        assert_eq!(report.cross_board[0].keep, BoardName::Completed);

        let backlog: Vec<_> = store
            .read(BoardName::Backlog)
            .unwrap()
            .into_iter()
            .map(|t| t.task_id)
            .collect();
        assert_eq!(backlog, ["other"]);
        assert!(store.read(BoardName::Ready).unwrap().is_empty());
        assert_eq!(store.read(BoardName::Completed).unwrap()[0].status, "COMPLETED");

        assert!(store.reconcile(false).unwrap().is_clean());
    }

    #[test]
    fn in_board_duplicates_are_reported_only() {
        let (_dir, store) = setup_store();
        // Bypass `save`, which refuses repeated ids
        std::fs::write(
            store.board_path(BoardName::Working),
            json!([
                {"task_id": "t-1", "name": "x", "status": "WORKING"},
                {"task_id": "t-1", "name": "x", "status": "WORKING"}
            ])
            .to_string(),
        )
        .unwrap();

        let report = store.reconcile(true).unwrap();
        assert_eq!(report.in_board.len(), 1);
        assert_eq!(report.in_board[0].count, 2);
        assert!(!report.repaired);
        assert_eq!(store.read(BoardName::Working).unwrap().len(), 2);
    }
}

mod summary_tests {
    use super::*;

    #[test]
    fn summary_counts_every_board() {
        let (_dir, store) = setup_store();
        store
            .save(
                BoardName::Backlog,
                &[with_status("a", "PENDING"), with_status("b", "pending")],
            )
            .unwrap();
        store
            .save(
                BoardName::Completed,
                &[with_status("c", "COMPLETED"), with_status("d", "FAILED")],
            )
            .unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.boards.len(), 4);

        let backlog = &summary.boards[&BoardName::Backlog];
        assert_eq!(backlog.total, 2);
        assert_eq!(backlog.by_status["PENDING"], 2);

        let completed = &summary.boards[&BoardName::Completed];
        assert_eq!(completed.by_status["FAILED"], 1);
        assert_eq!(summary.boards[&BoardName::Working].total, 0);
    }
}

mod event_tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(EventLevel, Value)>>,
    }

    impl Recorder {
        fn events_named(&self, name: &str) -> Vec<(EventLevel, Value)> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, data)| data["event"] == name)
                .cloned()
                .collect()
        }
    }

    impl EventSink for Recorder {
        fn notify(&self, level: EventLevel, _message: &str, data: &Value) {
            self.events.lock().unwrap().push((level, data.clone()));
        }
    }

    fn setup_recorded() -> (TempDir, BoardStore, Arc<Recorder>) {
        let (dir, store) = setup_store();
        let recorder = Arc::new(Recorder::default());
        let store = store.with_logger(Logger::new().with_sink(recorder.clone()));
        (dir, store, recorder)
    }

    #[test]
    fn moves_are_forwarded_to_sink() {
        let (_dir, store, recorder) = setup_recorded();
        let mut fields = Map::new();
        fields.insert("task_id".into(), json!("t-1"));
        fields.insert("name".into(), json!("x"));
        store.add_task_to_backlog(fields, "Agent-1").unwrap();
        store.promote_task_to_ready("t-1", "Agent-1").unwrap();

        assert_eq!(recorder.events_named("task_added").len(), 1);
        let promoted = recorder.events_named("task_promote");
        assert_eq!(promoted.len(), 1);
        assert_eq!(promoted[0].0, EventLevel::Info);
        assert_eq!(promoted[0].1["from"], json!("backlog"));
        assert_eq!(promoted[0].1["to"], json!("ready"));
    }

    #[test]
    fn failed_moves_carry_error_code() {
        let (_dir, store, recorder) = setup_recorded();
        let err = store.claim_ready_task("ghost", "Agent-2").unwrap_err();
        assert_eq!(err.code(), ErrorCode::TaskNotFound);

        let failed = recorder.events_named("claim_failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, EventLevel::Warning);
        assert_eq!(failed[0].1["code"], json!("TASK_NOT_FOUND"));
    }

    #[test]
    fn store_behaves_the_same_without_sink() {
        let (_dir, store) = setup_store();
        store
            .save(BoardName::Ready, &[Task::new("t-1", "x")])
            .unwrap();
        assert!(store.claim_ready_task("t-1", "Agent-2").is_ok());
    }
}
