//! Single-board task CRUD.

use super::store::{stamp_updated, task_from_value};
use super::{BoardStore, now_utc};
use crate::error::{BoardError, Result};
use crate::logging::EventLevel;
use crate::types::{BoardName, BoardScope, FoundTask, STATUS_PENDING, Task, TaskFilter};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Fields a patch may never change.
const IMMUTABLE_FIELDS: &[&str] = &["task_id"];

impl BoardStore {
    /// Create a task on the backlog.
    ///
    /// Missing `task_id` gets a UUID, missing `status` becomes PENDING,
    /// `created_by` is the actor and `created_at`/`timestamp_updated` are
    /// stamped. Fails with `DuplicateTask` when the id is already on the
    /// backlog.
    pub fn add_task_to_backlog(&self, fields: Map<String, Value>, actor_id: &str) -> Result<Task> {
        let task = self.prepare_new_task(fields, actor_id)?;

        let _lock = self.lock(BoardName::Backlog)?;
        let mut backlog = self.load_board(BoardName::Backlog)?;

        if backlog.tasks.iter().any(|t| t.task_id == task.task_id) {
            return Err(BoardError::duplicate(&task.task_id, BoardName::Backlog));
        }

        backlog.tasks.push(task.clone());
        self.write_board(BoardName::Backlog, &backlog)?;

        self.logger().log_with_data(
            EventLevel::Info,
            &format!("Task {} added to backlog by {}", task.task_id, actor_id),
            json!({ "event": "task_added", "task_id": task.task_id, "actor": actor_id }),
        );
        Ok(task)
    }

    fn prepare_new_task(&self, mut fields: Map<String, Value>, actor_id: &str) -> Result<Task> {
        let has_id = match fields.get("task_id") {
            None | Some(Value::Null) => false,
            Some(Value::String(id)) => !id.trim().is_empty(),
            Some(other) => {
                return Err(BoardError::invalid(
                    &other.to_string(),
                    "task_id must be a string",
                ));
            }
        };
        if !has_id {
            fields.insert("task_id".into(), Value::String(Uuid::new_v4().to_string()));
        }

        let now = now_utc();
        fields.insert("created_by".into(), Value::String(actor_id.to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        fields.insert("timestamp_updated".into(), Value::String(now));
        match fields.get("status") {
            None | Some(Value::Null) => {
                fields.insert("status".into(), Value::String(STATUS_PENDING.to_string()));
            }
            _ => {}
        }

        let value = Value::Object(fields);
        self.validator().validate(&value)?;
        task_from_value(value)
    }

    /// Find a task, searching backlog, ready, working, completed in that order
    /// when the scope is `Any`.
    pub fn get_task(&self, task_id: &str, scope: BoardScope) -> Result<FoundTask> {
        for board in scope.boards() {
            let tasks = self.read(board)?;
            if let Some(task) = tasks.into_iter().find(|t| t.task_id == task_id) {
                return Ok(FoundTask { board, task });
            }
        }
        Err(BoardError::not_found(task_id, scope))
    }

    /// List a board's tasks in file order, optionally filtered.
    pub fn list_tasks(&self, board: BoardName, filter: &TaskFilter) -> Result<Vec<Task>> {
        let tasks = self.read(board)?;
        Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
    }

    /// Merge `patch` over an existing task. `task_id` cannot be changed;
    /// `timestamp_updated` is always stamped.
    pub fn update_task(
        &self,
        board: BoardName,
        task_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Task> {
        let _lock = self.lock(board)?;
        let mut file = self.load_board(board)?;

        let index = file
            .tasks
            .iter()
            .position(|t| t.task_id == task_id)
            .ok_or_else(|| BoardError::not_found(task_id, BoardScope::Only(board)))?;

        let mut updated = merge_patch(&file.tasks[index], patch)?;
        stamp_updated(&mut updated);
        self.validate_task(&updated)?;

        file.tasks[index] = updated.clone();
        self.write_board(board, &file)?;

        self.logger().log_with_data(
            EventLevel::Debug,
            &format!("Task {} updated on {}", task_id, board),
            json!({ "event": "task_updated", "task_id": task_id, "board": board }),
        );
        Ok(updated)
    }

    /// Remove a task from backlog, ready or working.
    ///
    /// Returns `false` when the task is not on the board. The completed board
    /// is append-only and rejects deletes.
    pub fn delete_task(&self, board: BoardName, task_id: &str, actor_id: &str) -> Result<bool> {
        if board == BoardName::Completed {
            return Err(BoardError::ImmutableBoard { board });
        }

        let _lock = self.lock(board)?;
        let mut file = self.load_board(board)?;

        let before = file.tasks.len();
        file.tasks.retain(|t| t.task_id != task_id);
        if file.tasks.len() == before {
            return Ok(false);
        }

        self.write_board(board, &file)?;
        self.logger().log_with_data(
            EventLevel::Info,
            &format!("Task {} deleted from {} by {}", task_id, board, actor_id),
            json!({ "event": "task_deleted", "task_id": task_id, "board": board, "actor": actor_id }),
        );
        Ok(true)
    }
}

/// Overlay `patch` on `task`, keeping immutable fields.
pub(crate) fn merge_patch(task: &Task, patch: Map<String, Value>) -> Result<Task> {
    let mut value = serde_json::to_value(task)?;
    if let Value::Object(ref mut fields) = value {
        for (key, patch_value) in patch {
            if IMMUTABLE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if patch_value.is_null() {
                fields.remove(&key);
            } else {
                fields.insert(key, patch_value);
            }
        }
    }
    task_from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn test_merge_patch_overlays_fields() {
        let task = Task::new("t-1", "before");
        let merged = merge_patch(
            &task,
            patch(json!({"name": "after", "priority": "LOW", "sprint": 4})),
        )
        .unwrap();
        assert_eq!(merged.name.as_deref(), Some("after"));
        assert_eq!(merged.priority, Some(Priority::Low));
        assert_eq!(merged.extra.get("sprint"), Some(&json!(4)));
    }

    #[test]
    fn test_merge_patch_keeps_task_id() {
        let task = Task::new("t-1", "x");
        let merged = merge_patch(&task, patch(json!({"task_id": "t-2"}))).unwrap();
        assert_eq!(merged.task_id, "t-1");
    }

    #[test]
    fn test_merge_patch_null_clears_field() {
        let mut task = Task::new("t-1", "x");
        task.assigned_agent = Some("Agent-1".into());
        let merged = merge_patch(&task, patch(json!({"assigned_agent": null}))).unwrap();
        assert!(merged.assigned_agent.is_none());
    }

    #[test]
    fn test_merge_patch_rejects_bad_shape() {
        let task = Task::new("t-1", "x");
        let err = merge_patch(&task, patch(json!({"priority": "URGENT"}))).unwrap_err();
        assert!(matches!(err, BoardError::TaskValidation { .. }));
    }
}
