//! Cross-board moves: promote (backlog -> ready), claim (ready -> working) and
//! complete (working -> completed).
//!
//! Each move holds both board locks, acquired in canonical board order, for
//! its whole duration. The destination is written before the source, so a
//! crash between the two writes leaves the task on both boards (see
//! [`BoardStore::reconcile`]) rather than on neither.

use super::tasks::merge_patch;
use super::{BoardStore, now_utc, release_all};
use crate::error::{BoardError, Result};
use crate::logging::EventLevel;
use crate::types::{
    BoardName, BoardScope, STATUS_COMPLETED, STATUS_PENDING, STATUS_WORKING, Task,
};
use serde_json::{Map, Value, json};
use tracing::{error, warn};

/// One kind of move between two boards.
struct Transition<'a> {
    action: &'static str,
    source: BoardName,
    dest: BoardName,
    /// Status the task must have on the source board, if any.
    required_status: Option<&'static str>,
    /// Applied after the status gate; receives the shared timestamp.
    mutate: &'a dyn Fn(&mut Task, &str) -> Result<()>,
}

impl BoardStore {
    /// Move a PENDING task from the backlog to the ready board. Status is
    /// left unchanged.
    pub fn promote_task_to_ready(&self, task_id: &str, actor_id: &str) -> Result<Task> {
        let mutate = |task: &mut Task, now: &str| -> Result<()> {
            task.timestamp_updated = Some(now.to_string());
            task.append_note(now, &format!("Promoted to ready by {}.", actor_id));
            Ok(())
        };
        self.move_task(
            task_id,
            actor_id,
            &Transition {
                action: "promote",
                source: BoardName::Backlog,
                dest: BoardName::Ready,
                required_status: Some(STATUS_PENDING),
                mutate: &mutate,
            },
        )
    }

    /// Claim a PENDING task from the ready board for `agent_id`, moving it to
    /// working with status WORKING.
    pub fn claim_ready_task(&self, task_id: &str, agent_id: &str) -> Result<Task> {
        let mutate = |task: &mut Task, now: &str| -> Result<()> {
            task.status = STATUS_WORKING.to_string();
            task.claimed_by = Some(agent_id.to_string());
            if task.assigned_agent.is_none() {
                task.assigned_agent = Some(agent_id.to_string());
            }
            task.timestamp_claimed_utc = Some(now.to_string());
            task.timestamp_updated = Some(now.to_string());
            task.append_note(now, &format!("Claimed by {}.", agent_id));
            Ok(())
        };
        self.move_task(
            task_id,
            agent_id,
            &Transition {
                action: "claim",
                source: BoardName::Ready,
                dest: BoardName::Working,
                required_status: Some(STATUS_PENDING),
                mutate: &mutate,
            },
        )
    }

    /// Move a task from working to completed.
    ///
    /// `updates` is merged over the task first; its `status`, when present,
    /// becomes the terminal status instead of COMPLETED.
    pub fn move_task_to_completed(
        &self,
        task_id: &str,
        agent_id: &str,
        updates: Option<Map<String, Value>>,
    ) -> Result<Task> {
        let mutate = |task: &mut Task, now: &str| -> Result<()> {
            let final_status = updates
                .as_ref()
                .and_then(|u| u.get("status"))
                .and_then(Value::as_str)
                .unwrap_or(STATUS_COMPLETED)
                .to_string();
            if let Some(ref updates) = updates {
                *task = merge_patch(task, updates.clone())?;
            }
            task.status = final_status.clone();
            task.completed_by = Some(agent_id.to_string());
            task.timestamp_completed_utc = Some(now.to_string());
            task.timestamp_updated = Some(now.to_string());
            task.append_note(
                now,
                &format!("Completed by {} with status {}.", agent_id, final_status),
            );
            Ok(())
        };
        self.move_task(
            task_id,
            agent_id,
            &Transition {
                action: "complete",
                source: BoardName::Working,
                dest: BoardName::Completed,
                required_status: None,
                mutate: &mutate,
            },
        )
    }

    fn move_task(&self, task_id: &str, actor_id: &str, transition: &Transition<'_>) -> Result<Task> {
        let guards = self.lock_ordered(&[transition.source, transition.dest])?;
        let result = self.move_task_locked(task_id, transition);
        release_all(guards);

        match result {
            Ok(task) => {
                self.logger().log_with_data(
                    EventLevel::Info,
                    &format!(
                        "Task {} moved {} -> {} ({}) by {}",
                        task_id, transition.source, transition.dest, transition.action, actor_id
                    ),
                    json!({
                        "event": format!("task_{}", transition.action),
                        "task_id": task_id,
                        "from": transition.source,
                        "to": transition.dest,
                        "actor": actor_id,
                        "status": task.status,
                    }),
                );
                Ok(task)
            }
            Err(e) => {
                self.logger().log_with_data(
                    EventLevel::Warning,
                    &format!("Could not {} task {}: {}", transition.action, task_id, e),
                    json!({
                        "event": format!("{}_failed", transition.action),
                        "task_id": task_id,
                        "actor": actor_id,
                        "code": e.code(),
                    }),
                );
                Err(e)
            }
        }
    }

    /// Body of a move; both locks are held by the caller.
    fn move_task_locked(&self, task_id: &str, transition: &Transition<'_>) -> Result<Task> {
        let mut source = self.load_board(transition.source)?;
        let mut dest = self.load_board(transition.dest)?;

        let index = source
            .tasks
            .iter()
            .position(|t| t.task_id == task_id)
            .ok_or_else(|| BoardError::not_found(task_id, BoardScope::Only(transition.source)))?;
        // Only the in-memory copy changes until the destination write below.
        let original = source.tasks.remove(index);

        if let Some(required) = transition.required_status
            && !original.has_status(required)
        {
            return Err(BoardError::IneligibleStatus {
                task_id: task_id.to_string(),
                action: transition.action,
                status: original.status.clone(),
                required,
            });
        }

        let mut moved = original.clone();
        let now = now_utc();
        (transition.mutate)(&mut moved, &now)?;
        self.validate_task(&moved)?;

        if dest.tasks.iter().any(|t| t.task_id == task_id) {
            return Err(BoardError::duplicate(task_id, transition.dest));
        }

        dest.tasks.push(moved.clone());
        self.write_board(transition.dest, &dest)?;

        if let Err(write_err) = self.write_board(transition.source, &source) {
            self.rollback_source(transition, original, index, &write_err);
            return Err(write_err);
        }

        Ok(moved)
    }

    /// The destination already holds the task but the source write failed.
    /// Make sure the source still holds it too, so the task is duplicated
    /// rather than lost.
    fn rollback_source(
        &self,
        transition: &Transition<'_>,
        original: Task,
        index: usize,
        write_err: &BoardError,
    ) {
        let task_id = original.task_id.clone();
        warn!(
            task_id = %task_id,
            source = %transition.source,
            error = %write_err,
            "Source write failed after destination write; restoring source"
        );

        let outcome = self.load_board(transition.source).and_then(|mut source| {
            if restore_into(&mut source.tasks, original, index) {
                self.write_board(transition.source, &source)
            } else {
                Ok(())
            }
        });

        let (level, message) = match outcome {
            Ok(()) => (
                EventLevel::Warning,
                format!(
                    "Task {} is on both the {} and {} boards after a failed {}; run reconcile",
                    task_id, transition.source, transition.dest, transition.action
                ),
            ),
            Err(rollback_err) => {
                error!(
                    task_id = %task_id,
                    source = %transition.source,
                    error = %rollback_err,
                    "Rollback write failed"
                );
                (
                    EventLevel::Error,
                    format!(
                        "Rollback of {} for task {} failed: {}",
                        transition.action, task_id, rollback_err
                    ),
                )
            }
        };
        self.logger().log_with_data(
            level,
            &message,
            json!({
                "event": "transition_rollback",
                "task_id": task_id,
                "from": transition.source,
                "to": transition.dest,
            }),
        );
    }
}

/// Re-insert `task` at `index` (clamped) unless a task with its id is already
/// present. Returns whether the list changed.
pub(crate) fn restore_into(tasks: &mut Vec<Task>, task: Task, index: usize) -> bool {
    if tasks.iter().any(|t| t.task_id == task.task_id) {
        return false;
    }
    let index = index.min(tasks.len());
    tasks.insert(index, task);
    true
}
