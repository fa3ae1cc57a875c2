//! Error taxonomy for board operations.

use crate::types::BoardName;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Locking
    LockTimeout,
    LockDirectory,
    LockFailed,

    // Task state
    TaskNotFound,
    TaskValidation,
    DuplicateTask,
    IneligibleStatus,
    ImmutableBoard,

    // Storage
    ReadFailed,
    WriteFailed,

    BoardError,
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("timed out after {timeout:?} waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("cannot prepare lock directory {}: {source}", path.display())]
    LockDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to acquire lock {}: {source}", path.display())]
    LockFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("task {task_id} not found on {scope}")]
    TaskNotFound { task_id: String, scope: String },

    #[error("task {task_id} failed validation: {reason}")]
    TaskValidation { task_id: String, reason: String },

    #[error("task {task_id} already exists on the {board} board")]
    DuplicateTask { task_id: String, board: BoardName },

    #[error("cannot {action} task {task_id}: status is '{status}', expected '{required}'")]
    IneligibleStatus {
        task_id: String,
        action: &'static str,
        status: String,
        required: &'static str,
    },

    #[error("the {board} board is append-only")]
    ImmutableBoard { board: BoardName },

    #[error("failed to read board {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write board {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Board(String),
}

impl BoardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BoardError::LockTimeout { .. } => ErrorCode::LockTimeout,
            BoardError::LockDirectory { .. } => ErrorCode::LockDirectory,
            BoardError::LockFailed { .. } => ErrorCode::LockFailed,
            BoardError::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            BoardError::TaskValidation { .. } => ErrorCode::TaskValidation,
            BoardError::DuplicateTask { .. } => ErrorCode::DuplicateTask,
            BoardError::IneligibleStatus { .. } => ErrorCode::IneligibleStatus,
            BoardError::ImmutableBoard { .. } => ErrorCode::ImmutableBoard,
            BoardError::Read { .. } => ErrorCode::ReadFailed,
            BoardError::Write { .. } => ErrorCode::WriteFailed,
            BoardError::Board(_) => ErrorCode::BoardError,
        }
    }

    /// The task this error is about, when there is one.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            BoardError::TaskNotFound { task_id, .. }
            | BoardError::TaskValidation { task_id, .. }
            | BoardError::DuplicateTask { task_id, .. }
            | BoardError::IneligibleStatus { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    // Convenience constructors

    pub fn not_found(task_id: &str, scope: impl ToString) -> Self {
        BoardError::TaskNotFound {
            task_id: task_id.to_string(),
            scope: scope.to_string(),
        }
    }

    pub fn invalid(task_id: &str, reason: impl Into<String>) -> Self {
        BoardError::TaskValidation {
            task_id: task_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(task_id: &str, board: BoardName) -> Self {
        BoardError::DuplicateTask {
            task_id: task_id.to_string(),
            board,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            task_id: self.task_id().map(str::to_string),
        }
    }
}

/// Serializable form of a `BoardError`, printed by the CLI.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

// Wrap unexpected failures rather than leaking their types.
impl From<serde_json::Error> for BoardError {
    fn from(err: serde_json::Error) -> Self {
        BoardError::Board(err.to_string())
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;
