//! Configuration types.

use crate::types::BoardName;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub board: BoardConfig,
}

impl Config {
    /// Load a single configuration file (no tier merging).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Empty or comment-only YAML parses as null
        let config: Option<Config> = serde_yaml::from_str(&content)?;
        Ok(config.unwrap_or_default())
    }
}

/// Where the boards live and how they are guarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Directory holding the board files. Relative paths resolve against the
    /// base directory passed to [`BoardConfig::resolve`].
    #[serde(default = "default_board_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub files: BoardFiles,

    /// JSON Schema for tasks. Validation is disabled when unset or unreadable.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// Maximum wait for a board lock.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: f64,

    /// Interval between lock attempts while waiting.
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            dir: default_board_dir(),
            files: BoardFiles::default(),
            schema_path: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_poll_ms: default_lock_poll_ms(),
        }
    }
}

fn default_board_dir() -> PathBuf {
    PathBuf::from("project_board")
}

fn default_lock_timeout_secs() -> f64 {
    15.0
}

fn default_lock_poll_ms() -> u64 {
    50
}

impl BoardConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.lock_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_lock_timeout_secs()))
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_ms.max(1))
    }

    /// Resolve board and schema paths to absolute paths.
    pub fn resolve(&self, base: &Path) -> BoardPaths {
        let dir = absolutize(base, &self.dir);
        BoardPaths {
            backlog: dir.join(&self.files.backlog),
            ready: dir.join(&self.files.ready),
            working: dir.join(&self.files.working),
            completed: dir.join(&self.files.completed),
            schema_path: self.schema_path.as_ref().map(|p| absolutize(base, p)),
            dir,
        }
    }
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Per-board file names inside the board directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFiles {
    #[serde(default = "default_backlog_file")]
    pub backlog: String,
    #[serde(default = "default_ready_file")]
    pub ready: String,
    #[serde(default = "default_working_file")]
    pub working: String,
    #[serde(default = "default_completed_file")]
    pub completed: String,
}

impl Default for BoardFiles {
    fn default() -> Self {
        Self {
            backlog: default_backlog_file(),
            ready: default_ready_file(),
            working: default_working_file(),
            completed: default_completed_file(),
        }
    }
}

fn default_backlog_file() -> String {
    "backlog.json".to_string()
}

fn default_ready_file() -> String {
    "ready_queue.json".to_string()
}

fn default_working_file() -> String {
    "working_tasks.json".to_string()
}

fn default_completed_file() -> String {
    "completed_tasks.json".to_string()
}

/// Resolved, absolute locations of every board file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPaths {
    pub dir: PathBuf,
    pub backlog: PathBuf,
    pub ready: PathBuf,
    pub working: PathBuf,
    pub completed: PathBuf,
    pub schema_path: Option<PathBuf>,
}

impl BoardPaths {
    /// Default file names inside `dir`, no schema.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let files = BoardFiles::default();
        Self {
            backlog: dir.join(files.backlog),
            ready: dir.join(files.ready),
            working: dir.join(files.working),
            completed: dir.join(files.completed),
            schema_path: None,
            dir,
        }
    }

    pub fn board(&self, board: BoardName) -> &Path {
        match board {
            BoardName::Backlog => &self.backlog,
            BoardName::Ready => &self.ready,
            BoardName::Working => &self.working,
            BoardName::Completed => &self.completed,
        }
    }
}
