//! Reading and saving whole boards.

use super::{BoardStore, now_utc};
use crate::error::{BoardError, Result};
use crate::types::{BoardName, Task};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// A board as stored on disk.
///
/// Array entries that cannot be read as a [`Task`] (wrong field types, no
/// string `task_id`, not an object) are kept in `unreadable` exactly as
/// found. Board operations never see them, and every rewrite of the board
/// puts them back after the tasks, so fixing one by hand is always possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardFile {
    pub tasks: Vec<Task>,
    pub unreadable: Vec<Value>,
}

impl BoardFile {
    /// Read a board file without locking.
    ///
    /// Missing and empty files read as an empty board. A file that is not a
    /// JSON array is copied aside to `<file>.corrupt-<timestamp>` (once per
    /// distinct content) and also read as empty, so callers keep working and
    /// the original bytes survive the next write. Any other I/O failure is
    /// returned.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Board file missing; treating as empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(BoardError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            warn!(path = %path.display(), "Board file is empty; treating as empty board");
            return Ok(Self::default());
        }

        let entries = match parse_entries(&content) {
            Ok(entries) => entries,
            Err(reason) => {
                error!(path = %path.display(), %reason, "Board file is corrupt; treating as empty board");
                quarantine(path, &content);
                return Ok(Self::default());
            }
        };

        let mut board = Self::default();
        for entry in entries {
            match serde_json::from_value::<Task>(entry.clone()) {
                Ok(task) => board.tasks.push(task),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        task_id = %entry.get("task_id").unwrap_or(&serde_json::Value::Null),
                        error = %e,
                        "Board entry is not a readable task; keeping it untouched"
                    );
                    board.unreadable.push(entry);
                }
            }
        }
        Ok(board)
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<Task>> for BoardFile {
    fn from(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            unreadable: Vec::new(),
        }
    }
}

/// Serializes as one JSON array: tasks first, then unreadable entries.
impl Serialize for BoardFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for task in &self.tasks {
            seq.serialize_element(task)?;
        }
        for entry in &self.unreadable {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

/// The readable tasks of a board file, without locking.
pub fn read_board(path: &Path) -> Result<Vec<Task>> {
    Ok(BoardFile::load(path)?.tasks)
}

fn parse_entries(content: &[u8]) -> std::result::Result<Vec<Value>, String> {
    match serde_json::from_slice::<Value>(content) {
        Ok(Value::Array(entries)) => Ok(entries),
        Ok(_) => Err("top-level value is not an array".to_string()),
        Err(e) => Err(format!("malformed JSON: {}", e)),
    }
}

/// Copy a corrupt board aside unless an identical copy already exists.
/// Failure here is logged, never fatal.
fn quarantine(path: &Path, content: &[u8]) -> Option<PathBuf> {
    if let Some(existing) = find_quarantined(path, content) {
        debug!(path = %path.display(), copy = %existing.display(), "Corrupt board already preserved");
        return Some(existing);
    }

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", stamp));
    let target = PathBuf::from(name);
    match std::fs::write(&target, content) {
        Ok(()) => {
            warn!(path = %path.display(), copy = %target.display(), "Preserved corrupt board");
            Some(target)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not preserve corrupt board");
            None
        }
    }
}

/// An existing `<file>.corrupt-*` sibling holding exactly `content`.
fn find_quarantined(path: &Path, content: &[u8]) -> Option<PathBuf> {
    let prefix = format!("{}.corrupt-", path.file_name()?.to_string_lossy());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .find(|copy| std::fs::read(copy).is_ok_and(|bytes| bytes == content))
}

impl BoardStore {
    /// Read one board under its lock.
    pub fn read(&self, board: BoardName) -> Result<Vec<Task>> {
        let _lock = self.lock(board)?;
        read_board(self.board_path(board))
    }

    /// Replace one board's tasks under its lock.
    ///
    /// Every task is validated and `task_id`s must be unique; nothing is
    /// written if either check fails. Unreadable entries already on the board
    /// are kept.
    pub fn save(&self, board: BoardName, tasks: &[Task]) -> Result<()> {
        self.check_board(board, tasks)?;
        let _lock = self.lock(board)?;
        let mut file = self.load_board(board)?;
        file.tasks = tasks.to_vec();
        self.write_board(board, &file)
    }

    /// Load a board file. The caller holds the board lock.
    pub(crate) fn load_board(&self, board: BoardName) -> Result<BoardFile> {
        BoardFile::load(self.board_path(board))
    }

    /// Validate every task and reject repeated ids.
    pub(crate) fn check_board(&self, board: BoardName, tasks: &[Task]) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for task in tasks {
            if !seen.insert(task.task_id.as_str()) {
                return Err(BoardError::duplicate(&task.task_id, board));
            }
            self.validate_task(task)?;
        }
        Ok(())
    }

    pub(crate) fn validate_task(&self, task: &Task) -> Result<()> {
        if !self.validator().is_enabled() {
            return Ok(());
        }
        let value = serde_json::to_value(task)?;
        self.validator().validate(&value)
    }
}

/// Turn a task document into a `Task`, reporting shape errors as validation
/// failures.
pub(crate) fn task_from_value(value: Value) -> Result<Task> {
    let task_id = value
        .get("task_id")
        .and_then(Value::as_str)
        .unwrap_or("<no task_id>")
        .to_string();
    serde_json::from_value(value).map_err(|e| BoardError::invalid(&task_id, e.to_string()))
}

/// Timestamp helper shared by the mutating operations.
pub(crate) fn stamp_updated(task: &mut Task) -> String {
    let now = now_utc();
    task.timestamp_updated = Some(now.clone());
    now
}
