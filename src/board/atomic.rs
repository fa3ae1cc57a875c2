//! Atomic board writes: temp file in the target directory, fsync, rename.

use super::store::BoardFile;
use crate::error::{BoardError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A fully written, synced temporary copy of a board that has not yet
/// replaced the target.
///
/// Dropping it without calling [`StagedWrite::commit`] deletes the temporary
/// file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// Serialize `board` into a temporary file next to `target`.
    pub fn stage<B: Serialize + ?Sized>(target: &Path, board: &B) -> Result<Self> {
        let write_err = |source| BoardError::Write {
            path: target.to_path_buf(),
            source,
        };

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "board".to_string());
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(write_err)?;

        serde_json::to_writer_pretty(&mut tmp, board)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        Ok(Self {
            tmp,
            target: target.to_path_buf(),
        })
    }

    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        self.tmp.path()
    }

    /// Rename the temporary file over the target.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.tmp.persist(&target).map_err(|e| BoardError::Write {
            path: target.clone(),
            source: e.error,
        })?;
        debug!(path = %target.display(), "Atomic board write completed");
        Ok(())
    }
}

/// Replace the board at `path` with `board`. Readers see either the old or the
/// new content, never a mix.
pub fn write_board_atomic<B: Serialize + ?Sized>(path: &Path, board: &B) -> Result<()> {
    StagedWrite::stage(path, board)?.commit()
}

/// Where [`BoardStore`](super::BoardStore) sends every board rewrite.
pub(crate) trait BoardWriter: Send + Sync {
    fn write(&self, path: &Path, board: &BoardFile) -> Result<()>;
}

/// The production writer: [`write_board_atomic`].
pub(crate) struct AtomicWriter;

impl BoardWriter for AtomicWriter {
    fn write(&self, path: &Path, board: &BoardFile) -> Result<()> {
        write_board_atomic(path, board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;
    use serde_json::json;
    use tempfile::TempDir;

    fn tmp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn test_write_creates_pretty_json_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("backlog.json");
        write_board_atomic(&path, &[Task::new("t-1", "one")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value[0]["task_id"], "t-1");
        assert!(content.ends_with("]\n"));
        assert!(tmp_files(tmp.path()).is_empty());
    }

    #[test]
    fn test_abandoned_stage_leaves_target_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ready_queue.json");
        write_board_atomic(&path, &[Task::new("t-1", "one")]).unwrap();
        let before = std::fs::read(&path).unwrap();

        let staged = StagedWrite::stage(&path, &[Task::new("t-2", "two")]).unwrap();
        let temp_path = staged.temp_path().to_path_buf();
        assert!(temp_path.exists());
        assert_eq!(temp_path.parent(), path.parent());
        drop(staged);

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_commit_replaces_existing_board() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("working_tasks.json");
        write_board_atomic(&path, &[Task::new("old", "old")]).unwrap();
        write_board_atomic(&path, &Vec::<Task>::new()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_atomic_writer_keeps_unreadable_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("backlog.json");
        let board = BoardFile {
            tasks: vec![Task::new("t-1", "one")],
            unreadable: vec![json!({"task_id": 9, "note": "hand edited"})],
        };
        AtomicWriter.write(&path, &board).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1], json!({"task_id": 9, "note": "hand edited"}));
        assert_eq!(BoardFile::load(&path).unwrap(), board);
    }
}
