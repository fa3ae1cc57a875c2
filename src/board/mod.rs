//! File-persisted project board.
//!
//! [`BoardStore`] is the only way the crate touches board files. Every
//! operation takes the board lock(s) it needs, re-reads the file(s) from disk,
//! mutates in memory and writes back atomically; nothing is cached between
//! calls.

pub mod atomic;
pub mod lock;
pub mod reconcile;
pub mod store;
pub mod tasks;
pub mod transitions;
pub mod validation;

use crate::config::{BoardConfig, BoardPaths};
use crate::error::Result;
use crate::logging::Logger;
use crate::types::BoardName;
use atomic::{AtomicWriter, BoardWriter};
use lock::BoardLock;
use store::BoardFile;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use validation::{NoopValidator, TaskValidator};

/// Default maximum wait for a board lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15);

/// Handle to the four board files sharing one directory tree.
#[derive(Clone)]
pub struct BoardStore {
    paths: Arc<BoardPaths>,
    validator: Arc<dyn TaskValidator>,
    lock_timeout: Duration,
    lock_poll: Duration,
    logger: Logger,
    writer: Arc<dyn BoardWriter>,
}

impl BoardStore {
    /// Store over `paths` with validation disabled and the default timeout.
    pub fn new(paths: BoardPaths) -> Self {
        Self {
            paths: Arc::new(paths),
            validator: Arc::new(NoopValidator),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll: lock::DEFAULT_POLL_INTERVAL,
            logger: Logger::new().with_name("project_board"),
            writer: Arc::new(AtomicWriter),
        }
    }

    /// Store configured from `config`, resolving relative paths against `base`.
    ///
    /// Creates the board directory if needed and selects the validator from
    /// `schema_path`.
    pub fn open(config: &BoardConfig, base: &Path) -> Result<Self> {
        let paths = config.resolve(base);
        std::fs::create_dir_all(&paths.dir).map_err(|source| {
            crate::error::BoardError::Write {
                path: paths.dir.clone(),
                source,
            }
        })?;
        let validator = validation::validator_for(paths.schema_path.as_deref());
        Ok(Self::new(paths)
            .with_validator(validator)
            .with_lock_timeout(config.lock_timeout())
            .with_lock_poll(config.lock_poll_interval()))
    }

    pub fn with_validator(mut self, validator: Arc<dyn TaskValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_lock_poll(mut self, poll: Duration) -> Self {
        self.lock_poll = poll;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_writer(mut self, writer: Arc<dyn BoardWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn paths(&self) -> &BoardPaths {
        &self.paths
    }

    pub fn board_path(&self, board: BoardName) -> &Path {
        self.paths.board(board)
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn validation_enabled(&self) -> bool {
        self.validator.is_enabled()
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.logger
    }

    pub(crate) fn validator(&self) -> &dyn TaskValidator {
        self.validator.as_ref()
    }

    /// Rewrite a whole board file. The caller holds the board lock.
    pub(crate) fn write_board(&self, board: BoardName, file: &BoardFile) -> Result<()> {
        self.writer.write(self.board_path(board), file)
    }

    /// Take the exclusive lock for one board.
    pub fn lock(&self, board: BoardName) -> Result<BoardLock> {
        let result = BoardLock::acquire_with_poll(
            self.board_path(board),
            self.lock_timeout,
            self.lock_poll,
        );
        if let Err(ref e) = result {
            self.logger.log_with_data(
                crate::logging::EventLevel::Error,
                &format!("Could not lock the {} board: {}", board, e),
                serde_json::json!({ "event": "lock_failed", "board": board, "code": e.code() }),
            );
        }
        result
    }

    /// Lock several boards in canonical order. Guards are returned in
    /// acquisition order; drop them in reverse.
    pub(crate) fn lock_ordered(&self, boards: &[BoardName]) -> Result<Vec<BoardLock>> {
        let mut ordered = boards.to_vec();
        ordered.sort();
        ordered.dedup();
        let mut guards = Vec::with_capacity(ordered.len());
        for board in ordered {
            guards.push(self.lock(board)?);
        }
        Ok(guards)
    }
}

impl std::fmt::Debug for BoardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardStore")
            .field("paths", &self.paths)
            .field("validation", &self.validator.is_enabled())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

/// Release guards in reverse acquisition order.
pub(crate) fn release_all(mut guards: Vec<BoardLock>) {
    while let Some(guard) = guards.pop() {
        drop(guard);
    }
}

/// Current UTC time as an ISO-8601 string with microseconds.
pub fn now_utc() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
