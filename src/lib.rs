//! Project board library.
//!
//! A multi-stage task queue (backlog, ready, working, completed) persisted as
//! JSON arrays on a shared filesystem. Independent processes coordinate through
//! per-board advisory file locks and atomic file replacement; there is no
//! server.

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod types;

pub use board::BoardStore;
pub use error::{BoardError, ErrorCode, Result};
pub use types::{BoardName, BoardScope, FoundTask, Priority, Task, TaskFilter};
