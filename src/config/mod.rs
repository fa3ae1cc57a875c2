//! Configuration.
//!
//! Tiers, merged field by field (later wins):
//! 1. **Defaults** - compiled in
//! 2. **Project** - `./project-board/config.yaml`
//! 3. **User** - `~/.project-board/config.yaml`
//! 4. **Environment**
//!
//! ## Environment Variables
//! - `PROJECT_BOARD_CONFIG_PATH` - Explicit config file (replaces tiers 1-3)
//! - `PROJECT_BOARD_DIR` - Board directory
//! - `PROJECT_BOARD_SCHEMA_PATH` - Task JSON Schema
//! - `PROJECT_BOARD_LOCK_TIMEOUT_SECS` - Lock wait in seconds
//! - `PROJECT_BOARD_PROJECT_DIR` - Project config dir (default: `./project-board`)
//! - `PROJECT_BOARD_USER_DIR` - User config dir (default: `~/.project-board`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::merge_layer;
pub use types::*;
