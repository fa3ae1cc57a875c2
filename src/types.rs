//! Core types for the project board.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Status a task is created with; the only status eligible for promote/claim.
pub const STATUS_PENDING: &str = "PENDING";
/// Status stamped on a task when it is claimed.
pub const STATUS_WORKING: &str = "WORKING";
/// Default terminal status stamped on completion.
pub const STATUS_COMPLETED: &str = "COMPLETED";

fn default_status() -> String {
    STATUS_PENDING.to_string()
}

/// An explicit `"status": null` reads as a pending task.
fn status_or_pending<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_status))
}

/// An explicit `"dependencies": null` reads as no dependencies.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[serde(alias = "high", alias = "High")]
    High,
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    #[serde(alias = "low", alias = "Low")]
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}' (expected HIGH, MEDIUM or LOW)", other)),
        }
    }
}

/// One persisted unit of work.
///
/// Known fields are typed; anything else found in the board file is carried
/// through `extra` untouched so that rewriting a board never drops data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default = "default_status", deserialize_with = "status_or_pending")]
    pub status: String,

    // Ownership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,

    /// Informational only; the board does not enforce ordering.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub dependencies: Vec<String>,

    // ISO-8601 UTC timestamps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_claimed_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_completed_utc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a pending task with only an id and a name.
    pub fn new(task_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: Some(name.into()),
            description: None,
            priority: None,
            status: default_status(),
            assigned_agent: None,
            claimed_by: None,
            completed_by: None,
            dependencies: Vec::new(),
            created_by: None,
            created_at: None,
            timestamp_updated: None,
            timestamp_claimed_utc: None,
            timestamp_completed_utc: None,
            notes: None,
            extra: Map::new(),
        }
    }

    /// Case-insensitive status comparison.
    pub fn has_status(&self, status: &str) -> bool {
        self.status.eq_ignore_ascii_case(status)
    }

    /// Append a timestamped line to `notes`.
    pub fn append_note(&mut self, timestamp: &str, text: &str) {
        let line = format!("[{}] {}", timestamp, text);
        match self.notes {
            Some(ref mut notes) if !notes.is_empty() => {
                notes.push('\n');
                notes.push_str(&line);
            }
            _ => self.notes = Some(line),
        }
    }
}

/// The four boards, declared in canonical lock order.
///
/// The derived `Ord` is the global lock-acquisition order: any operation that
/// holds more than one board lock acquires them in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardName {
    Backlog,
    Ready,
    Working,
    Completed,
}

impl BoardName {
    /// All boards in lock order (also the search order for `BoardScope::Any`).
    pub const ALL: [BoardName; 4] = [
        BoardName::Backlog,
        BoardName::Ready,
        BoardName::Working,
        BoardName::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardName::Backlog => "backlog",
            BoardName::Ready => "ready",
            BoardName::Working => "working",
            BoardName::Completed => "completed",
        }
    }
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backlog" => Ok(BoardName::Backlog),
            "ready" | "ready_queue" => Ok(BoardName::Ready),
            "working" | "working_tasks" => Ok(BoardName::Working),
            "completed" | "completed_tasks" => Ok(BoardName::Completed),
            other => Err(format!(
                "unknown board '{}' (expected backlog, ready, working or completed)",
                other
            )),
        }
    }
}

/// Which boards a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardScope {
    Any,
    Only(BoardName),
}

impl BoardScope {
    pub fn boards(&self) -> Vec<BoardName> {
        match self {
            BoardScope::Any => BoardName::ALL.to_vec(),
            BoardScope::Only(board) => vec![*board],
        }
    }
}

impl fmt::Display for BoardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardScope::Any => f.write_str("any board"),
            BoardScope::Only(board) => write!(f, "the {} board", board),
        }
    }
}

impl FromStr for BoardScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            Ok(BoardScope::Any)
        } else {
            s.parse().map(BoardScope::Only)
        }
    }
}

impl From<BoardName> for BoardScope {
    fn from(board: BoardName) -> Self {
        BoardScope::Only(board)
    }
}

/// Filter for `list_tasks`. Empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive exact status match.
    pub status: Option<String>,
    /// Matches either `assigned_agent` or `claimed_by`.
    pub agent: Option<String>,
}

impl TaskFilter {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            agent: None,
        }
    }

    pub fn agent(agent: impl Into<String>) -> Self {
        Self {
            status: None,
            agent: Some(agent.into()),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(ref status) = self.status
            && !task.has_status(status)
        {
            return false;
        }
        if let Some(ref agent) = self.agent {
            let assigned = task.assigned_agent.as_deref() == Some(agent.as_str());
            let claimed = task.claimed_by.as_deref() == Some(agent.as_str());
            if !assigned && !claimed {
                return false;
            }
        }
        true
    }
}

/// A task together with the board it was found on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoundTask {
    pub board: BoardName,
    pub task: Task,
}
