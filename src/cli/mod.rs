//! CLI command definitions for project-board.
//!
//! The `Cli` struct holds global options; each subcommand maps to one board
//! operation.

use crate::format::OutputFormat;
use crate::types::{BoardName, BoardScope, Priority};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

/// File-persisted project board for coordinating agents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Board directory (overrides config)
    #[arg(short = 'd', long, global = true)]
    pub board_dir: Option<String>,

    /// Task JSON Schema (overrides config)
    #[arg(long, global = true)]
    pub schema: Option<String>,

    /// Lock wait in seconds (overrides config)
    #[arg(long, global = true)]
    pub lock_timeout: Option<f64>,

    /// Output format: json or markdown
    #[arg(short, long, default_value = "json", global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a board's tasks
    List(ListArgs),

    /// Find a task by id
    Get(GetArgs),

    /// Create a task on the backlog
    Add(AddArgs),

    /// Merge fields into a task
    Update(UpdateArgs),

    /// Remove a task from backlog, ready or working
    Delete(DeleteArgs),

    /// Move a PENDING task from backlog to ready
    Promote(MoveArgs),

    /// Claim a PENDING task from ready for an agent
    Claim(MoveArgs),

    /// Move a task from working to completed
    Complete(CompleteArgs),

    /// Report (and optionally repair) tasks present on more than one board
    Reconcile(ReconcileArgs),

    /// Per-board task counts
    Summary,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// backlog, ready, working or completed
    pub board: BoardName,

    /// Only tasks with this status (case-insensitive)
    #[arg(long)]
    pub status: Option<String>,

    /// Only tasks assigned to or claimed by this agent
    #[arg(long)]
    pub agent: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub task_id: String,

    /// Board to search, or "any"
    #[arg(long, default_value = "any")]
    pub board: BoardScope,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Explicit task id (a UUID is generated otherwise)
    #[arg(long)]
    pub task_id: Option<String>,

    /// Additional fields as a JSON object; named flags win on conflict
    #[arg(long, value_parser = parse_json_object)]
    pub json: Option<Map<String, Value>>,

    /// Agent creating the task
    #[arg(long, default_value = "cli")]
    pub actor: String,
}

impl AddArgs {
    /// Merge the named flags over `--json`.
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = self.json.clone().unwrap_or_default();
        let named = [
            ("task_id", self.task_id.clone()),
            ("name", self.name.clone()),
            ("description", self.description.clone()),
            ("priority", self.priority.map(|p| p.as_str().to_string())),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value));
            }
        }
        fields
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub board: BoardName,

    pub task_id: String,

    /// Fields to merge, as a JSON object (null removes a field)
    #[arg(value_parser = parse_json_object)]
    pub patch: Map<String, Value>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub board: BoardName,

    pub task_id: String,

    #[arg(long, default_value = "cli")]
    pub actor: String,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub task_id: String,

    /// Acting agent
    #[arg(long, default_value = "cli")]
    pub agent: String,
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    pub task_id: String,

    #[arg(long, default_value = "cli")]
    pub agent: String,

    /// Terminal status (default COMPLETED)
    #[arg(long)]
    pub status: Option<String>,

    /// Final field updates as a JSON object
    #[arg(long, value_parser = parse_json_object)]
    pub json: Option<Map<String, Value>>,
}

impl CompleteArgs {
    pub fn updates(&self) -> Option<Map<String, Value>> {
        let mut updates = self.json.clone();
        if let Some(ref status) = self.status {
            updates
                .get_or_insert_with(Map::new)
                .insert("status".to_string(), Value::String(status.clone()));
        }
        updates
    }
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Remove stale copies, keeping the furthest-stage board's
    #[arg(long)]
    pub repair: bool,
}

fn parse_json_object(s: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_parses_filters() {
        let cli = Cli::parse_from([
            "project-board",
            "list",
            "ready",
            "--status",
            "pending",
            "--agent",
            "Agent-1",
        ]);
        match cli.command {
            Command::List(args) => {
                assert_eq!(args.board, BoardName::Ready);
                assert_eq!(args.status.as_deref(), Some("pending"));
                assert_eq!(args.agent.as_deref(), Some("Agent-1"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_board_rejected() {
        assert!(Cli::try_parse_from(["project-board", "list", "archive"]).is_err());
    }

    #[test]
    fn test_add_named_flags_override_json() {
        let cli = Cli::parse_from([
            "project-board",
            "add",
            "--name",
            "Draft release notes",
            "--priority",
            "high",
            "--json",
            r#"{"name": "ignored", "estimate": 3}"#,
        ]);
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        let fields = args.fields();
        assert_eq!(fields["name"], json!("Draft release notes"));
        assert_eq!(fields["priority"], json!("HIGH"));
        assert_eq!(fields["estimate"], json!(3));
        assert_eq!(args.actor, "cli");
    }

    #[test]
    fn test_complete_status_flag_becomes_update() {
        let cli = Cli::parse_from([
            "project-board",
            "complete",
            "t-1",
            "--agent",
            "Agent-2",
            "--status",
            "FAILED",
        ]);
        let Command::Complete(args) = cli.command else {
            panic!("expected complete");
        };
        assert_eq!(args.updates().unwrap()["status"], json!("FAILED"));
    }

    #[test]
    fn test_update_requires_object() {
        assert!(Cli::try_parse_from(["project-board", "update", "backlog", "t-1", "[1]"]).is_err());
    }
}
