//! Output formatting for the CLI: JSON or markdown.

use crate::board::reconcile::{BoardSummary, ReconcileReport};
use crate::types::{BoardName, Task};
use serde::Serialize;
use std::collections::BTreeMap;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown format '{}' (expected json or markdown)", other)),
        }
    }
}

/// Pretty JSON for any serializable result.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Format a single task as markdown.
pub fn format_task_markdown(task: &Task, board: Option<BoardName>) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "## Task: {}\n",
        task.name.as_deref().unwrap_or("(unnamed)")
    ));
    md.push_str(&format!("- **task_id**: `{}`\n", task.task_id));
    if let Some(board) = board {
        md.push_str(&format!("- **board**: {}\n", board));
    }
    md.push_str(&format!("- **status**: {}\n", task.status));
    if let Some(priority) = task.priority {
        md.push_str(&format!("- **priority**: {}\n", priority.as_str()));
    }
    if let Some(ref agent) = task.assigned_agent {
        md.push_str(&format!("- **assigned_agent**: {}\n", agent));
    }
    if let Some(ref agent) = task.claimed_by {
        md.push_str(&format!("- **claimed_by**: {}\n", agent));
    }
    if let Some(ref agent) = task.completed_by {
        md.push_str(&format!("- **completed_by**: {}\n", agent));
    }
    if !task.dependencies.is_empty() {
        let deps: Vec<String> = task.dependencies.iter().map(|id| format!("`{}`", id)).collect();
        md.push_str(&format!("- **dependencies**: {}\n", deps.join(", ")));
    }
    if let Some(ref ts) = task.timestamp_updated {
        md.push_str(&format!("- **updated**: {}\n", ts));
    }

    if let Some(ref desc) = task.description {
        md.push_str("\n### Description\n");
        md.push_str(desc);
        md.push('\n');
    }
    if let Some(ref notes) = task.notes {
        md.push_str("\n### Notes\n");
        md.push_str(notes);
        md.push('\n');
    }

    md
}

/// Format one board's tasks as markdown, grouped by status.
pub fn format_tasks_markdown(board: BoardName, tasks: &[Task]) -> String {
    let mut md = format!("# {} ({})\n\n", board, tasks.len());

    let mut by_status: BTreeMap<String, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_status
            .entry(task.status.to_uppercase())
            .or_default()
            .push(task);
    }

    for (status, group) in by_status {
        md.push_str(&format!("## {}\n\n", status));
        for task in group {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    md
}

fn format_task_short(task: &Task) -> String {
    let mut line = format!(
        "- `{}` {}",
        task.task_id,
        task.name.as_deref().unwrap_or("(unnamed)")
    );
    if let Some(priority) = task.priority {
        line.push_str(&format!(" [{}]", priority.as_str()));
    }
    if let Some(agent) = task.claimed_by.as_ref().or(task.assigned_agent.as_ref()) {
        line.push_str(&format!(" @{}", agent));
    }
    line.push('\n');
    line
}

pub fn format_summary_markdown(summary: &BoardSummary) -> String {
    let mut md = String::from("# Board summary\n\n| board | total | by status |\n|---|---|---|\n");
    for (board, count) in &summary.boards {
        let mut statuses: Vec<String> = count
            .by_status
            .iter()
            .map(|(status, n)| format!("{} {}", status, n))
            .collect();
        if count.unreadable > 0 {
            statuses.push(format!("unreadable {}", count.unreadable));
        }
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            board,
            count.total,
            statuses.join(", ")
        ));
    }
    md
}

pub fn format_reconcile_markdown(report: &ReconcileReport) -> String {
    if report.is_clean() {
        return "No duplicate tasks found.\n".to_string();
    }
    let mut md = String::from("# Reconcile\n\n");
    for dup in &report.cross_board {
        let boards: Vec<&str> = dup.boards.iter().map(BoardName::as_str).collect();
        md.push_str(&format!(
            "- `{}` on {} (keep: {})\n",
            dup.task_id,
            boards.join(", "),
            dup.keep
        ));
    }
    for dup in &report.in_board {
        md.push_str(&format!(
            "- `{}` appears {} times on {}\n",
            dup.task_id, dup.count, dup.board
        ));
    }
    if report.repaired {
        md.push_str("\nStale copies removed.\n");
    }
    md
}
