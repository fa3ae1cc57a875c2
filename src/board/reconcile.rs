//! Cross-board consistency audit and board statistics.

use super::store::BoardFile;
use super::{BoardStore, release_all};
use crate::error::Result;
use crate::logging::EventLevel;
use crate::types::BoardName;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

/// A task id present on more than one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossBoardDuplicate {
    pub task_id: String,
    /// Boards holding the id, in board order.
    pub boards: Vec<BoardName>,
    /// The furthest-stage board; its copy is the newest.
    pub keep: BoardName,
}

/// A task id repeated within one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InBoardDuplicate {
    pub task_id: String,
    pub board: BoardName,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub cross_board: Vec<CrossBoardDuplicate>,
    /// Reported only; never repaired automatically.
    pub in_board: Vec<InBoardDuplicate>,
    /// Whether stale copies were removed.
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.cross_board.is_empty() && self.in_board.is_empty()
    }
}

/// Task counts for one board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardCount {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Entries kept on the board that could not be read as tasks.
    #[serde(skip_serializing_if = "is_zero")]
    pub unreadable: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Counts for every board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub boards: BTreeMap<BoardName, BoardCount>,
}

impl BoardStore {
    /// Find task ids held by more than one board and, when `repair` is set,
    /// drop every copy except the one on the furthest-stage board.
    ///
    /// Moves write the destination before the source, so a move interrupted
    /// between its two writes leaves exactly this kind of duplicate, and the
    /// later board always carries the newer copy.
    pub fn reconcile(&self, repair: bool) -> Result<ReconcileReport> {
        let guards = self.lock_ordered(&BoardName::ALL)?;
        let result = self.reconcile_locked(repair);
        release_all(guards);

        if let Ok(ref report) = result
            && !report.is_clean()
        {
            self.logger().log_with_data(
                EventLevel::Warning,
                &format!(
                    "Reconcile found {} cross-board and {} in-board duplicate(s){}",
                    report.cross_board.len(),
                    report.in_board.len(),
                    if report.repaired { "; repaired" } else { "" }
                ),
                json!({ "event": "reconcile", "report": report }),
            );
        }
        result
    }

    fn reconcile_locked(&self, repair: bool) -> Result<ReconcileReport> {
        let mut boards: BTreeMap<BoardName, BoardFile> = BTreeMap::new();
        for board in BoardName::ALL {
            boards.insert(board, self.load_board(board)?);
        }

        let mut report = ReconcileReport::default();
        let mut locations: BTreeMap<&str, Vec<BoardName>> = BTreeMap::new();

        for (board, file) in &boards {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for task in &file.tasks {
                *counts.entry(task.task_id.as_str()).or_insert(0) += 1;
            }
            let mut repeated: Vec<_> = counts.iter().filter(|(_, n)| **n > 1).collect();
            repeated.sort();
            for (task_id, count) in repeated {
                report.in_board.push(InBoardDuplicate {
                    task_id: task_id.to_string(),
                    board: *board,
                    count: *count,
                });
            }
            for task_id in counts.into_keys() {
                locations.entry(task_id).or_default().push(*board);
            }
        }

        for (task_id, held_by) in locations {
            if held_by.len() > 1 {
                let keep = held_by.iter().copied().max().unwrap_or(BoardName::Completed);
                report.cross_board.push(CrossBoardDuplicate {
                    task_id: task_id.to_string(),
                    boards: held_by,
                    keep,
                });
            }
        }

        if repair && !report.cross_board.is_empty() {
            for (board, file) in &boards {
                let stale: Vec<&str> = report
                    .cross_board
                    .iter()
                    .filter(|d| d.keep != *board && d.boards.contains(board))
                    .map(|d| d.task_id.as_str())
                    .collect();
                if stale.is_empty() {
                    continue;
                }
                let mut kept = file.clone();
                kept.tasks.retain(|t| !stale.contains(&t.task_id.as_str()));
                self.write_board(*board, &kept)?;
            }
            report.repaired = true;
        }

        Ok(report)
    }

    /// Per-board totals and status counts. Boards are read one at a time, so
    /// the figures are not a single consistent snapshot.
    pub fn summary(&self) -> Result<BoardSummary> {
        let mut summary = BoardSummary::default();
        for board in BoardName::ALL {
            let file = {
                let _lock = self.lock(board)?;
                self.load_board(board)?
            };
            let mut count = BoardCount {
                total: file.tasks.len(),
                unreadable: file.unreadable.len(),
                ..BoardCount::default()
            };
            for task in &file.tasks {
                *count.by_status.entry(task.status.to_uppercase()).or_insert(0) += 1;
            }
            summary.boards.insert(board, count);
        }
        Ok(summary)
    }
}
