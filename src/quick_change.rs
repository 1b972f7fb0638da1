use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::board::BoardError;
use crate::sync::{OptimisticMutation, SyncRequest};
use crate::types::{Status, TaskId};
use crate::view::{BoardView, MoveUndo};

static STATUS_ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/task/(\d+)/status$").expect("valid status action regex"));

/// A card's status-selector form as submitted by the user.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StatusFormSubmission {
    pub action: String,
    pub status: String,
}

/// Status pick from a card's selector: same transition as a cross-column
/// drop, but always lands at the end of the chosen column.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct QuickChange {
    pub task_id: TaskId,
    pub status: Status,
}

impl QuickChange {
    pub fn new(task_id: TaskId, status: Status) -> Self {
        Self { task_id, status }
    }

    /// Intercepts a status form submission. Anything that is not a
    /// `/task/{id}/status` submission with a known status is left alone.
    pub fn from_submission(submission: &StatusFormSubmission) -> Option<Self> {
        let captures = STATUS_ACTION_RE.captures(submission.action.trim())?;
        let task_id = captures.get(1)?.as_str().parse::<TaskId>().ok()?;
        let Ok(status) = Status::from_str(&submission.status) else {
            debug!(
                task_id,
                status = %submission.status,
                "status form submitted without a known status"
            );
            return None;
        };
        Some(Self { task_id, status })
    }
}

impl OptimisticMutation for QuickChange {
    type Undo = MoveUndo;

    fn request(&self) -> SyncRequest {
        SyncRequest::ChangeStatus {
            task_id: self.task_id,
            status: self.status,
        }
    }

    fn apply(&self, view: &mut BoardView) -> Result<MoveUndo, BoardError> {
        view.move_card(self.task_id, self.status, usize::MAX)
    }

    fn rollback(&self, view: &mut BoardView, undo: MoveUndo) {
        view.restore_card(undo);
    }
}
