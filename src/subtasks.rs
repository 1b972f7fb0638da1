//! Subtask add / toggle / delete.
//!
//! Toggles flip the checkbox and progress immediately; adds and deletes only
//! change the card once the backend has answered. Each dispatched mutation
//! takes a per-task ticket and only the response to the latest ticket is
//! allowed to re-render the card.

use tracing::debug;

use crate::board::BoardError;
use crate::sync::{OptimisticMutation, Outcome, SyncError, SyncRequest};
use crate::types::{SubtaskId, Task, TaskId};
use crate::view::BoardView;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ToggleSubtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AddSubtask {
    pub task_id: TaskId,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeleteSubtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
}

impl AddSubtask {
    pub fn new(task_id: TaskId, title: impl Into<String>) -> Self {
        Self {
            task_id,
            title: title.into(),
        }
    }
}

fn settle_response(
    view: &mut BoardView,
    task_id: TaskId,
    ticket: u64,
    task: Option<Task>,
) -> Outcome {
    let Some(task) = task else {
        return Outcome::Confirmed;
    };

    if !view.is_latest_ticket(task_id, ticket) {
        debug!(task_id, ticket, "dropping response superseded by a newer subtask mutation");
        return Outcome::Superseded;
    }

    if task.id != task_id {
        let err = SyncError::Malformed(format!(
            "expected task {task_id} in response, got task {}",
            task.id
        ));
        view.request_reload();
        return Outcome::RolledBack(err);
    }

    match view.reconcile_task(task) {
        Some(markup) => Outcome::Rendered(markup),
        None => Outcome::Superseded,
    }
}

impl OptimisticMutation for ToggleSubtask {
    type Undo = u64;

    fn request(&self) -> SyncRequest {
        SyncRequest::ToggleSubtask {
            task_id: self.task_id,
            subtask_id: self.subtask_id,
        }
    }

    fn apply(&self, view: &mut BoardView) -> Result<u64, BoardError> {
        view.flip_subtask(self.task_id, self.subtask_id)?;
        Ok(view.issue_ticket(self.task_id))
    }

    fn reconcile(&self, view: &mut BoardView, ticket: u64, task: Option<Task>) -> Outcome {
        settle_response(view, self.task_id, ticket, task)
    }

    // The flipped checkbox is left as is; the reload replaces it.
    fn rollback(&self, _view: &mut BoardView, _ticket: u64) {}
}

impl OptimisticMutation for AddSubtask {
    type Undo = u64;

    fn request(&self) -> SyncRequest {
        SyncRequest::AddSubtask {
            task_id: self.task_id,
            title: self.title.trim().to_string(),
        }
    }

    fn apply(&self, view: &mut BoardView) -> Result<u64, BoardError> {
        if self.title.trim().is_empty() {
            return Err(BoardError::EmptySubtaskTitle);
        }
        view.ensure_card(self.task_id)?;
        Ok(view.issue_ticket(self.task_id))
    }

    fn reconcile(&self, view: &mut BoardView, ticket: u64, task: Option<Task>) -> Outcome {
        settle_response(view, self.task_id, ticket, task)
    }

    fn rollback(&self, _view: &mut BoardView, _ticket: u64) {}
}

impl OptimisticMutation for DeleteSubtask {
    type Undo = u64;

    fn request(&self) -> SyncRequest {
        SyncRequest::DeleteSubtask {
            task_id: self.task_id,
            subtask_id: self.subtask_id,
        }
    }

    fn apply(&self, view: &mut BoardView) -> Result<u64, BoardError> {
        let card = view.ensure_card(self.task_id)?;
        if card.task.subtask(self.subtask_id).is_none() {
            return Err(BoardError::UnknownSubtask {
                task_id: self.task_id,
                subtask_id: self.subtask_id,
            });
        }
        Ok(view.issue_ticket(self.task_id))
    }

    fn reconcile(&self, view: &mut BoardView, ticket: u64, task: Option<Task>) -> Outcome {
        settle_response(view, self.task_id, ticket, task)
    }

    fn rollback(&self, _view: &mut BoardView, _ticket: u64) {}
}
