use crate::board::{Board, BoardError};
use crate::drag::DragSession;
use crate::sync::{OptimisticMutation, SyncRequest};
use crate::types::{Status, TaskId};
use crate::view::{BoardView, MoveUndo};

/// What a drop turns into once classified against its source column.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DropPlan {
    /// Same column: the full resulting order is sent.
    Reorder {
        task_id: TaskId,
        status: Status,
        index: usize,
        order: Vec<TaskId>,
    },
    /// Different column: only the new status is sent; `index` is where the
    /// card is shown until the backend decides otherwise.
    StatusChange {
        task_id: TaskId,
        from: Status,
        to: Status,
        index: usize,
    },
}

impl DropPlan {
    pub fn task_id(&self) -> TaskId {
        match self {
            DropPlan::Reorder { task_id, .. } | DropPlan::StatusChange { task_id, .. } => *task_id,
        }
    }

    pub fn target(&self) -> Status {
        match self {
            DropPlan::Reorder { status, .. } => *status,
            DropPlan::StatusChange { to, .. } => *to,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DropPlan::Reorder { index, .. } | DropPlan::StatusChange { index, .. } => *index,
        }
    }
}

pub struct DropResolver;

impl DropResolver {
    pub fn resolve(
        session: &DragSession,
        target: Status,
        board: &Board,
    ) -> Result<DropPlan, BoardError> {
        let task_id = session.task_id;
        if !board.contains(task_id) {
            return Err(BoardError::UnknownTask(task_id));
        }

        let target_ids = board.column(target).task_ids();
        let remaining = target_ids.iter().filter(|id| **id != task_id).count();
        let index = session
            .insertion_index_for(target)
            .unwrap_or(remaining)
            .min(remaining);

        if target == session.source {
            Ok(DropPlan::Reorder {
                task_id,
                status: target,
                index,
                order: reorder(target_ids, task_id, index),
            })
        } else {
            Ok(DropPlan::StatusChange {
                task_id,
                from: session.source,
                to: target,
                index,
            })
        }
    }
}

/// `order` with `dragged` removed (if present) and reinserted at `index`,
/// clamped to the end of the remaining list.
pub fn reorder(order: &[TaskId], dragged: TaskId, index: usize) -> Vec<TaskId> {
    let mut next: Vec<TaskId> = order.iter().copied().filter(|id| *id != dragged).collect();
    let index = index.min(next.len());
    next.insert(index, dragged);
    next
}

impl OptimisticMutation for DropPlan {
    type Undo = MoveUndo;

    fn request(&self) -> SyncRequest {
        match self {
            DropPlan::Reorder { status, order, .. } => SyncRequest::Reorder {
                status: *status,
                order: order.clone(),
            },
            DropPlan::StatusChange { task_id, to, .. } => SyncRequest::ChangeStatus {
                task_id: *task_id,
                status: *to,
            },
        }
    }

    fn apply(&self, view: &mut BoardView) -> Result<MoveUndo, BoardError> {
        view.move_card(self.task_id(), self.target(), self.index())
    }

    fn rollback(&self, view: &mut BoardView, undo: MoveUndo) {
        view.restore_card(undo);
    }
}
