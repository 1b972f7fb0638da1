use std::collections::HashSet;
use std::fmt;

use crate::types::{Status, SubtaskId, TaskId};

/// Local precondition failures. When one of these is returned nothing has
/// been applied and nothing is sent to the backend.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BoardError {
    UnknownTask(TaskId),
    UnknownSubtask {
        task_id: TaskId,
        subtask_id: SubtaskId,
    },
    DuplicateTask(TaskId),
    EmptySubtaskTitle,
}

impl BoardError {
    pub fn code(&self) -> &'static str {
        match self {
            BoardError::UnknownTask(_) => "TASK_NOT_ON_BOARD",
            BoardError::UnknownSubtask { .. } => "SUBTASK_NOT_ON_CARD",
            BoardError::DuplicateTask(_) => "DUPLICATE_TASK",
            BoardError::EmptySubtaskTitle => "SUBTASK_TITLE_REQUIRED",
        }
    }
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::UnknownTask(task_id) => write!(f, "task {task_id} is not on the board"),
            BoardError::UnknownSubtask {
                task_id,
                subtask_id,
            } => write!(f, "task {task_id} has no subtask {subtask_id}"),
            BoardError::DuplicateTask(task_id) => {
                write!(f, "task {task_id} appears in more than one column slot")
            }
            BoardError::EmptySubtaskTitle => f.write_str("subtask title is required"),
        }
    }
}

impl std::error::Error for BoardError {}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Column {
    status: Status,
    task_ids: Vec<TaskId>,
}

impl Column {
    fn new(status: Status) -> Self {
        Self {
            status,
            task_ids: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    pub fn len(&self) -> usize {
        self.task_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
    }

    pub fn position(&self, task_id: TaskId) -> Option<usize> {
        self.task_ids.iter().position(|id| *id == task_id)
    }
}

/// Ordered task ids per status column. Order is expressed only by position
/// in each column; a task lives in exactly one column.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Board {
    columns: Vec<Column>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            columns: Status::ALL.iter().copied().map(Column::new).collect(),
        }
    }
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, status: Status) -> &Column {
        &self.columns[status.column_index()]
    }

    fn column_mut(&mut self, status: Status) -> &mut Column {
        &mut self.columns[status.column_index()]
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(Column::len).sum()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.locate(task_id).is_some()
    }

    pub fn locate(&self, task_id: TaskId) -> Option<(Status, usize)> {
        self.columns.iter().find_map(|column| {
            column
                .position(task_id)
                .map(|index| (column.status, index))
        })
    }

    pub fn push(&mut self, status: Status, task_id: TaskId) -> Result<(), BoardError> {
        if self.contains(task_id) {
            return Err(BoardError::DuplicateTask(task_id));
        }
        self.column_mut(status).task_ids.push(task_id);
        Ok(())
    }

    /// Removes the task from whichever column holds it, returning where it was.
    pub fn detach(&mut self, task_id: TaskId) -> Option<(Status, usize)> {
        let (status, index) = self.locate(task_id)?;
        self.column_mut(status).task_ids.remove(index);
        Some((status, index))
    }

    /// Inserts a detached task at `index`, clamped to the column length.
    /// Returns the index actually used.
    pub fn insert(
        &mut self,
        status: Status,
        index: usize,
        task_id: TaskId,
    ) -> Result<usize, BoardError> {
        if self.contains(task_id) {
            return Err(BoardError::DuplicateTask(task_id));
        }
        let column = self.column_mut(status);
        let index = index.min(column.task_ids.len());
        column.task_ids.insert(index, task_id);
        Ok(index)
    }

    /// Moves a task to `target` at the clamped `index`. Returns the origin.
    pub fn move_task(
        &mut self,
        task_id: TaskId,
        target: Status,
        index: usize,
    ) -> Result<(Status, usize), BoardError> {
        let origin = self
            .detach(task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        self.insert(target, index, task_id)?;
        Ok(origin)
    }

    pub fn check_membership(&self) -> Result<(), BoardError> {
        let mut seen = HashSet::new();
        for task_id in self.columns.iter().flat_map(|column| column.task_ids.iter()) {
            if !seen.insert(*task_id) {
                return Err(BoardError::DuplicateTask(*task_id));
            }
        }
        Ok(())
    }
}
