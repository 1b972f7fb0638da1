//! The client's working copy of the board: column order, per-card state and
//! the in-progress drag gesture. Everything a user sees is derived from here.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::board::{Board, BoardError};
use crate::drag::{CardRegion, DragController};
use crate::drop::{DropPlan, DropResolver};
use crate::render::{CardMarkup, render};
use crate::types::{Status, SubtaskId, Task, TaskId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Card {
    pub task: Task,
    /// Current value of the card's status-selector control.
    pub selector: Status,
    pub markup: CardMarkup,
}

impl Card {
    fn new(task: Task) -> Self {
        let markup = render(&task);
        Self {
            selector: task.status,
            task,
            markup,
        }
    }
}

/// Where a moved card came from, enough to put it back.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MoveUndo {
    pub task_id: TaskId,
    pub column: Status,
    pub index: usize,
    pub selector: Status,
    /// Board generation the move was made against.
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct BoardView {
    board: Board,
    cards: HashMap<TaskId, Card>,
    drag: DragController,
    subtask_tickets: HashMap<TaskId, u64>,
    next_ticket: u64,
    /// Bumped by every reload. Undo records from an older generation no
    /// longer describe the board and are discarded.
    generation: u64,
    reload_requested: bool,
}

impl BoardView {
    /// Builds the working copy from a backend snapshot, ordering each column
    /// by the stored order and then by id.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut view = Self::default();
        view.populate(tasks);
        view
    }

    fn populate(&mut self, mut tasks: Vec<Task>) {
        tasks.sort_by_key(|task| {
            (
                task.status.column_index(),
                task.order
                    .unwrap_or_else(|| i64::try_from(task.id).unwrap_or(i64::MAX)),
                task.id,
            )
        });

        for task in tasks {
            if let Err(err) = self.board.push(task.status, task.id) {
                warn!("skipping task from snapshot: {err}");
                continue;
            }
            self.cards.insert(task.id, Card::new(task));
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn card(&self, task_id: TaskId) -> Option<&Card> {
        self.cards.get(&task_id)
    }

    pub fn column_ids(&self, status: Status) -> &[TaskId] {
        self.board.column(status).task_ids()
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reload_requested(&self) -> bool {
        self.reload_requested
    }

    pub fn request_reload(&mut self) {
        if !self.reload_requested {
            info!("board reload requested");
        }
        self.reload_requested = true;
    }

    /// Discards all client state and rebuilds it from a fresh snapshot.
    pub fn reload(&mut self, tasks: Vec<Task>) {
        let next_ticket = self.next_ticket;
        let generation = self.generation;
        *self = Self::default();
        // Tickets stay monotonic so responses to requests issued before the
        // reload can never pass for current ones.
        self.next_ticket = next_ticket;
        self.generation = generation + 1;
        self.populate(tasks);
        debug!(tasks = self.board.task_count(), "board reloaded");
    }

    pub fn begin_drag(&mut self, task_id: TaskId, region: CardRegion) -> Result<bool, BoardError> {
        let (source, _) = self
            .board
            .locate(task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        Ok(self.drag.begin(task_id, source, region))
    }

    /// Pointer moved over `column`, optionally over one of its cards.
    pub fn hover(&mut self, column: Status, hovered: Option<TaskId>) -> Option<usize> {
        let cards = self.board.column(column).task_ids();
        self.drag.update_insertion_point(column, hovered, cards)
    }

    /// Resolves a release over `column`. The drag session ends whether or not
    /// the drop resolves to a move.
    pub fn drop_on(&mut self, column: Status) -> Result<Option<DropPlan>, BoardError> {
        let Some(session) = self.drag.take() else {
            return Ok(None);
        };
        DropResolver::resolve(&session, column, &self.board).map(Some)
    }

    pub fn end_drag(&mut self) {
        self.drag.end();
    }

    /// Moves a card to `target` at the clamped `index` and keeps its status
    /// selector in step with the column it now sits in.
    pub(crate) fn move_card(
        &mut self,
        task_id: TaskId,
        target: Status,
        index: usize,
    ) -> Result<MoveUndo, BoardError> {
        let card = self
            .cards
            .get_mut(&task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        let (column, original_index) = self.board.move_task(task_id, target, index)?;

        let undo = MoveUndo {
            task_id,
            column,
            index: original_index,
            selector: card.selector,
            generation: self.generation,
        };
        card.selector = target;
        card.task.status = target;
        Ok(undo)
    }

    pub(crate) fn restore_card(&mut self, undo: MoveUndo) {
        if undo.generation != self.generation {
            debug!(
                task_id = undo.task_id,
                "board reloaded since the move; skipping rollback"
            );
            return;
        }
        if self.board.detach(undo.task_id).is_none() {
            warn!(task_id = undo.task_id, "card vanished before rollback");
            return;
        }
        if let Err(err) = self.board.insert(undo.column, undo.index, undo.task_id) {
            warn!("failed to restore card {}: {err}", undo.task_id);
            return;
        }
        if let Some(card) = self.cards.get_mut(&undo.task_id) {
            card.selector = undo.selector;
            card.task.status = undo.column;
        }
    }

    /// Flips a subtask locally and re-renders the card from the flipped state.
    pub(crate) fn flip_subtask(
        &mut self,
        task_id: TaskId,
        subtask_id: SubtaskId,
    ) -> Result<(), BoardError> {
        let card = self
            .cards
            .get_mut(&task_id)
            .ok_or(BoardError::UnknownTask(task_id))?;
        let subtask = card
            .task
            .subtask_mut(subtask_id)
            .ok_or(BoardError::UnknownSubtask {
                task_id,
                subtask_id,
            })?;
        subtask.done = !subtask.done;
        card.markup = render(&card.task);
        Ok(())
    }

    pub(crate) fn ensure_card(&self, task_id: TaskId) -> Result<&Card, BoardError> {
        self.cards
            .get(&task_id)
            .ok_or(BoardError::UnknownTask(task_id))
    }

    /// Issues the next subtask-mutation ticket for a task.
    pub(crate) fn issue_ticket(&mut self, task_id: TaskId) -> u64 {
        self.next_ticket += 1;
        self.subtask_tickets.insert(task_id, self.next_ticket);
        self.next_ticket
    }

    pub(crate) fn is_latest_ticket(&self, task_id: TaskId, ticket: u64) -> bool {
        self.subtask_tickets.get(&task_id) == Some(&ticket)
    }

    /// Replaces a card's task with the backend's version and re-renders it.
    /// Column membership is owned by the board and left as it is.
    pub(crate) fn reconcile_task(&mut self, task: Task) -> Option<CardMarkup> {
        let card = self.cards.get_mut(&task.id)?;
        let (column, _) = self.board.locate(task.id)?;
        if task.status != column {
            debug!(
                task_id = task.id,
                column = %column,
                reported = %task.status,
                "backend status differs from local column"
            );
        }
        card.markup = render(&task);
        card.task = task;
        Some(card.markup.clone())
    }
}
