use tracing::debug;

use crate::types::{Status, TaskId};

/// Part of a card a pointer gesture started on.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CardRegion {
    Body,
    ActionMenu,
    DeleteControl,
    SubtaskList,
    CollapseToggle,
    CodeLink,
}

impl CardRegion {
    /// Interactive sub-regions keep their own click handling and never start a drag.
    pub fn starts_drag(self) -> bool {
        matches!(self, CardRegion::Body | CardRegion::CodeLink)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DragSession {
    pub task_id: TaskId,
    pub source: Status,
    /// Column the insertion point was last computed against.
    pub hovered_column: Option<Status>,
    /// Last computed insertion point, relative to `hovered_column` with the
    /// dragged card left out. `None` until the pointer has moved over a column.
    pub insertion_index: Option<usize>,
}

impl DragSession {
    pub fn new(task_id: TaskId, source: Status) -> Self {
        Self {
            task_id,
            source,
            hovered_column: None,
            insertion_index: None,
        }
    }

    /// The insertion point, if it was computed against `target`.
    pub fn insertion_index_for(&self, target: Status) -> Option<usize> {
        self.insertion_index
            .filter(|_| self.hovered_column == Some(target))
    }
}

/// Holds the single in-progress drag gesture, if any.
#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a session unless the gesture began on an excluded region.
    /// A leftover session from an unfinished gesture is replaced.
    pub fn begin(&mut self, task_id: TaskId, source: Status, region: CardRegion) -> bool {
        if !region.starts_drag() {
            debug!(task_id, ?region, "drag start ignored on interactive card region");
            return false;
        }

        if let Some(stale) = self.session.replace(DragSession::new(task_id, source)) {
            debug!(
                stale_task_id = stale.task_id,
                task_id, "discarding stale drag session"
            );
        }
        true
    }

    /// Recomputes the insertion point while the pointer moves over a column.
    ///
    /// `column_cards` is `column`'s current order. The index is the hovered
    /// card's position among the other cards; when no card is hovered (or the
    /// dragged card itself is) the point is the end of the list.
    pub fn update_insertion_point(
        &mut self,
        column: Status,
        hovered: Option<TaskId>,
        column_cards: &[TaskId],
    ) -> Option<usize> {
        let session = self.session.as_mut()?;
        let dragged = session.task_id;

        let others = column_cards.iter().filter(|id| **id != dragged);
        let remaining = others.clone().count();
        let index = hovered
            .filter(|id| *id != dragged)
            .and_then(|hovered| others.clone().position(|id| *id == hovered))
            .unwrap_or(remaining);

        session.hovered_column = Some(column);
        session.insertion_index = Some(index);
        Some(index)
    }

    /// Hands the session over to the drop resolver.
    pub fn take(&mut self) -> Option<DragSession> {
        self.session.take()
    }

    /// Clears the session regardless of how the gesture ended.
    pub fn end(&mut self) -> Option<DragSession> {
        self.session.take()
    }
}
