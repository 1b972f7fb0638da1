//! Client-side optimistic mutation and synchronization for a task board.
//!
//! A [`view::BoardView`] holds the client's working copy of the board.
//! Drags, status picks and subtask edits change it immediately and are then
//! confirmed, re-rendered or rolled back by [`sync::SyncClient`].

pub mod board;
pub mod cli;
pub mod drag;
pub mod drop;
pub mod logging;
pub mod quick_change;
pub mod render;
pub mod settings;
pub mod subtasks;
pub mod sync;
pub mod types;
pub mod view;
