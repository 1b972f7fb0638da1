use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

pub type TaskId = u64;
pub type SubtaskId = u64;

/// Workflow column key. The board always has exactly one column per variant,
/// laid out in [`Status::ALL`] order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum Status {
    #[default]
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in progress",
            Status::Done => "done",
        }
    }

    pub fn column_index(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Coding,
    Debugging,
    Learning,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Coding => "coding",
            TaskType::Debugging => "debugging",
            TaskType::Learning => "learning",
        }
    }

    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debugging" => TaskType::Debugging,
            "learning" => TaskType::Learning,
            _ => TaskType::Coding,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_task_type<'de, D>(deserializer: D) -> Result<TaskType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(TaskType::from_raw).unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Subtask {
    pub id: SubtaskId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Task payload as returned by the backend. Only `id`, `status` and
/// `subtasks` take part in synchronization; the rest is carried through
/// re-renders untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code_snippet: String,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocking_reason: String,
    #[serde(default)]
    pub in_sprint: bool,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, deserialize_with = "lenient_task_type")]
    pub task_type: TaskType,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, status: Status) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            context: String::new(),
            status,
            subtasks: Vec::new(),
            due_date: None,
            code_link: String::new(),
            code_snippet: String::new(),
            blocked: false,
            blocking_reason: String::new(),
            in_sprint: false,
            order: None,
            task_type: TaskType::Coding,
        }
    }

    pub fn subtask(&self, subtask_id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|subtask| subtask.id == subtask_id)
    }

    pub fn subtask_mut(&mut self, subtask_id: SubtaskId) -> Option<&mut Subtask> {
        self.subtasks
            .iter_mut()
            .find(|subtask| subtask.id == subtask_id)
    }

    /// `(done, total)` subtask counts.
    pub fn subtask_progress(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|subtask| subtask.done).count();
        (done, self.subtasks.len())
    }

    pub fn code_link_is_url(&self) -> bool {
        let link = self.code_link.trim();
        link.starts_with("http://") || link.starts_with("https://")
    }
}
