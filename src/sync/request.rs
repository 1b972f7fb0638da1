use crate::types::{Status, SubtaskId, TaskId};

/// Header pair marking a request as programmatic so the backend answers with
/// JSON instead of a redirect.
pub const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");
pub const ACCEPT_JSON: (&str, &str) = ("Accept", "application/json");
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// How a 2xx response body is treated.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BodyPolicy {
    /// Anything (including nothing) is accepted and ignored.
    Optional,
    /// Must parse as a task payload.
    Task,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SyncRequest {
    ChangeStatus {
        task_id: TaskId,
        status: Status,
    },
    Reorder {
        status: Status,
        order: Vec<TaskId>,
    },
    FetchTask {
        task_id: TaskId,
    },
    AddSubtask {
        task_id: TaskId,
        title: String,
    },
    ToggleSubtask {
        task_id: TaskId,
        subtask_id: SubtaskId,
    },
    DeleteSubtask {
        task_id: TaskId,
        subtask_id: SubtaskId,
    },
}

impl SyncRequest {
    pub fn label(&self) -> &'static str {
        match self {
            SyncRequest::ChangeStatus { .. } => "change status",
            SyncRequest::Reorder { .. } => "reorder column",
            SyncRequest::FetchTask { .. } => "fetch task",
            SyncRequest::AddSubtask { .. } => "add subtask",
            SyncRequest::ToggleSubtask { .. } => "toggle subtask",
            SyncRequest::DeleteSubtask { .. } => "delete subtask",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            SyncRequest::FetchTask { .. } => Method::Get,
            _ => Method::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            SyncRequest::ChangeStatus { task_id, .. } => format!("/task/{task_id}/status"),
            SyncRequest::Reorder { .. } => "/task/reorder".to_string(),
            SyncRequest::FetchTask { task_id } => format!("/task/{task_id}"),
            SyncRequest::AddSubtask { task_id, .. } => format!("/task/{task_id}/subtask"),
            SyncRequest::ToggleSubtask {
                task_id,
                subtask_id,
            } => format!("/task/{task_id}/subtask/{subtask_id}/toggle"),
            SyncRequest::DeleteSubtask {
                task_id,
                subtask_id,
            } => format!("/task/{task_id}/subtask/{subtask_id}/delete"),
        }
    }

    pub fn body_policy(&self) -> BodyPolicy {
        match self {
            SyncRequest::ChangeStatus { .. } | SyncRequest::Reorder { .. } => BodyPolicy::Optional,
            _ => BodyPolicy::Task,
        }
    }

    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            SyncRequest::ChangeStatus { status, .. } => {
                vec![("status", status.as_str().to_string())]
            }
            SyncRequest::Reorder { status, order } => vec![
                ("status", status.as_str().to_string()),
                ("order", join_ids(order)),
            ],
            SyncRequest::AddSubtask { title, .. } => vec![("title", title.clone())],
            SyncRequest::FetchTask { .. }
            | SyncRequest::ToggleSubtask { .. }
            | SyncRequest::DeleteSubtask { .. } => Vec::new(),
        }
    }

    /// `application/x-www-form-urlencoded` body; empty for field-less requests.
    pub fn form_body(&self) -> String {
        self.form_fields()
            .iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

pub fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
