//! Card markup for the subtask section of a task card.
//!
//! Rendering is a pure function of the task payload so that repeated
//! re-renders (one per confirmed subtask mutation) yield identical output.

use crate::types::{Subtask, Task, TaskId};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CardMarkup {
    /// Absent when the task has no subtasks.
    pub progress: Option<String>,
    pub subtask_list: String,
}

pub fn render(task: &Task) -> CardMarkup {
    let (done, total) = task.subtask_progress();

    let mut subtask_list = String::from("<ul class=\"subtask-list\">");
    for subtask in &task.subtasks {
        subtask_list.push_str(&render_subtask(task.id, subtask));
    }
    subtask_list.push_str("</ul>");
    subtask_list.push_str(&render_add_form(task.id));

    CardMarkup {
        progress: render_progress(done, total),
        subtask_list,
    }
}

/// `round(100 * done / total)` with halves rounded up; `None` for an empty list.
pub fn progress_percent(done: usize, total: usize) -> Option<usize> {
    if total == 0 {
        return None;
    }
    Some((200 * done + total) / (2 * total))
}

fn render_progress(done: usize, total: usize) -> Option<String> {
    let percent = progress_percent(done, total)?;
    Some(format!(
        "<div class=\"task-progress\" title=\"{done}/{total} subtasks done\">\
         <div class=\"task-progress-bar\" style=\"width:{percent}%\"></div>\
         <span class=\"task-progress-text\">{done}/{total}</span>\
         </div>"
    ))
}

fn render_subtask(task_id: TaskId, subtask: &Subtask) -> String {
    let (done_class, check, label) = if subtask.done {
        (" subtask-done", "✓", "Mark incomplete")
    } else {
        ("", "", "Mark done")
    };
    let subtask_id = subtask.id;
    let title = escape_html(&subtask.title);

    format!(
        "<li class=\"subtask-item{done_class}\">\
         <form method=\"post\" action=\"/task/{task_id}/subtask/{subtask_id}/toggle\" class=\"subtask-toggle-form\">\
         <button type=\"submit\" class=\"subtask-checkbox\" title=\"{label}\" aria-label=\"{label}\">{check}</button>\
         </form>\
         <span class=\"subtask-title\">{title}</span>\
         <form method=\"post\" action=\"/task/{task_id}/subtask/{subtask_id}/delete\" class=\"subtask-delete-form\">\
         <button type=\"submit\" class=\"subtask-delete\" title=\"Remove subtask\">×</button>\
         </form>\
         </li>"
    )
}

fn render_add_form(task_id: TaskId) -> String {
    format!(
        "<form method=\"post\" action=\"/task/{task_id}/subtask\" class=\"subtask-add-form\">\
         <input type=\"text\" name=\"title\" placeholder=\"Add subtask…\" class=\"subtask-add-input\">\
         <button type=\"submit\" class=\"subtask-add-btn\">Add</button>\
         </form>"
    )
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
