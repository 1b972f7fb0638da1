use std::str::FromStr;
use std::sync::Mutex;

use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    board::BoardError,
    quick_change::QuickChange,
    render::{progress_percent, render},
    subtasks::{AddSubtask, DeleteSubtask, ToggleSubtask},
    sync::{
        OptimisticMutation, Outcome, SyncClient, SyncError, SyncRequest, Transport, join_ids,
        lock_view,
    },
    types::{Status, SubtaskId, Task, TaskId},
    view::BoardView,
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TaskCommand {
    /// Fetch one task from the backend.
    Show(TaskShowArgs),
    /// Change a task's status; the card moves to the end of the new column.
    Status(TaskStatusArgs),
    /// Persist the full order of one column.
    Reorder(TaskReorderArgs),
    /// Open the task's code link.
    OpenLink(TaskIdArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubtaskCommand {
    Add(SubtaskAddArgs),
    Toggle(SubtaskTargetArgs),
    Delete(SubtaskTargetArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TaskIdArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: TaskId,
}

#[derive(Debug, Clone, Args)]
pub struct TaskShowArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: TaskId,

    /// Print the rendered card markup instead of a summary.
    #[arg(long)]
    pub markup: bool,
}

#[derive(Debug, Clone, Args)]
pub struct TaskStatusArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub id: TaskId,

    #[arg(long, value_name = "STATUS", value_parser = parse_status)]
    pub status: Status,
}

#[derive(Debug, Clone, Args)]
pub struct TaskReorderArgs {
    #[arg(long, value_name = "STATUS", value_parser = parse_status)]
    pub status: Status,

    #[arg(long, value_name = "IDS", value_delimiter = ',', required = true)]
    pub order: Vec<TaskId>,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskAddArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub task: TaskId,

    #[arg(long, value_name = "TEXT")]
    pub title: String,
}

#[derive(Debug, Clone, Args)]
pub struct SubtaskTargetArgs {
    #[arg(long, value_name = "TASK_ID")]
    pub task: TaskId,

    #[arg(long, value_name = "SUBTASK_ID")]
    pub subtask: SubtaskId,
}

fn parse_status(raw: &str) -> Result<Status, String> {
    Status::from_str(raw).map_err(|()| {
        format!(
            "unknown status '{raw}' (expected one of: {})",
            Status::ALL.map(Status::as_str).join(", ")
        )
    })
}

pub async fn run<T: Transport>(
    client: &SyncClient<T>,
    server: &str,
    command: RootCommand,
    json_output: bool,
    quiet: bool,
) -> i32 {
    match execute(client, server, command).await {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

#[derive(Debug)]
struct CommandOutput {
    command: &'static str,
    server: String,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

async fn execute<T: Transport>(
    client: &SyncClient<T>,
    server: &str,
    command: RootCommand,
) -> CliResult<CommandOutput> {
    let (command, data, text) = match command {
        RootCommand::Task { command } => match command {
            TaskCommand::Show(args) => task_show(client, args).await?,
            TaskCommand::Status(args) => task_status(client, args).await?,
            TaskCommand::Reorder(args) => task_reorder(client, args).await?,
            TaskCommand::OpenLink(args) => task_open_link(client, args).await?,
        },
        RootCommand::Subtask { command } => match command {
            SubtaskCommand::Add(args) => {
                let mutation = AddSubtask::new(args.task, args.title);
                subtask_mutation(client, "subtask add", args.task, mutation).await?
            }
            SubtaskCommand::Toggle(args) => {
                let mutation = ToggleSubtask {
                    task_id: args.task,
                    subtask_id: args.subtask,
                };
                subtask_mutation(client, "subtask toggle", args.task, mutation).await?
            }
            SubtaskCommand::Delete(args) => {
                let mutation = DeleteSubtask {
                    task_id: args.task,
                    subtask_id: args.subtask,
                };
                subtask_mutation(client, "subtask delete", args.task, mutation).await?
            }
        },
    };

    Ok(CommandOutput {
        command,
        server: server.to_string(),
        data,
        text,
    })
}

/// Command name, JSON data and text output of one command.
type CommandParts = (&'static str, Value, String);

async fn task_show<T: Transport>(
    client: &SyncClient<T>,
    args: TaskShowArgs,
) -> CliResult<CommandParts> {
    let task = client.fetch_task(args.id).await.map_err(sync_error)?;
    let markup = render(&task);

    let text = if args.markup {
        let mut text = markup.progress.clone().unwrap_or_default();
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&markup.subtask_list);
        text
    } else {
        render_task_text(&task)
    };

    let data = json!({
        "task": task,
        "markup": {
            "progress": markup.progress,
            "subtask_list": markup.subtask_list,
        }
    });
    Ok(("task show", data, text))
}

fn render_task_text(task: &Task) -> String {
    let (done, total) = task.subtask_progress();
    let progress = match progress_percent(done, total) {
        Some(percent) => format!("{done}/{total} ({percent}%)"),
        None => "-".to_string(),
    };
    let code_link = if task.code_link.trim().is_empty() {
        "-".to_string()
    } else {
        task.code_link.clone()
    };

    let rows = vec![
        vec!["ID".to_string(), task.id.to_string()],
        vec!["Title".to_string(), task.title.replace('\n', " ")],
        vec!["Status".to_string(), task.status.to_string()],
        vec!["Type".to_string(), task.task_type.as_str().to_string()],
        vec!["Subtasks".to_string(), progress],
        vec!["Code link".to_string(), code_link],
    ];
    let mut text = render_text_table(&["Field", "Value"], &rows);

    if !task.subtasks.is_empty() {
        let rows = task
            .subtasks
            .iter()
            .map(|subtask| {
                vec![
                    subtask.id.to_string(),
                    if subtask.done { "x" } else { " " }.to_string(),
                    subtask.title.replace('\n', " "),
                ]
            })
            .collect::<Vec<_>>();
        text.push('\n');
        text.push_str(&render_text_table(&["ID", "Done", "Subtask"], &rows));
    }

    text
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let mut lines = vec![border.clone(), table_line(headers, &widths), border.clone()];
    for row in rows {
        let cells = row.iter().map(String::as_str).collect::<Vec<_>>();
        lines.push(table_line(&cells, &widths));
    }
    lines.push(border);
    lines.join("\n")
}

fn table_line(cells: &[&str], widths: &[usize]) -> String {
    let padded = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect::<Vec<_>>();
    format!("| {} |", padded.join(" | "))
}

/// Runs one mutation against a single-card view seeded from the backend's
/// current copy of the task.
async fn mutate_single<T: Transport, M: OptimisticMutation>(
    client: &SyncClient<T>,
    task_id: TaskId,
    mutation: M,
) -> CliResult<(Outcome, Mutex<BoardView>)> {
    let task = client.fetch_task(task_id).await.map_err(sync_error)?;
    let view = Mutex::new(BoardView::from_tasks(vec![task]));

    let outcome = client
        .mutate(&view, mutation)
        .await
        .map_err(board_error)?;
    match outcome {
        Outcome::RolledBack(err) => Err(sync_error(err)),
        outcome => Ok((outcome, view)),
    }
}

async fn task_status<T: Transport>(
    client: &SyncClient<T>,
    args: TaskStatusArgs,
) -> CliResult<CommandParts> {
    mutate_single(client, args.id, QuickChange::new(args.id, args.status)).await?;
    info!(task_id = args.id, status = %args.status, "status changed");

    let data = json!({ "task_id": args.id, "status": args.status });
    Ok((
        "task status",
        data,
        format!("moved task {} to {}", args.id, args.status),
    ))
}

async fn task_reorder<T: Transport>(
    client: &SyncClient<T>,
    args: TaskReorderArgs,
) -> CliResult<CommandParts> {
    if let Some(duplicate) = first_duplicate(&args.order) {
        return Err(usage_error(
            "DUPLICATE_TASK",
            format!("task {duplicate} appears more than once in --order"),
        ));
    }

    client
        .dispatch(&SyncRequest::Reorder {
            status: args.status,
            order: args.order.clone(),
        })
        .await
        .map_err(sync_error)?;

    let data = json!({ "status": args.status, "order": args.order });
    Ok((
        "task reorder",
        data,
        format!("reordered {}: {}", args.status, join_ids(&args.order)),
    ))
}

fn first_duplicate(ids: &[TaskId]) -> Option<TaskId> {
    ids.iter()
        .enumerate()
        .find(|(index, id)| ids[..*index].contains(id))
        .map(|(_, id)| *id)
}

async fn task_open_link<T: Transport>(
    client: &SyncClient<T>,
    args: TaskIdArgs,
) -> CliResult<CommandParts> {
    let task = client.fetch_task(args.id).await.map_err(sync_error)?;
    let link = task.code_link.trim().to_string();
    if link.is_empty() {
        return Err(not_found_error(
            "CODE_LINK_MISSING",
            format!("task {} has no code link", args.id),
        ));
    }

    let opened = task.code_link_is_url();
    if opened {
        open::that(&link).map_err(|err| runtime_error(format!("failed to open {link}: {err}")))?;
    }

    let data = json!({ "task_id": args.id, "code_link": link, "opened": opened });
    Ok(("task open-link", data, link))
}

async fn subtask_mutation<T: Transport, M: OptimisticMutation>(
    client: &SyncClient<T>,
    command: &'static str,
    task_id: TaskId,
    mutation: M,
) -> CliResult<CommandParts> {
    let (outcome, view) = mutate_single(client, task_id, mutation).await?;
    if outcome == Outcome::Superseded {
        return Err(runtime_error(format!(
            "response for task {task_id} was superseded"
        )));
    }

    let view = lock_view(&view);
    let card = view
        .card(task_id)
        .ok_or_else(|| runtime_error(format!("task {task_id} vanished from the board")))?;
    let (done, total) = card.task.subtask_progress();

    let data = json!({
        "task": card.task,
        "progress": { "done": done, "total": total, "percent": progress_percent(done, total) },
    });
    let text = match progress_percent(done, total) {
        Some(percent) => format!("task {task_id}: {done}/{total} subtasks done ({percent}%)"),
        None => format!("task {task_id}: no subtasks"),
    };
    Ok((command, data, text))
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn rejected_error(
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn sync_error(err: SyncError) -> CliError {
    match err {
        SyncError::Rejected { status: 404 } => {
            not_found_error("TASK_NOT_FOUND", "task not found on the backend")
        }
        SyncError::Rejected { status } => rejected_error(
            err.code(),
            err.to_string(),
            Some(json!({ "http_status": status })),
        ),
        SyncError::Transport(_) | SyncError::Malformed(_) => CliError {
            code: err.code(),
            ..runtime_error(&err)
        },
    }
}

fn board_error(err: BoardError) -> CliError {
    match err {
        BoardError::EmptySubtaskTitle => usage_error(err.code(), err.to_string()),
        BoardError::UnknownTask(_) | BoardError::UnknownSubtask { .. } => {
            not_found_error(err.code(), err.to_string())
        }
        BoardError::DuplicateTask(_) => CliError {
            code: err.code(),
            ..runtime_error(&err)
        },
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "server": output.server,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{payload}"),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{payload}"),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FakeTransport, ok, status};
    use crate::types::Subtask;

    fn task_with_subtasks() -> Task {
        let mut task = Task::new(9, "Write docs", Status::Todo);
        task.subtasks = vec![
            Subtask {
                id: 1,
                title: "outline".to_string(),
                done: false,
            },
            Subtask {
                id: 2,
                title: "draft".to_string(),
                done: true,
            },
        ];
        task
    }

    fn payload(task: &Task) -> String {
        serde_json::to_string(task).expect("task serializes")
    }

    fn task_command(command: TaskCommand) -> RootCommand {
        RootCommand::Task { command }
    }

    #[test]
    fn parse_status_accepts_wire_keys() {
        assert_eq!(parse_status("in progress"), Ok(Status::InProgress));
        assert_eq!(parse_status("DONE"), Ok(Status::Done));
        let err = parse_status("blocked").expect_err("unknown status");
        assert!(err.contains("todo, in progress, done"));
    }

    #[test]
    fn first_duplicate_finds_repeated_id() {
        assert_eq!(first_duplicate(&[2, 1, 3]), None);
        assert_eq!(first_duplicate(&[2, 1, 2]), Some(2));
    }

    #[test]
    fn sync_errors_map_to_exit_codes() {
        assert_eq!(sync_error(SyncError::Rejected { status: 404 }).exit_code, 3);
        let rejected = sync_error(SyncError::Rejected { status: 400 });
        assert_eq!(rejected.exit_code, 4);
        assert_eq!(rejected.code, "SYNC_REJECTED");
        assert_eq!(rejected.details, Some(json!({ "http_status": 400 })));
        let transport = sync_error(SyncError::Transport("refused".to_string()));
        assert_eq!(transport.exit_code, 5);
        assert_eq!(transport.code, "SYNC_TRANSPORT_FAILED");
    }

    #[test]
    fn board_errors_map_to_exit_codes() {
        assert_eq!(board_error(BoardError::EmptySubtaskTitle).exit_code, 2);
        assert_eq!(
            board_error(BoardError::UnknownSubtask {
                task_id: 1,
                subtask_id: 2
            })
            .exit_code,
            3
        );
    }

    #[test]
    fn task_text_renders_field_table_and_subtasks() {
        let text = render_task_text(&task_with_subtasks());
        assert!(text.contains("| Status    | todo"));
        assert!(text.contains("1/2 (50%)"));
        assert!(text.contains("| 2  | x    | draft"));
    }

    #[test]
    fn text_table_pads_columns_to_widest_cell() {
        let table = render_text_table(
            &["ID", "Title"],
            &[vec!["10".to_string(), "Ship it".to_string()]],
        );
        assert_eq!(
            table,
            "+----+---------+\n| ID | Title   |\n+----+---------+\n| 10 | Ship it |\n+----+---------+"
        );
    }

    #[tokio::test]
    async fn show_missing_task_is_not_found() {
        let client = SyncClient::new(FakeTransport::new(vec![status(404)]));
        let err = execute(
            &client,
            "http://board",
            task_command(TaskCommand::Show(TaskShowArgs {
                id: 3,
                markup: false,
            })),
        )
        .await
        .expect_err("missing task");
        assert_eq!(err.exit_code, 3);
        assert_eq!(err.code, "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn show_markup_prints_progress_and_list() {
        let client = SyncClient::new(FakeTransport::new(vec![ok(&payload(
            &task_with_subtasks(),
        ))]));
        let output = execute(
            &client,
            "http://board",
            task_command(TaskCommand::Show(TaskShowArgs {
                id: 9,
                markup: true,
            })),
        )
        .await
        .expect("show succeeds");

        assert!(output.text.starts_with("<div class=\"task-progress\""));
        assert!(output.text.contains("<ul class=\"subtask-list\">"));
        assert_eq!(output.data["task"]["id"], json!(9));
    }

    #[tokio::test]
    async fn status_fetches_then_posts_change() {
        let client = SyncClient::new(FakeTransport::new(vec![
            ok(&payload(&task_with_subtasks())),
            ok(""),
        ]));
        let output = execute(
            &client,
            "http://board",
            task_command(TaskCommand::Status(TaskStatusArgs {
                id: 9,
                status: Status::Done,
            })),
        )
        .await
        .expect("status change succeeds");

        assert_eq!(output.text, "moved task 9 to done");
        assert_eq!(
            client.transport().requests(),
            vec![
                SyncRequest::FetchTask { task_id: 9 },
                SyncRequest::ChangeStatus {
                    task_id: 9,
                    status: Status::Done
                }
            ]
        );
    }

    #[tokio::test]
    async fn rejected_status_change_exits_with_rejected_code() {
        let client = SyncClient::new(FakeTransport::new(vec![
            ok(&payload(&task_with_subtasks())),
            status(400),
        ]));
        let err = execute(
            &client,
            "http://board",
            task_command(TaskCommand::Status(TaskStatusArgs {
                id: 9,
                status: Status::Done,
            })),
        )
        .await
        .expect_err("rejected");
        assert_eq!(err.exit_code, 4);
    }

    #[tokio::test]
    async fn reorder_rejects_duplicate_ids_without_sending() {
        let client = SyncClient::new(FakeTransport::new(vec![]));
        let err = execute(
            &client,
            "http://board",
            task_command(TaskCommand::Reorder(TaskReorderArgs {
                status: Status::Todo,
                order: vec![1, 2, 1],
            })),
        )
        .await
        .expect_err("duplicate ids");
        assert_eq!(err.exit_code, 2);
        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn open_link_prints_non_url_paths() {
        let mut task = task_with_subtasks();
        task.code_link = "src/lib.rs:42".to_string();
        let client = SyncClient::new(FakeTransport::new(vec![ok(&payload(&task))]));
        let output = execute(
            &client,
            "http://board",
            task_command(TaskCommand::OpenLink(TaskIdArgs { id: 9 })),
        )
        .await
        .expect("link printed");
        assert_eq!(output.text, "src/lib.rs:42");
        assert_eq!(output.data["opened"], json!(false));
    }

    #[tokio::test]
    async fn subtask_toggle_reports_confirmed_progress() {
        let mut confirmed = task_with_subtasks();
        confirmed.subtasks[0].done = true;
        let client = SyncClient::new(FakeTransport::new(vec![
            ok(&payload(&task_with_subtasks())),
            ok(&payload(&confirmed)),
        ]));
        let output = execute(
            &client,
            "http://board",
            RootCommand::Subtask {
                command: SubtaskCommand::Toggle(SubtaskTargetArgs {
                    task: 9,
                    subtask: 1,
                }),
            },
        )
        .await
        .expect("toggle succeeds");

        assert_eq!(output.text, "task 9: 2/2 subtasks done (100%)");
        assert_eq!(output.data["progress"]["percent"], json!(100));
    }

    #[tokio::test]
    async fn subtask_add_with_blank_title_is_usage_error() {
        let client = SyncClient::new(FakeTransport::new(vec![ok(&payload(
            &task_with_subtasks(),
        ))]));
        let err = execute(
            &client,
            "http://board",
            RootCommand::Subtask {
                command: SubtaskCommand::Add(SubtaskAddArgs {
                    task: 9,
                    title: "  ".to_string(),
                }),
            },
        )
        .await
        .expect_err("blank title");
        assert_eq!(err.exit_code, 2);
        assert_eq!(err.code, "SUBTASK_TITLE_REQUIRED");
        assert_eq!(client.transport().requests().len(), 1);
    }
}
