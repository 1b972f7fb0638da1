//! Optimistic synchronization with the task board backend.
//!
//! Every structural edit goes through [`SyncClient::mutate`]: the local effect
//! is applied to the [`BoardView`] first, the request is sent, and the outcome
//! either confirms the optimistic state, re-renders the card from the
//! backend's payload, or rolls back and asks the host to reload the board.
//! The view lock is never held across the network round trip, so several
//! mutations can be in flight at once.

mod http;
mod request;

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::board::BoardError;
use crate::render::CardMarkup;
use crate::types::{Task, TaskId};
use crate::view::BoardView;

pub use http::HttpTransport;
pub use request::{
    ACCEPT_JSON, BodyPolicy, FORM_CONTENT_TYPE, Method, REQUESTED_WITH, SyncRequest, join_ids,
};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a request did not confirm. All variants lead to the same rollback.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SyncError {
    /// The request never completed.
    Transport(String),
    /// The backend answered with a non-2xx status.
    Rejected { status: u16 },
    /// 2xx, but a required task payload was missing or unparsable.
    Malformed(String),
}

impl SyncError {
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Transport(_) => "SYNC_TRANSPORT_FAILED",
            SyncError::Rejected { .. } => "SYNC_REJECTED",
            SyncError::Malformed(_) => "SYNC_MALFORMED_RESPONSE",
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Transport(message) => write!(f, "request failed: {message}"),
            SyncError::Rejected { status } => write!(f, "backend rejected request with HTTP {status}"),
            SyncError::Malformed(message) => write!(f, "malformed task payload: {message}"),
        }
    }
}

impl std::error::Error for SyncError {}

pub trait Transport {
    fn send(
        &self,
        request: &SyncRequest,
    ) -> impl Future<Output = Result<RawResponse, SyncError>> + Send;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// Backend accepted; the optimistic state stands.
    Confirmed,
    /// Backend returned the task and the card was re-rendered from it.
    Rendered(CardMarkup),
    /// A newer mutation for the same task was dispatched after this one; its
    /// response was dropped.
    Superseded,
    /// The local effect was reverted and a board reload was requested.
    RolledBack(SyncError),
}

impl Outcome {
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Outcome::RolledBack(_))
    }
}

/// A structural edit with a local effect, a request and a way back.
pub trait OptimisticMutation {
    /// Whatever `apply` needs to hand to `reconcile` or `rollback`.
    type Undo;

    fn request(&self) -> SyncRequest;

    /// Applies the local effect. On error nothing has changed and nothing is sent.
    fn apply(&self, view: &mut BoardView) -> Result<Self::Undo, BoardError>;

    /// Called after a successful response; `task` is present for task-body requests.
    fn reconcile(&self, view: &mut BoardView, undo: Self::Undo, task: Option<Task>) -> Outcome {
        let _ = (view, undo, task);
        Outcome::Confirmed
    }

    /// Reverts whatever `apply` did. A reload is requested afterwards regardless.
    fn rollback(&self, view: &mut BoardView, undo: Self::Undo);
}

#[derive(Debug, Clone)]
pub struct SyncClient<T = HttpTransport> {
    transport: T,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends one request and applies its body policy. No retries.
    pub async fn dispatch(&self, request: &SyncRequest) -> Result<Option<Task>, SyncError> {
        debug!(
            request = request.label(),
            path = %request.path(),
            "dispatching request"
        );
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(SyncError::Rejected {
                status: response.status,
            });
        }

        match request.body_policy() {
            BodyPolicy::Optional => {
                if serde_json::from_str::<Value>(&response.body).is_err() {
                    debug!(
                        request = request.label(),
                        "ignoring non-JSON body on accepted request"
                    );
                }
                Ok(None)
            }
            BodyPolicy::Task => serde_json::from_str::<Task>(&response.body)
                .map(Some)
                .map_err(|err| SyncError::Malformed(err.to_string())),
        }
    }

    pub async fn fetch_task(&self, task_id: TaskId) -> Result<Task, SyncError> {
        self.dispatch(&SyncRequest::FetchTask { task_id })
            .await?
            .ok_or_else(|| SyncError::Malformed("empty task payload".to_string()))
    }

    /// Applies `mutation` locally, sends it, then confirms, reconciles or rolls back.
    pub async fn mutate<M: OptimisticMutation>(
        &self,
        view: &Mutex<BoardView>,
        mutation: M,
    ) -> Result<Outcome, BoardError> {
        let request = mutation.request();
        let undo = {
            let mut view = lock_view(view);
            mutation.apply(&mut view)?
        };

        let response = self.dispatch(&request).await;

        let mut view = lock_view(view);
        match response {
            Ok(task) => Ok(mutation.reconcile(&mut view, undo, task)),
            Err(err) => {
                warn!(
                    request = request.label(),
                    path = %request.path(),
                    code = err.code(),
                    "mutation failed, rolling back: {err}"
                );
                mutation.rollback(&mut view, undo);
                view.request_reload();
                Ok(Outcome::RolledBack(err))
            }
        }
    }
}

pub fn lock_view(view: &Mutex<BoardView>) -> MutexGuard<'_, BoardView> {
    match view.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{RawResponse, SyncError, SyncRequest, Transport};

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        responses: Mutex<VecDeque<Result<RawResponse, SyncError>>>,
        requests: Mutex<Vec<SyncRequest>>,
    }

    impl FakeTransport {
        pub(crate) fn new(responses: Vec<Result<RawResponse, SyncError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<SyncRequest> {
            self.requests
                .lock()
                .expect("requests mutex should not be poisoned")
                .clone()
        }
    }

    impl Transport for FakeTransport {
        async fn send(&self, request: &SyncRequest) -> Result<RawResponse, SyncError> {
            self.requests
                .lock()
                .expect("requests mutex should not be poisoned")
                .push(request.clone());
            self.responses
                .lock()
                .expect("responses mutex should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(SyncError::Transport("no canned response".to_string())))
        }
    }

    pub(crate) fn ok(body: &str) -> Result<RawResponse, SyncError> {
        Ok(RawResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    pub(crate) fn status(code: u16) -> Result<RawResponse, SyncError> {
        Ok(RawResponse {
            status: code,
            body: "{\"error\":\"rejected\"}".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::{FakeTransport, ok, status};
    use super::*;
    use crate::drag::CardRegion;
    use crate::drop::DropPlan;
    use crate::quick_change::QuickChange;
    use crate::types::Status;

    /// Reloads the shared view from a snapshot while the request is in
    /// flight, then fails the request.
    struct ReloadingTransport {
        view: Arc<Mutex<BoardView>>,
        snapshot: Vec<Task>,
    }

    impl Transport for ReloadingTransport {
        async fn send(&self, _request: &SyncRequest) -> Result<RawResponse, SyncError> {
            lock_view(&self.view).reload(self.snapshot.clone());
            Err(SyncError::Transport("connection reset".to_string()))
        }
    }

    fn view(todo: &[TaskId], done: &[TaskId]) -> Mutex<BoardView> {
        let tasks = todo
            .iter()
            .map(|id| Task::new(*id, format!("t{id}"), Status::Todo))
            .chain(
                done.iter()
                    .map(|id| Task::new(*id, format!("t{id}"), Status::Done)),
            )
            .collect();
        Mutex::new(BoardView::from_tasks(tasks))
    }

    #[tokio::test]
    async fn dispatch_accepts_empty_body_for_status_change() {
        let client = SyncClient::new(FakeTransport::new(vec![ok("")]));
        let result = client
            .dispatch(&SyncRequest::ChangeStatus {
                task_id: 1,
                status: Status::Done,
            })
            .await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn dispatch_rejects_non_2xx() {
        let client = SyncClient::new(FakeTransport::new(vec![status(400)]));
        let result = client
            .dispatch(&SyncRequest::Reorder {
                status: Status::Todo,
                order: vec![1],
            })
            .await;
        assert_eq!(result, Err(SyncError::Rejected { status: 400 }));
    }

    #[tokio::test]
    async fn dispatch_requires_task_payload_for_subtask_requests() {
        let client = SyncClient::new(FakeTransport::new(vec![ok("<html>"), ok("{\"ok\":true}")]));
        let toggle = SyncRequest::ToggleSubtask {
            task_id: 1,
            subtask_id: 1,
        };

        assert!(matches!(
            client.dispatch(&toggle).await,
            Err(SyncError::Malformed(_))
        ));
        assert!(matches!(
            client.dispatch(&toggle).await,
            Err(SyncError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn fetch_task_parses_payload() {
        let client = SyncClient::new(FakeTransport::new(vec![ok(
            r#"{"id": 3, "title": "Read the book", "status": "done", "subtasks": []}"#,
        )]));
        let task = client.fetch_task(3).await.expect("task should parse");
        assert_eq!(task.title, "Read the book");
        assert_eq!(task.status, Status::Done);
    }

    #[tokio::test]
    async fn fetch_task_not_found_is_rejected() {
        let client = SyncClient::new(FakeTransport::new(vec![status(404)]));
        assert_eq!(
            client.fetch_task(3).await,
            Err(SyncError::Rejected { status: 404 })
        );
    }

    #[tokio::test]
    async fn mutate_confirms_and_keeps_optimistic_state() {
        let view = view(&[5], &[7, 8]);
        let client = SyncClient::new(FakeTransport::new(vec![ok("{\"ok\":true}")]));
        let plan = DropPlan::StatusChange {
            task_id: 5,
            from: Status::Todo,
            to: Status::Done,
            index: 1,
        };

        let outcome = client.mutate(&view, plan).await.expect("card exists");

        assert_eq!(outcome, Outcome::Confirmed);
        let view = lock_view(&view);
        assert_eq!(view.column_ids(Status::Done), &[7, 5, 8]);
        assert!(view.column_ids(Status::Todo).is_empty());
        assert!(!view.reload_requested());
    }

    #[tokio::test]
    async fn mutate_rolls_back_and_requests_reload_on_transport_failure() {
        let view = view(&[1, 2, 3], &[]);
        let client = SyncClient::new(FakeTransport::new(vec![Err(SyncError::Transport(
            "connection refused".to_string(),
        ))]));
        let plan = DropPlan::Reorder {
            task_id: 2,
            status: Status::Todo,
            index: 0,
            order: vec![2, 1, 3],
        };

        let outcome = client.mutate(&view, plan).await.expect("card exists");

        assert!(outcome.is_rolled_back());
        let view = lock_view(&view);
        assert_eq!(view.column_ids(Status::Todo), &[1, 2, 3]);
        assert!(view.reload_requested());
    }

    #[tokio::test]
    async fn rejected_drag_restores_card_to_its_original_index() {
        let view = view(&[4, 5, 6], &[7]);
        let plan = {
            let mut view = lock_view(&view);
            assert!(view.begin_drag(5, CardRegion::Body).expect("card exists"));
            view.hover(Status::Done, None);
            view.drop_on(Status::Done)
                .expect("drop resolves")
                .expect("drag was active")
        };
        let client = SyncClient::new(FakeTransport::new(vec![status(400)]));

        let outcome = client.mutate(&view, plan).await.expect("card exists");

        assert_eq!(outcome, Outcome::RolledBack(SyncError::Rejected { status: 400 }));
        let view = lock_view(&view);
        assert_eq!(view.column_ids(Status::Todo), &[4, 5, 6]);
        assert_eq!(view.column_ids(Status::Done), &[7]);
        assert_eq!(view.card(5).map(|card| card.selector), Some(Status::Todo));
        assert!(view.reload_requested());
    }

    #[tokio::test]
    async fn rollback_after_concurrent_reload_keeps_fresh_board() {
        let view = Arc::new(view(&[1, 2], &[]));
        let client = SyncClient::new(ReloadingTransport {
            view: Arc::clone(&view),
            snapshot: vec![
                Task::new(2, "t2", Status::Todo),
                Task::new(1, "t1", Status::Done),
            ],
        });

        let outcome = client
            .mutate(&view, QuickChange::new(1, Status::InProgress))
            .await
            .expect("card exists");

        assert!(outcome.is_rolled_back());
        let view = lock_view(&view);
        assert_eq!(view.column_ids(Status::Todo), &[2]);
        assert_eq!(view.column_ids(Status::Done), &[1]);
        assert!(view.column_ids(Status::InProgress).is_empty());
        assert_eq!(view.card(1).map(|card| card.selector), Some(Status::Done));
        assert!(view.reload_requested());
    }

    #[tokio::test]
    async fn mutate_sends_nothing_when_apply_fails() {
        let view = view(&[1], &[]);
        let client = SyncClient::new(FakeTransport::new(vec![]));
        let plan = DropPlan::StatusChange {
            task_id: 42,
            from: Status::Todo,
            to: Status::Done,
            index: 0,
        };

        let result = client.mutate(&view, plan).await;

        assert_eq!(result, Err(BoardError::UnknownTask(42)));
        assert!(client.transport().requests().is_empty());
    }

    #[test]
    fn sync_error_codes_are_stable() {
        assert_eq!(
            SyncError::Transport(String::new()).code(),
            "SYNC_TRANSPORT_FAILED"
        );
        assert_eq!(SyncError::Rejected { status: 500 }.code(), "SYNC_REJECTED");
        assert_eq!(
            SyncError::Malformed(String::new()).code(),
            "SYNC_MALFORMED_RESPONSE"
        );
        assert_eq!(
            SyncError::Rejected { status: 500 }.to_string(),
            "backend rejected request with HTTP 500"
        );
    }
}
