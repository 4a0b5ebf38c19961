//! Tokio driver for the polling state machine.
//!
//! Each [`PollingSession`] owns one spawned worker. The worker is the only
//! place requests are issued, so at most one request per session is in
//! flight and at most one timer is pending. Operator commands reach it over an
//! mpsc channel; snapshots leave through a `watch` channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use vidgen_types::GenerateRequest;

use crate::client::{ProxyApi, ProxyError};
use crate::machine::{CheckOrigin, NextAction, PollEvent, PollState, transition};
use crate::schedule::PollSchedule;

#[derive(Debug)]
enum SessionCommand {
    /// Run a status check now, whatever the phase.
    Refresh,
}

/// Monitoring context for exactly one task.
///
/// Dropping the session cancels it.
pub struct PollingSession {
    task_id: String,
    state: Arc<watch::Sender<PollState>>,
    commands: mpsc::Sender<SessionCommand>,
    worker: AbortHandle,
}

impl std::fmt::Debug for PollingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        write!(
            f,
            "PollingSession({}, {}, polls={})",
            self.task_id, state.phase, state.poll_count
        )
    }
}

impl PollingSession {
    /// Seed a session with an accepted task and start its timer.
    pub fn start(
        api: Arc<dyn ProxyApi>,
        schedule: PollSchedule,
        task_id: impl Into<String>,
        request: Option<GenerateRequest>,
    ) -> Self {
        let task_id = task_id.into();
        let initial = transition(
            PollState::default(),
            PollEvent::Submitted { task_id: task_id.clone(), request },
        );
        let (state_tx, _) = watch::channel(initial);
        let state = Arc::new(state_tx);
        let (commands, command_rx) = mpsc::channel(4);

        let worker = Worker {
            api,
            schedule,
            task_id: task_id.clone(),
            state: Arc::clone(&state),
            commands: command_rx,
        };
        let worker = tokio::spawn(worker.run()).abort_handle();
        info!(task_id = %task_id, "polling session started");

        Self { task_id, state, commands, worker }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every state change of this session.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        let state = self.state.borrow();
        !state.cancelled && state.phase.is_active()
    }

    /// Ask for an immediate status check. Returns `false` if the session is
    /// cancelled or already has refreshes queued.
    pub fn refresh(&self) -> bool {
        if self.state.borrow().cancelled {
            return false;
        }
        self.commands.try_send(SessionCommand::Refresh).is_ok()
    }

    /// Stop the session. The pending timer is dropped with the worker and
    /// any response still in flight is discarded by the state machine.
    pub fn cancel(&self) {
        let changed = self.state.send_if_modified(|state| {
            if state.cancelled {
                return false;
            }
            *state = transition(state.clone(), PollEvent::Cancelled);
            true
        });
        self.worker.abort();
        if changed {
            info!(task_id = %self.task_id, "polling session cancelled");
        }
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Worker {
    api: Arc<dyn ProxyApi>,
    schedule: PollSchedule,
    task_id: String,
    state: Arc<watch::Sender<PollState>>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let action = {
                let state = self.state.borrow();
                if state.cancelled {
                    break;
                }
                state.next_action(&self.schedule)
            };

            match action {
                NextAction::Check { after } => {
                    debug!(task_id = %self.task_id, ?after, "next status check scheduled");
                    tokio::select! {
                        biased;
                        command = self.commands.recv() => match command {
                            Some(SessionCommand::Refresh) => self.check(CheckOrigin::Manual).await,
                            None => break,
                        },
                        _ = tokio::time::sleep(after) => self.check(CheckOrigin::Scheduled).await,
                    }
                }
                NextAction::ResolveDownload { file_id } => self.resolve(file_id).await,
                NextAction::Wait => match self.commands.recv().await {
                    Some(SessionCommand::Refresh) => self.check(CheckOrigin::Manual).await,
                    None => break,
                },
            }
        }
        debug!(task_id = %self.task_id, "polling worker stopped");
    }

    async fn check(&self, origin: CheckOrigin) {
        let task_id = self.task_id.clone();
        let event = match self.api.status(&task_id).await {
            Ok(reply) => PollEvent::StatusReceived {
                status: reply.lifecycle(),
                error: reply.vendor_error().map(str::to_owned),
                file_id: reply.file_id,
                task_id,
                origin,
            },
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "status check failed");
                PollEvent::StatusFailed {
                    message: e.status_message(),
                    task_id,
                    origin,
                }
            }
        };
        self.apply(event);
    }

    async fn resolve(&self, file_id: String) {
        let task_id = self.task_id.clone();
        let event = match self.api.download(&file_id).await {
            Ok(reply) => PollEvent::DownloadResolved {
                download_url: reply.usable_download_url().map(str::to_owned),
                task_id,
                file_id,
            },
            Err(e) => {
                warn!(task_id = %task_id, file_id = %file_id, error = %e, "file retrieve failed");
                PollEvent::DownloadFailed {
                    message: e.download_message(),
                    task_id,
                    file_id,
                }
            }
        };
        self.apply(event);
    }

    fn apply(&self, event: PollEvent) {
        self.state.send_if_modified(|state| {
            let next = transition(state.clone(), event);
            if next == *state {
                return false;
            }
            info!(
                task_id = %self.task_id,
                from = %state.phase,
                to = %next.phase,
                status = %next.task.status,
                poll_count = next.poll_count,
                "session state changed"
            );
            *state = next;
            true
        });
    }
}

/// Owns at most one [`PollingSession`] at a time.
pub struct Poller {
    api: Arc<dyn ProxyApi>,
    schedule: PollSchedule,
    session: Option<PollingSession>,
}

impl Poller {
    pub fn new(api: Arc<dyn ProxyApi>, schedule: PollSchedule) -> Self {
        Self { api, schedule, session: None }
    }

    /// Submit a prompt and start polling the resulting task.
    ///
    /// Any previous session is cancelled before the request is sent.
    pub async fn submit(
        &mut self,
        request: GenerateRequest,
    ) -> Result<watch::Receiver<PollState>, ProxyError> {
        self.teardown();

        let receipt = self.api.submit(&request).await?;
        let task_id = receipt.task_id.ok_or(ProxyError::MissingTaskId)?;
        Ok(self.begin(task_id, Some(request)))
    }

    /// Start polling a task that was submitted elsewhere.
    pub fn track(&mut self, task_id: impl Into<String>) -> watch::Receiver<PollState> {
        self.teardown();
        self.begin(task_id.into(), None)
    }

    fn begin(&mut self, task_id: String, request: Option<GenerateRequest>) -> watch::Receiver<PollState> {
        let session = PollingSession::start(Arc::clone(&self.api), self.schedule, task_id, request);
        let receiver = session.subscribe();
        self.session = Some(session);
        receiver
    }

    pub fn session(&self) -> Option<&PollingSession> {
        self.session.as_ref()
    }

    /// Current snapshot, or the idle state when nothing was submitted.
    pub fn state(&self) -> PollState {
        self.session
            .as_ref()
            .map(PollingSession::snapshot)
            .unwrap_or_default()
    }

    /// Manual re-check of the current task. Returns `false` without a session.
    pub fn refresh(&self) -> bool {
        self.session.as_ref().is_some_and(PollingSession::refresh)
    }

    /// Cancel the current session, keeping its final snapshot readable.
    pub fn cancel(&self) {
        if let Some(session) = &self.session {
            session.cancel();
        }
    }

    fn teardown(&mut self) {
        if let Some(previous) = self.session.take() {
            debug!(task_id = %previous.task_id(), "tearing down previous session");
            previous.cancel();
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;
    use vidgen_types::{
        ErrorBody, FileResponse, LifecycleStatus, Resolution, StatusResponse, SubmitResponse,
        VideoDuration,
    };

    use super::*;
    use crate::machine::{MSG_CANCELLED, MSG_DOWNLOAD_FAILED, MSG_NETWORK, MSG_NO_FILE_ID, Phase};

    enum Reply {
        Status(serde_json::Value),
        /// Answer only after `secs` of (paused) time.
        Slow(u64, serde_json::Value),
        Rejected(&'static str),
        Network,
    }

    /// Scripted proxy that records when each call happened.
    #[derive(Default)]
    struct FakeProxy {
        task_ids: Mutex<VecDeque<&'static str>>,
        statuses: Mutex<VecDeque<Reply>>,
        files: Mutex<VecDeque<Reply>>,
        status_calls: Mutex<Vec<(String, Instant)>>,
        file_calls: Mutex<Vec<String>>,
    }

    impl FakeProxy {
        fn with_statuses(replies: Vec<Reply>) -> Self {
            Self {
                statuses: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn files(self, replies: Vec<Reply>) -> Self {
            *self.files.lock().unwrap() = replies.into();
            self
        }

        fn task_ids(self, ids: Vec<&'static str>) -> Self {
            *self.task_ids.lock().unwrap() = ids.into();
            self
        }

        fn status_calls(&self) -> Vec<(String, Instant)> {
            self.status_calls.lock().unwrap().clone()
        }
    }

    fn rejected(message: &str) -> ProxyError {
        ProxyError::Rejected { status: 502, body: Some(ErrorBody::new(message)) }
    }

    /// A transport error without touching the network.
    async fn network_error() -> ProxyError {
        let err = reqwest::Client::new()
            .get("http://[::1]:0/")
            .timeout(Duration::from_millis(1))
            .send()
            .await
            .unwrap_err();
        ProxyError::Network(err)
    }

    #[async_trait]
    impl ProxyApi for FakeProxy {
        async fn submit(&self, request: &GenerateRequest) -> Result<SubmitResponse, ProxyError> {
            let task_id = self.task_ids.lock().unwrap().pop_front();
            Ok(SubmitResponse::from_vendor(
                request,
                json!({ "task_id": task_id }),
                "2026-01-01T00:00:00Z".into(),
            ))
        }

        async fn status(&self, task_id: &str) -> Result<StatusResponse, ProxyError> {
            self.status_calls.lock().unwrap().push((task_id.to_owned(), Instant::now()));
            let reply = self.statuses.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Status(v)) => Ok(StatusResponse::from_vendor(task_id, v)),
                Some(Reply::Slow(secs, v)) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok(StatusResponse::from_vendor(task_id, v))
                }
                Some(Reply::Rejected(m)) => Err(rejected(m)),
                Some(Reply::Network) => Err(network_error().await),
                None => Ok(StatusResponse::from_vendor(task_id, json!({ "status": "Processing" }))),
            }
        }

        async fn download(&self, file_id: &str) -> Result<FileResponse, ProxyError> {
            self.file_calls.lock().unwrap().push(file_id.to_owned());
            let reply = self.files.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Status(v)) => Ok(FileResponse::from_vendor(file_id, v)),
                Some(Reply::Slow(secs, v)) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok(FileResponse::from_vendor(file_id, v))
                }
                Some(Reply::Rejected(m)) => Err(rejected(m)),
                Some(Reply::Network) => Err(network_error().await),
                None => Ok(FileResponse::from_vendor(file_id, json!({}))),
            }
        }
    }

    fn status(s: &str) -> Reply {
        Reply::Status(json!({ "status": s }))
    }

    fn cat() -> GenerateRequest {
        GenerateRequest::new("A cat", VideoDuration::Six, Resolution::P1080).unwrap()
    }

    async fn finished(rx: &mut watch::Receiver<PollState>) -> PollState {
        rx.wait_for(|s| s.phase.is_terminal()).await.unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn cat_scenario_reaches_succeeded() {
        let fake = Arc::new(
            FakeProxy::with_statuses(vec![
                status("Processing"),
                Reply::Status(json!({ "status": "Success", "file_id": "F1" })),
            ])
            .files(vec![Reply::Status(json!({ "file": { "download_url": "https://x/v.mp4" } }))])
            .task_ids(vec!["T1"]),
        );
        let mut poller = Poller::new(fake.clone(), PollSchedule::default());
        let started = Instant::now();

        let mut rx = poller.submit(cat()).await.unwrap();
        {
            let first = rx.borrow();
            assert_eq!(first.phase, Phase::Submitted);
            assert_eq!(first.poll_count, 0);
        }
        assert!(poller.session().is_some_and(PollingSession::is_active));

        let polling = rx.wait_for(|s| s.phase == Phase::Polling).await.unwrap().clone();
        assert_eq!(polling.poll_count, 1);
        assert_eq!(polling.task.status, LifecycleStatus::Processing);

        let done = finished(&mut rx).await;
        assert_eq!(done.phase, Phase::Succeeded);
        assert_eq!(done.task.download_url.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(done.task.file_id.as_deref(), Some("F1"));

        let calls = fake.status_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1 - started, Duration::from_secs(10));
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(10));
        assert_eq!(*fake.file_calls.lock().unwrap(), vec!["F1".to_owned()]);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fake.status_calls().len(), 2, "no polling after success");
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_slows_after_five_polls() {
        let mut replies: Vec<Reply> = (0..6).map(|_| status("Queueing")).collect();
        replies.push(status("Fail"));
        let fake = Arc::new(FakeProxy::with_statuses(replies));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        let started = Instant::now();

        let mut rx = session.subscribe();
        let done = finished(&mut rx).await;
        assert_eq!(done.phase, Phase::Failed);
        assert_eq!(done.poll_count, 6);

        let mut last = started;
        let gaps: Vec<u64> = fake
            .status_calls()
            .into_iter()
            .map(|(_, at)| {
                let gap = (at - last).as_secs();
                last = at;
                gap
            })
            .collect();
        assert_eq!(gaps, vec![10, 10, 10, 10, 10, 30, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_stops_polling_immediately() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![Reply::Status(
            json!({ "status": "Fail", "error": "content rejected" }),
        )]));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);

        let done = finished(&mut session.subscribe()).await;
        assert_eq!(done.task.error.as_deref(), Some("content rejected"));
        assert!(!session.is_active());

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fake.status_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_without_file_id_fails() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![status("Success")]));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);

        let done = finished(&mut session.subscribe()).await;
        assert_eq!(done.phase, Phase::Failed);
        assert_eq!(done.task.error.as_deref(), Some(MSG_NO_FILE_ID));
        assert!(fake.file_calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn network_error_terminates_session() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![Reply::Network]));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);

        let done = finished(&mut session.subscribe()).await;
        assert_eq!(done.task.error.as_deref(), Some(MSG_NETWORK));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fake.status_calls().len(), 1, "network errors are not retried");
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_status_uses_proxy_message() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![Reply::Rejected("MiniMax API error: 500")]));
        let session = PollingSession::start(fake, PollSchedule::default(), "T1", None);

        let done = finished(&mut session.subscribe()).await;
        assert_eq!(done.task.error.as_deref(), Some("MiniMax API error: 500"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_download_url_fails_session() {
        let fake = Arc::new(
            FakeProxy::with_statuses(vec![Reply::Status(json!({ "status": "Success", "file_id": "F1" }))])
                .files(vec![Reply::Status(json!({ "file": { "download_url": "" } }))]),
        );
        let session = PollingSession::start(fake, PollSchedule::default(), "T1", None);

        let done = finished(&mut session.subscribe()).await;
        assert_eq!(done.phase, Phase::Failed);
        assert_eq!(done.task.error.as_deref(), Some(MSG_DOWNLOAD_FAILED));
        assert_eq!(done.task.file_id.as_deref(), Some("F1"));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_reenters_polling_after_failure() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![
            status("Processing"),
            Reply::Network,
            status("Processing"),
        ]));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        let mut rx = session.subscribe();

        let failed = finished(&mut rx).await;
        assert_eq!(failed.poll_count, 1);

        assert!(session.refresh());
        let resumed = rx.wait_for(|s| s.phase == Phase::Polling).await.unwrap().clone();
        assert_eq!(resumed.poll_count, 2, "manual check continues the count");
        assert_eq!(resumed.task.error, None);

        // Automatic polling resumes on the normal cadence.
        let before = fake.status_calls().len();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fake.status_calls().len(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_after_success_resolves_the_file_again() {
        let success = || Reply::Status(json!({ "status": "Success", "file_id": "F1" }));
        let fake = Arc::new(
            FakeProxy::with_statuses(vec![success(), success()]).files(vec![
                Reply::Status(json!({ "file": { "download_url": "https://x/old.mp4" } })),
                Reply::Status(json!({ "file": { "download_url": "https://x/new.mp4" } })),
            ]),
        );
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        let mut rx = session.subscribe();

        let done = finished(&mut rx).await;
        assert_eq!(done.task.download_url.as_deref(), Some("https://x/old.mp4"));

        assert!(session.refresh());
        let again = rx
            .wait_for(|s| s.task.download_url.as_deref() == Some("https://x/new.mp4"))
            .await
            .unwrap()
            .clone();
        assert_eq!(again.phase, Phase::Succeeded);
        assert_eq!(again.poll_count, 0);
        assert_eq!(fake.status_calls().len(), 2);
        assert_eq!(*fake.file_calls.lock().unwrap(), vec!["F1".to_owned(), "F1".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_during_resolution_runs_after_it() {
        let fake = Arc::new(
            FakeProxy::with_statuses(vec![
                Reply::Status(json!({ "status": "Success", "file_id": "F1" })),
                status("Processing"),
            ])
            .files(vec![Reply::Slow(5, json!({ "file": { "download_url": "https://x/v.mp4" } }))]),
        );
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        let mut rx = session.subscribe();

        rx.wait_for(|s| s.phase == Phase::ResolvingDownload).await.unwrap();
        assert!(session.refresh());
        assert_eq!(fake.status_calls().len(), 1, "no second request while resolving");

        let resumed = rx.wait_for(|s| s.phase == Phase::Polling).await.unwrap().clone();
        assert_eq!(resumed.poll_count, 1);
        assert_eq!(resumed.task.file_id.as_deref(), Some("F1"));
        assert_eq!(resumed.task.download_url.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(fake.status_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_while_waiting_checks_immediately() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![status("Preparing")]));
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        let started = Instant::now();

        assert!(session.refresh());
        let mut rx = session.subscribe();
        rx.wait_for(|s| s.poll_count == 1).await.unwrap();

        let calls = fake.status_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, started, "manual check must not wait for the timer");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_any_further_check() {
        let fake = Arc::new(FakeProxy::default());
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);

        session.cancel();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert!(fake.status_calls().is_empty());
        let state = session.snapshot();
        assert!(state.cancelled);
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.task.error.as_deref(), Some(MSG_CANCELLED));
        assert!(!session.refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_session_stops_its_timer() {
        let fake = Arc::new(FakeProxy::default());
        let session = PollingSession::start(fake.clone(), PollSchedule::default(), "T1", None);
        drop(session);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(fake.status_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_submission_replaces_first_session() {
        let fake = Arc::new(FakeProxy::default().task_ids(vec!["T1", "T2"]));
        let mut poller = Poller::new(fake.clone(), PollSchedule::default());

        let first = poller.submit(cat()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let mut second = poller.submit(cat()).await.unwrap();

        assert!(first.borrow().cancelled);
        assert_eq!(second.borrow().poll_count, 0);
        assert_eq!(poller.state().task_id(), Some("T2"));

        second.wait_for(|s| s.poll_count == 3).await.unwrap();
        let calls = fake.status_calls();
        assert!(calls.iter().all(|(id, _)| id == "T2"), "only the live task is polled");
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn submission_without_task_id_starts_nothing() {
        let fake = Arc::new(FakeProxy::default());
        let mut poller = Poller::new(fake.clone(), PollSchedule::default());

        let err = poller.submit(cat()).await.unwrap_err();
        assert!(matches!(err, ProxyError::MissingTaskId));
        assert!(poller.session().is_none());
        assert_eq!(poller.state().phase, Phase::Idle);
        assert!(!poller.refresh());
    }

    #[tokio::test(start_paused = true)]
    async fn track_seeds_session_without_request() {
        let fake = Arc::new(FakeProxy::with_statuses(vec![status("Fail")]));
        let mut poller = Poller::new(fake, PollSchedule::default());

        let mut rx = poller.track("T9");
        assert_eq!(rx.borrow().task.request, None);
        let done = finished(&mut rx).await;
        assert_eq!(done.task_id(), Some("T9"));
        assert_eq!(done.phase, Phase::Failed);
    }
}
