//! Pure polling state machine.
//!
//! [`transition`] folds one [`PollEvent`] into a [`PollState`]; it performs no
//! I/O and reads no clock. The driver in [`crate::session`] asks
//! [`PollState::next_action`] what to do next and feeds the outcome back in.

use std::time::Duration;

use strum::{Display, IntoStaticStr};
use tracing::debug;
use vidgen_types::{GenerateRequest, LifecycleStatus};

use crate::schedule::PollSchedule;

pub const MSG_NO_FILE_ID: &str = "No file ID received";
pub const MSG_GENERATION_FAILED: &str = "Video generation failed";
pub const MSG_STATUS_FAILED: &str = "Failed to check status";
pub const MSG_NETWORK: &str = "Network error while checking status";
pub const MSG_DOWNLOAD_FAILED: &str = "Failed to get download URL";
pub const MSG_CANCELLED: &str = "Polling cancelled";

/// Lifecycle phase of a polling session. Exactly one is current at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// No task has been submitted.
    Idle,
    /// Task accepted, no status response yet.
    Submitted,
    /// At least one non-terminal status response seen.
    Polling,
    /// Vendor reported success; exchanging the file id for a URL.
    ResolvingDownload,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }

    /// Whether the session still has automatic work to do.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Polling | Phase::ResolvingDownload)
    }
}

/// Who asked for a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOrigin {
    /// Fired by the session timer.
    Scheduled,
    /// Requested by the operator; honored even in terminal phases.
    Manual,
}

/// One generation request as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub task_id: Option<String>,
    /// `None` when the session was seeded from a known task id.
    pub request: Option<GenerateRequest>,
    pub status: LifecycleStatus,
    pub file_id: Option<String>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            task_id: None,
            request: None,
            status: LifecycleStatus::Other(LifecycleStatus::UNKNOWN.to_owned()),
            file_id: None,
            download_url: None,
            error: None,
        }
    }
}

/// Snapshot exposed to the display layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub phase: Phase,
    pub task: Task,
    /// Non-terminal status responses seen since submission.
    pub poll_count: u32,
    /// Set once the session has been torn down; no event applies afterwards.
    pub cancelled: bool,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            task: Task::default(),
            poll_count: 0,
            cancelled: false,
        }
    }
}

/// Inputs to [`transition`]. Response events name the task they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Submitted {
        task_id: String,
        request: Option<GenerateRequest>,
    },
    StatusReceived {
        task_id: String,
        origin: CheckOrigin,
        status: LifecycleStatus,
        file_id: Option<String>,
        /// Vendor explanation attached to a `Fail`.
        error: Option<String>,
    },
    StatusFailed {
        task_id: String,
        origin: CheckOrigin,
        message: String,
    },
    DownloadResolved {
        task_id: String,
        file_id: String,
        download_url: Option<String>,
    },
    DownloadFailed {
        task_id: String,
        file_id: String,
        message: String,
    },
    Cancelled,
}

/// Work the driver should perform for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Issue a status check once `after` has elapsed.
    Check { after: Duration },
    /// Exchange `file_id` for a download URL now.
    ResolveDownload { file_id: String },
    /// Nothing automatic; wait for an operator action.
    Wait,
}

impl PollState {
    pub fn task_id(&self) -> Option<&str> {
        self.task.task_id.as_deref()
    }

    pub fn next_action(&self, schedule: &PollSchedule) -> NextAction {
        if self.cancelled {
            return NextAction::Wait;
        }
        match self.phase {
            Phase::Submitted | Phase::Polling => NextAction::Check {
                after: schedule.interval_for(self.poll_count),
            },
            Phase::ResolvingDownload => match &self.task.file_id {
                Some(file_id) => NextAction::ResolveDownload { file_id: file_id.clone() },
                None => NextAction::Wait,
            },
            Phase::Idle | Phase::Succeeded | Phase::Failed => NextAction::Wait,
        }
    }

    fn owns(&self, task_id: &str) -> bool {
        self.task_id() == Some(task_id)
    }

    /// Whether a status response of `origin` may be applied in this state.
    fn accepts_status(&self, task_id: &str, origin: CheckOrigin) -> bool {
        if !self.owns(task_id) {
            return false;
        }
        match origin {
            CheckOrigin::Scheduled => matches!(self.phase, Phase::Submitted | Phase::Polling),
            CheckOrigin::Manual => self.phase != Phase::Idle,
        }
    }

    fn fail(mut self, message: impl Into<String>) -> Self {
        self.phase = Phase::Failed;
        self.task.error = Some(message.into());
        self
    }
}

/// Apply `event` to `state`.
///
/// Events that do not belong to the current task, scheduled responses that
/// arrive after a terminal phase, and anything after cancellation leave the
/// state unchanged.
pub fn transition(state: PollState, event: PollEvent) -> PollState {
    if state.cancelled {
        debug!(?event, "session cancelled; event dropped");
        return state;
    }

    match event {
        PollEvent::Submitted { task_id, request } => PollState {
            phase: Phase::Submitted,
            task: Task {
                task_id: Some(task_id),
                request,
                status: LifecycleStatus::Other(LifecycleStatus::SUBMITTED.to_owned()),
                ..Task::default()
            },
            poll_count: 0,
            cancelled: false,
        },

        PollEvent::StatusReceived { task_id, origin, status, file_id, error } => {
            if !state.accepts_status(&task_id, origin) {
                debug!(task_id = %task_id, ?origin, phase = %state.phase, "stale status response dropped");
                return state;
            }
            apply_status(state, status, file_id, error)
        }

        PollEvent::StatusFailed { task_id, origin, message } => {
            if !state.accepts_status(&task_id, origin) {
                return state;
            }
            state.fail(message)
        }

        PollEvent::DownloadResolved { task_id, file_id, download_url } => {
            if !resolving(&state, &task_id, &file_id) {
                return state;
            }
            match download_url.filter(|u| !u.trim().is_empty()) {
                Some(url) => {
                    let mut next = state;
                    next.phase = Phase::Succeeded;
                    next.task.download_url = Some(url);
                    next.task.error = None;
                    next
                }
                None => state.fail(MSG_DOWNLOAD_FAILED),
            }
        }

        PollEvent::DownloadFailed { task_id, file_id, message } => {
            if !resolving(&state, &task_id, &file_id) {
                return state;
            }
            state.fail(message)
        }

        PollEvent::Cancelled => {
            let mut next = if state.phase.is_active() {
                state.fail(MSG_CANCELLED)
            } else {
                state
            };
            next.cancelled = true;
            next
        }
    }
}

fn resolving(state: &PollState, task_id: &str, file_id: &str) -> bool {
    state.phase == Phase::ResolvingDownload
        && state.owns(task_id)
        && state.task.file_id.as_deref() == Some(file_id)
}

fn apply_status(
    mut state: PollState,
    status: LifecycleStatus,
    file_id: Option<String>,
    error: Option<String>,
) -> PollState {
    state.task.status = status.clone();
    match status {
        LifecycleStatus::Success => match file_id.filter(|f| !f.is_empty()) {
            Some(file_id) => {
                state.phase = Phase::ResolvingDownload;
                state.task.file_id = Some(file_id);
                state.task.error = None;
                state
            }
            None => state.fail(MSG_NO_FILE_ID),
        },
        LifecycleStatus::Fail => {
            let message = error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| MSG_GENERATION_FAILED.to_owned());
            state.fail(message)
        }
        LifecycleStatus::Preparing
        | LifecycleStatus::Queueing
        | LifecycleStatus::Processing
        | LifecycleStatus::Other(_) => {
            state.phase = Phase::Polling;
            state.poll_count += 1;
            state.task.error = None;
            state
        }
    }
}
