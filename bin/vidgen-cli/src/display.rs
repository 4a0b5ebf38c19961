//! One-line rendering of session snapshots.

use std::time::Duration;

use vidgen_poller::{NextAction, Phase, PollSchedule, PollState};

/// Render `state` as a single status line.
///
/// Successive snapshots that render identically are printed only once, so
/// the line carries only what an operator needs to see change.
pub fn render(state: &PollState, schedule: &PollSchedule) -> String {
    let mut line = format!(
        "[{}] task={} status={} polls={}",
        state.phase,
        state.task_id().unwrap_or("-"),
        state.task.status,
        state.poll_count,
    );

    if let Some(file_id) = &state.task.file_id {
        line.push_str(&format!(" file_id={file_id}"));
    }
    if let Some(url) = &state.task.download_url {
        line.push_str(&format!(" url={url}"));
    }
    if let Some(error) = &state.task.error {
        line.push_str(&format!(" error=\"{error}\""));
    }
    if let NextAction::Check { after } = state.next_action(schedule) {
        line.push_str(&format!(" next_check_in={}", format_secs(after)));
    }
    line
}

/// Final summary printed once a session stops.
pub fn outcome(state: &PollState) -> String {
    match (state.phase, &state.task.download_url) {
        (Phase::Succeeded, Some(url)) => format!("Video ready: {url}"),
        (Phase::Succeeded, None) => "Video ready".to_owned(),
        _ => format!(
            "Generation failed: {}",
            state.task.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn format_secs(d: Duration) -> String {
    format!("{}s", d.as_secs())
}
