//! vidgen – command-line display layer for the vidgen proxy.
//!
//! # Usage
//!
//! ```bash
//! # Submit a prompt and follow the task until it finishes
//! vidgen generate --prompt "A cat playing piano" --duration 6 --resolution 1080P
//!
//! # Follow a task submitted elsewhere
//! vidgen watch <task_id>
//!
//! # One manual status check
//! vidgen status <task_id>
//! ```
//!
//! While a session is followed from a terminal, typing `r` re-checks the
//! task at once (also after it failed) and `q` stops following. Ctrl-C cancels
//! the session. Exit status is 0 when the video is ready and 1 otherwise.

mod display;

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use vidgen_poller::{HttpProxyClient, Phase, PollSchedule, PollState, Poller, ProxyApi};
use vidgen_types::{GenerateRequest, Resolution, VideoDuration};

/// Generate videos through a running vidgen-server and follow their progress.
#[derive(Parser, Debug)]
#[command(name = "vidgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the vidgen-server proxy
    #[arg(long, global = true, env = "VIDGEN_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Log filter for diagnostics written to stderr
    #[arg(long, global = true, env = "VIDGEN_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a prompt and poll until the video is ready or fails
    Generate {
        /// Text description of the video
        #[arg(short, long)]
        prompt: String,

        /// Clip length in seconds (6 or 10)
        #[arg(short, long, default_value = "6", value_parser = parse_duration)]
        duration: VideoDuration,

        /// Output resolution (1080P or 768P)
        #[arg(short, long, default_value = "1080P")]
        resolution: Resolution,
    },

    /// Follow an already submitted task
    Watch {
        task_id: String,
    },

    /// Check a task once and print the proxy's reply
    Status {
        task_id: String,
    },
}

fn parse_duration(s: &str) -> Result<VideoDuration, String> {
    let secs: u8 = s.trim().parse().map_err(|_| format!("'{s}' is not a number of seconds"))?;
    VideoDuration::try_from(secs).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let api = Arc::new(
        HttpProxyClient::new(&cli.server)
            .with_context(|| format!("cannot use server URL {}", cli.server))?,
    );
    let schedule = PollSchedule::default();

    match cli.command {
        Command::Generate { prompt, duration, resolution } => {
            let request = GenerateRequest::new(prompt, duration, resolution)?;
            let mut poller = Poller::new(api, schedule);
            let updates = match poller.submit(request).await {
                Ok(updates) => updates,
                Err(e) => {
                    eprintln!("Submission failed: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            };
            let last = follow(&poller, updates, &schedule, operator_input()).await;
            Ok(finish(&last))
        }
        Command::Watch { task_id } => {
            let mut poller = Poller::new(api, schedule);
            let updates = poller.track(task_id);
            let last = follow(&poller, updates, &schedule, operator_input()).await;
            Ok(finish(&last))
        }
        Command::Status { task_id } => match api.status(&task_id).await {
            Ok(status) => {
                println!("{}", serde_json::to_string_pretty(&status)?);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                debug!(error = %e, "status check failed");
                eprintln!("{}", e.status_message());
                Ok(ExitCode::FAILURE)
            }
        },
    }
}

/// A line typed by the operator while a session is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorCommand {
    Refresh,
    Quit,
}

impl OperatorCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "r" | "refresh" => Some(OperatorCommand::Refresh),
            "q" | "quit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

/// Lines typed on stdin, when stdin is a terminal.
///
/// A plain thread does the blocking reads so that a pending read never holds
/// up runtime shutdown.
fn operator_input() -> Option<mpsc::Receiver<String>> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    Some(rx)
}

async fn next_line(input: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Print every distinct snapshot until the session stops.
///
/// With operator input a failed session stays open so it can be re-checked;
/// without it (or once the input closes) any terminal state ends the loop.
async fn follow(
    poller: &Poller,
    mut updates: watch::Receiver<PollState>,
    schedule: &PollSchedule,
    mut input: Option<mpsc::Receiver<String>>,
) -> PollState {
    let mut last_line = String::new();
    let mut hinted = false;
    loop {
        let state = updates.borrow_and_update().clone();
        let line = display::render(&state, schedule);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if state.cancelled || state.phase == Phase::Succeeded {
            return state;
        }
        if state.phase == Phase::Failed {
            if input.is_none() {
                return state;
            }
            if !hinted {
                eprintln!("Type 'r' to re-check the status or 'q' to quit.");
                hinted = true;
            }
        } else {
            hinted = false;
        }

        let mut input_closed = false;
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("session closed without reaching a terminal state");
                    return updates.borrow().clone();
                }
            }
            typed = next_line(&mut input) => match typed.as_deref().map(OperatorCommand::parse) {
                Some(Some(OperatorCommand::Refresh)) => {
                    if !poller.refresh() {
                        debug!("refresh not accepted");
                    }
                }
                Some(Some(OperatorCommand::Quit)) => return updates.borrow().clone(),
                Some(None) => {}
                None => input_closed = true,
            },
            _ = tokio::signal::ctrl_c() => {
                poller.cancel();
            }
        }
        if input_closed {
            input = None;
        }
    }
}

fn finish(state: &PollState) -> ExitCode {
    println!("{}", display::outcome(state));
    if state.phase == Phase::Succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| log_level.parse::<EnvFilter>())
        .unwrap_or_else(|e| {
            eprintln!("WARN: '{log_level}' is not a valid tracing filter ({e}); falling back to 'warn'");
            EnvFilter::new("warn")
        });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod test {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};
    use vidgen_poller::ProxyError;
    use vidgen_types::{FileResponse, StatusResponse, SubmitResponse};

    use super::*;

    /// Proxy stand-in answering status checks from a script.
    struct ScriptedProxy {
        statuses: Mutex<VecDeque<Value>>,
        status_calls: Mutex<usize>,
    }

    impl ScriptedProxy {
        fn new(statuses: Vec<Value>) -> Self {
            Self { statuses: Mutex::new(statuses.into()), status_calls: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl ProxyApi for ScriptedProxy {
        async fn submit(&self, _: &GenerateRequest) -> Result<SubmitResponse, ProxyError> {
            Err(ProxyError::MissingTaskId)
        }

        async fn status(&self, task_id: &str) -> Result<StatusResponse, ProxyError> {
            *self.status_calls.lock().unwrap() += 1;
            let reply = self.statuses.lock().unwrap().pop_front();
            Ok(StatusResponse::from_vendor(
                task_id,
                reply.unwrap_or_else(|| json!({ "status": "Processing" })),
            ))
        }

        async fn download(&self, file_id: &str) -> Result<FileResponse, ProxyError> {
            Ok(FileResponse::from_vendor(
                file_id,
                json!({ "file": { "download_url": "https://cdn/x.mp4" } }),
            ))
        }
    }

    #[test]
    fn generate_defaults_to_six_seconds_1080p() {
        let cli = Cli::try_parse_from(["vidgen", "generate", "--prompt", "A cat"]).unwrap();
        match cli.command {
            Command::Generate { prompt, duration, resolution } => {
                assert_eq!(prompt, "A cat");
                assert_eq!(duration, VideoDuration::Six);
                assert_eq!(resolution, Resolution::P1080);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unsupported_duration_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["vidgen", "generate", "-p", "x", "-d", "7"]).unwrap_err();
        assert!(err.to_string().contains("Duration must be 6 or 10 seconds"));
    }

    #[test]
    fn resolution_is_case_sensitive() {
        assert!(Cli::try_parse_from(["vidgen", "generate", "-p", "x", "-r", "768P"]).is_ok());
        assert!(Cli::try_parse_from(["vidgen", "generate", "-p", "x", "-r", "768p"]).is_err());
    }

    #[test]
    fn server_flag_is_global() {
        let cli = Cli::try_parse_from(["vidgen", "status", "T1", "--server", "http://h:1"]).unwrap();
        assert_eq!(cli.server, "http://h:1");
        assert!(matches!(cli.command, Command::Status { task_id } if task_id == "T1"));
    }

    #[test]
    fn operator_commands() {
        assert_eq!(OperatorCommand::parse("r"), Some(OperatorCommand::Refresh));
        assert_eq!(OperatorCommand::parse(" refresh \n"), Some(OperatorCommand::Refresh));
        assert_eq!(OperatorCommand::parse("q"), Some(OperatorCommand::Quit));
        assert_eq!(OperatorCommand::parse("x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_session_is_rechecked_on_request() {
        let fake = Arc::new(ScriptedProxy::new(vec![
            json!({ "status": "Fail" }),
            json!({ "status": "Processing" }),
            json!({ "status": "Success", "file_id": "F1" }),
        ]));
        let schedule = PollSchedule::default();
        let mut poller = Poller::new(fake.clone(), schedule);
        let updates = poller.track("T1");
        let mut watcher = poller.session().unwrap().subscribe();
        let (typed, input) = mpsc::channel(1);

        let operator = async {
            watcher.wait_for(|s| s.phase == Phase::Failed).await.unwrap();
            typed.send("r".to_owned()).await.unwrap();
        };
        let (last, ()) = tokio::join!(follow(&poller, updates, &schedule, Some(input)), operator);

        assert_eq!(last.phase, Phase::Succeeded);
        assert_eq!(last.task.download_url.as_deref(), Some("https://cdn/x.mp4"));
        assert_eq!(last.poll_count, 1);
        assert_eq!(*fake.status_calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_session_ends_without_operator_input() {
        let fake = Arc::new(ScriptedProxy::new(vec![json!({ "status": "Fail" })]));
        let schedule = PollSchedule::default();
        let mut poller = Poller::new(fake.clone(), schedule);
        let updates = poller.track("T1");

        let last = follow(&poller, updates, &schedule, None).await;
        assert_eq!(last.phase, Phase::Failed);
        assert_eq!(*fake.status_calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_following() {
        let fake = Arc::new(ScriptedProxy::new(vec![json!({ "status": "Fail" })]));
        let schedule = PollSchedule::default();
        let mut poller = Poller::new(fake, schedule);
        let updates = poller.track("T1");
        let (typed, input) = mpsc::channel(1);
        typed.send("q".to_owned()).await.unwrap();

        let last = follow(&poller, updates, &schedule, Some(input)).await;
        assert_eq!(last.phase, Phase::Submitted);
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
