use super::state::RunSummary;
use tokio::sync::broadcast;

/// Run events for real-time updates
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        session_id: String,
        suite_name: String,
        base_url: String,
        case_count: usize,
    },
    RunFinished {
        suite_name: String,
        summary: RunSummary,
    },

    CaseStarted {
        index: usize,
        name: String,
        request: String,
    },
    CasePassed {
        index: usize,
        detail: String,
        duration_ms: u64,
    },
    CaseFailed {
        index: usize,
        error: String,
        duration_ms: u64,
    },
    CaseSkipped {
        index: usize,
        name: String,
        reason: String,
    },

    Log {
        message: String,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates.
///
/// Returns once every emitter is dropped.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        let interactive = std::io::stdout().is_terminal();
        let mut spinner: Option<ProgressBar> = None;
        let mut case_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("console listener lagged, {} events dropped", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted {
                    session_id,
                    suite_name,
                    base_url,
                    case_count,
                } => {
                    println!(
                        "\n{} Suite: {} ({} cases)",
                        "▶".green().bold(),
                        suite_name.white().bold(),
                        case_count
                    );
                    println!("  Base URL: {}", base_url.cyan());
                    println!("  Session: {}", session_id.dimmed());
                }

                RunEvent::RunFinished { suite_name, summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!(
                        "{} Suite {} finished: {} passed, {} failed, {} skipped",
                        "■".blue().bold(),
                        suite_name,
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                }

                RunEvent::CaseStarted {
                    index,
                    name,
                    request,
                } => {
                    case_text = format!("[{}] {} {}", index, name, request.dimmed());

                    let pb = if interactive {
                        ProgressBar::new_spinner()
                    } else {
                        // Piped output: no terminal escape codes
                        ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden())
                    };
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    pb.set_message(format!("{}... ", case_text));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                RunEvent::CasePassed {
                    detail,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!(
                        "    {} {} ({}ms) {}",
                        "✓".green(),
                        case_text,
                        duration_ms,
                        detail.dimmed()
                    );
                }

                RunEvent::CaseFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("    {} {} ({}ms)", "✗".red(), case_text, duration_ms);
                    println!("        {}", error.red());
                }

                RunEvent::CaseSkipped {
                    index,
                    name,
                    reason,
                } => {
                    println!(
                        "    {} [{}] {} ({})",
                        "○".yellow(),
                        index,
                        name,
                        reason.dimmed()
                    );
                }

                RunEvent::Log { message } => match &spinner {
                    Some(pb) => pb.println(format!("      {}", message)),
                    None => println!("      {}", message),
                },
            }
        }

        if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }
}
