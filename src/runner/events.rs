use super::state::RunSummary;
use crate::report::model::ReportStatus;
use crate::runner::step_log::StepStatus;
use tokio::sync::broadcast;

/// Scheduler events for real-time progress output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        report_id: String,
        queued: Vec<String>,
    },
    RunSuspended {
        report_id: String,
        next_suites: Vec<String>,
        summary: RunSummary,
    },
    RunCompleted {
        report_id: String,
        summary: RunSummary,
    },

    SuiteStarted {
        suite: String,
        scenario_count: usize,
    },
    SuiteFinished {
        suite: String,
        status: ReportStatus,
        duration_ms: u64,
    },

    ScenarioStarted {
        suite: String,
        scenario: String,
    },
    ScenarioFinished {
        suite: String,
        scenario: String,
        status: ReportStatus,
        duration_ms: u64,
    },

    /// A step record was appended
    Step {
        message: String,
        status: StepStatus,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use std::io::IsTerminal;

        // Hidden target when piped, to keep escape codes out of CI logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut scenario_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted { report_id, queued } => {
                    multi
                        .println(format!(
                            "\n{} Report {} ({} suites queued)",
                            "▶".green().bold(),
                            report_id.cyan(),
                            queued.len()
                        ))
                        .ok();
                }

                RunEvent::SuiteStarted {
                    suite,
                    scenario_count,
                } => {
                    println!(
                        "\n  {} Suite: {} ({} scenarios)",
                        "→".blue(),
                        suite.white().bold(),
                        scenario_count
                    );
                }

                RunEvent::SuiteFinished {
                    suite,
                    status,
                    duration_ms,
                } => {
                    let status_str = match status {
                        ReportStatus::Passed => "PASSED".green().bold(),
                        ReportStatus::Failed => "FAILED".red().bold(),
                    };
                    println!(
                        "  {} Suite {} [{}] {}ms",
                        "←".blue(),
                        suite,
                        status_str,
                        duration_ms
                    );
                }

                RunEvent::ScenarioStarted { scenario, .. } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("      {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    scenario_text = scenario;
                    pb.set_message(format!("{}... ", scenario_text));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                RunEvent::Step { message, status } => {
                    if let Some(pb) = &spinner {
                        pb.set_message(format!("{}... {}", scenario_text, message.dimmed()));
                    }
                    match status {
                        StepStatus::Failed => {
                            multi
                                .println(format!("        {} {}", "✗".red(), message))
                                .ok();
                        }
                        StepStatus::PerformanceFail => {
                            multi
                                .println(format!("        {} {}", "⚠".yellow(), message))
                                .ok();
                        }
                        StepStatus::Suggestion => {
                            multi
                                .println(format!("        {} {}", "ℹ".blue(), message.dimmed()))
                                .ok();
                        }
                        StepStatus::Passed => {}
                    }
                }

                RunEvent::ScenarioFinished {
                    scenario,
                    status,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let mark = match status {
                        ReportStatus::Passed => "✓".green(),
                        ReportStatus::Failed => "✗".red(),
                    };
                    println!("    {} {} ({}ms)", mark, scenario, duration_ms);
                }

                RunEvent::RunSuspended {
                    report_id,
                    next_suites,
                    summary,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Run suspended", "⏸".yellow().bold());
                    println!("  Report: {}", report_id.cyan());
                    println!("  Remaining: {}", next_suites.join(", "));
                    print_summary(&summary);
                }

                RunEvent::RunCompleted { report_id, summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Run completed", "■".blue().bold());
                    println!("  Report: {}", report_id.cyan());
                    print_summary(&summary);
                }
            }
        }
    }
}

fn print_summary(summary: &RunSummary) {
    use colored::Colorize;
    println!(
        "  Suites: {}, scenarios: {}",
        summary.suites, summary.scenarios
    );
    println!(
        "  {} passed, {} failed",
        summary.passed.to_string().green(),
        summary.failed.to_string().red()
    );
    println!("  Duration: {}ms", summary.total_duration_ms);
}
