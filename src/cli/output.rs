//! Console output for deployments.
//!
//! [`ConsoleReporter`] turns progress events into the operator-facing
//! output: colored status lines, one dot per poll, and the diff either as
//! text or JSON.

use colored::Colorize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use tabled::{Table, Tabled};

use crate::ecs::TaskDefinition;
use crate::planner::TaskDiff;
use crate::progress::{ProgressEvent, ProgressReporter, WaitPhase};

use super::commands::OutputFormat;

/// Number of poll dots printed on one line.
const DOTS_PER_LINE: u32 = 80;

/// Task definition row for table display.
#[derive(Tabled)]
struct RevisionRow {
    #[tabled(rename = "")]
    role: &'static str,
    #[tabled(rename = "Task definition")]
    family_revision: String,
    #[tabled(rename = "ARN")]
    arn: String,
}

struct ConsoleState<W> {
    writer: W,
    /// Dots printed since the last line break.
    dots: u32,
}

/// Progress reporter writing to a terminal.
pub struct ConsoleReporter<W: Write + Send> {
    format: OutputFormat,
    state: Mutex<ConsoleState<W>>,
}

impl ConsoleReporter<std::io::Stderr> {
    /// Creates a reporter writing to standard error.
    #[must_use]
    pub fn stderr(format: OutputFormat) -> Self {
        Self::new(std::io::stderr(), format)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    /// Creates a reporter writing to `writer`.
    #[must_use]
    pub const fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            format,
            state: Mutex::new(ConsoleState { writer, dots: 0 }),
        }
    }

    /// Consumes the reporter and returns its writer.
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
    }

    /// Renders one event, or `None` for events that only print a dot.
    fn render(&self, event: &ProgressEvent<'_>) -> Option<String> {
        let line = match event {
            ProgressEvent::Started { cluster, service } => {
                format!("updating service:\n  cluster: {cluster}\n  service: {service}")
            }
            ProgressEvent::InitialHealth { status } => {
                if status.healthy {
                    "the service looks good to begin with".green().to_string()
                } else {
                    format!("the service doesn't look good to begin with ({status})")
                        .yellow()
                        .to_string()
                }
            }
            ProgressEvent::InitialHealthUnknown { error } => {
                format!("unable to check the service before deploying: {error}")
                    .yellow()
                    .to_string()
            }
            ProgressEvent::UpToDate => "the service is up to date, we have nothing to do"
                .green()
                .to_string(),
            ProgressEvent::Changes { diff } => self.render_diff(diff),
            ProgressEvent::DryRun => {
                String::from("not proceeding with the updates because this is a dry run")
            }
            ProgressEvent::Registered {
                previous,
                registered,
            } => render_revisions(previous, registered),
            ProgressEvent::ServiceUpdated => return None,
            ProgressEvent::NotWaiting => String::from(
                "not waiting for your service to reflect the changes, check the console instead",
            ),
            ProgressEvent::Waiting { phase } => match phase {
                WaitPhase::Deployment => {
                    String::from("waiting for the service to reflect the changes")
                }
                WaitPhase::Rollback => {
                    String::from("waiting for the rolled back service to settle")
                }
            },
            ProgressEvent::PollTick { .. } => return None,
            ProgressEvent::FailureEvents { lines } => lines
                .iter()
                .map(|l| l.red().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            ProgressEvent::Succeeded => {
                "service has been updated successfully!".green().to_string()
            }
            ProgressEvent::WaitFailed { error } => {
                format!("there was an error updating the service:\n{error}")
                    .red()
                    .to_string()
            }
            ProgressEvent::RollingBack { to } => {
                format!("rolling back to {to}").yellow().to_string()
            }
            ProgressEvent::RollbackFailed { error } => error.to_string().red().to_string(),
            ProgressEvent::RollbackWaitFailed { error } => {
                format!("the rolled back service did not settle either:\n{error}")
                    .red()
                    .to_string()
            }
            ProgressEvent::RollbackRestored => {
                "order restored, but still reporting on the original error"
                    .yellow()
                    .to_string()
            }
        };
        Some(line)
    }

    fn render_diff(&self, diff: &TaskDiff) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text | OutputFormat::Log => {
                format!("these are the changes:\n{diff}")
            }
        }
    }
}

fn render_revisions(previous: &str, registered: &TaskDefinition) -> String {
    let rows = vec![
        RevisionRow {
            role: "old",
            family_revision: family_revision_of(previous),
            arn: previous.to_string(),
        },
        RevisionRow {
            role: "new",
            family_revision: registered.family_revision(),
            arn: registered.arn.clone(),
        },
    ];
    format!("changing task definition:\n{}", Table::new(rows))
}

/// Extracts `family:revision` from a task definition ARN.
fn family_revision_of(arn: &str) -> String {
    arn.rsplit_once('/')
        .map_or(arn, |(_, family_revision)| family_revision)
        .to_string()
}

impl<W: Write + Send> ProgressReporter for ConsoleReporter<W> {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        let rendered = self.render(event);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *state;

        // Console output is best effort
        if matches!(event, ProgressEvent::PollTick { .. }) {
            let _ = write!(state.writer, ".");
            state.dots += 1;
            if state.dots >= DOTS_PER_LINE {
                let _ = writeln!(state.writer);
                state.dots = 0;
            }
        } else if let Some(text) = rendered {
            if state.dots > 0 {
                let _ = writeln!(state.writer);
                state.dots = 0;
            }
            let _ = writeln!(state.writer, "{text}");
        }
        let _ = state.writer.flush();
    }
}

impl<W: Write + Send> std::fmt::Debug for ConsoleReporter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleReporter")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner;
    use crate::config::{ContainerPatch, TaskPatch};
    use crate::testing::{self, NEW_TASK_DEF, OLD_TASK_DEF};

    fn output_of(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn tick() -> ProgressEvent<'static> {
        ProgressEvent::PollTick {
            phase: WaitPhase::Deployment,
            attempt: 1,
        }
    }

    #[test]
    fn test_dots_wrap_every_eighty_ticks() {
        let reporter = ConsoleReporter::new(Vec::new(), OutputFormat::Text);
        for _ in 0..81 {
            reporter.on_progress(&tick());
        }
        reporter.on_progress(&ProgressEvent::DryRun);

        let output = output_of(reporter);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1], ".");
        assert!(lines[2].contains("dry run"));
    }

    #[test]
    fn test_diff_as_json() {
        let patch = TaskPatch::default()
            .with_container("app", ContainerPatch::default().with_image("app:2"));
        let (_, diff) = planner::apply(&patch, &testing::template());

        let reporter = ConsoleReporter::new(Vec::new(), OutputFormat::Json);
        reporter.on_progress(&ProgressEvent::Changes { diff: &diff });

        let value: serde_json::Value = serde_json::from_str(&output_of(reporter)).unwrap();
        assert_eq!(value["containerDefinitions"]["app"]["image"]["isNow"], "app:2");
    }

    #[test]
    fn test_diff_as_text() {
        let patch = TaskPatch::default().with_memory("1024");
        let (_, diff) = planner::apply(&patch, &testing::template());

        let reporter = ConsoleReporter::new(Vec::new(), OutputFormat::Text);
        reporter.on_progress(&ProgressEvent::Changes { diff: &diff });

        let output = output_of(reporter);
        assert!(output.starts_with("these are the changes:\n"));
        assert!(output.contains("memory was: \"512\" and now is: \"1024\""));
    }

    #[test]
    fn test_registered_table() {
        let registered = testing::task_definition(NEW_TASK_DEF, 8, testing::template());
        let reporter = ConsoleReporter::new(Vec::new(), OutputFormat::Text);
        reporter.on_progress(&ProgressEvent::Registered {
            previous: OLD_TASK_DEF,
            registered: &registered,
        });

        let output = output_of(reporter);
        assert!(output.contains("web:7"));
        assert!(output.contains("web:8"));
        assert!(output.contains("Task definition"));
    }

    #[test]
    fn test_service_updated_is_silent() {
        let reporter = ConsoleReporter::new(Vec::new(), OutputFormat::Text);
        reporter.on_progress(&ProgressEvent::ServiceUpdated);
        assert!(output_of(reporter).is_empty());
    }

    #[test]
    fn test_family_revision_of() {
        assert_eq!(family_revision_of(OLD_TASK_DEF), "web:7");
        assert_eq!(family_revision_of("web:3"), "web:3");
    }
}
