//! Progress reporting for deployments.
//!
//! The deployer and poller never print. They describe what is happening as
//! [`ProgressEvent`]s and hand them to an injected [`ProgressReporter`], which
//! decides how (and whether) to present them.

use tracing::{debug, error, info, warn};

use crate::ecs::{HealthStatus, TaskDefinition};
use crate::error::{DeployError, ShipError};
use crate::planner::TaskDiff;

/// Which wait a poll belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the new revision to settle.
    Deployment,
    /// Waiting for the previous revision to settle again.
    Rollback,
}

/// Something worth telling the operator about.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// The deployment is starting.
    Started {
        /// Cluster name.
        cluster: &'a str,
        /// Service name.
        service: &'a str,
    },
    /// Result of the informational pre-deployment health check.
    InitialHealth {
        /// Health of the service before any change.
        status: &'a HealthStatus,
    },
    /// The pre-deployment health check itself failed.
    InitialHealthUnknown {
        /// Why the check failed.
        error: &'a ShipError,
    },
    /// The patch changes nothing.
    UpToDate,
    /// The patch changes something.
    Changes {
        /// What changes.
        diff: &'a TaskDiff,
    },
    /// Stopping before any mutation because this is a dry run.
    DryRun,
    /// A new task definition revision was registered.
    Registered {
        /// Task definition the service pointed at.
        previous: &'a str,
        /// The new revision.
        registered: &'a TaskDefinition,
    },
    /// The service now points at the new revision.
    ServiceUpdated,
    /// Not waiting for the service to settle; outcome unverified.
    NotWaiting,
    /// Waiting for steady state.
    Waiting {
        /// Which wait this is.
        phase: WaitPhase,
    },
    /// One poll cycle finished without reaching steady state.
    PollTick {
        /// Which wait this is.
        phase: WaitPhase,
        /// Number of cycles so far.
        attempt: u32,
    },
    /// Failure-looking service events were found while polling.
    FailureEvents {
        /// Formatted event lines.
        lines: &'a [String],
    },
    /// The new revision reached steady state.
    Succeeded,
    /// Waiting for the new revision failed.
    WaitFailed {
        /// The error that will be reported.
        error: &'a ShipError,
    },
    /// Pointing the service back at the previous revision.
    RollingBack {
        /// The revision rolled back to.
        to: &'a str,
    },
    /// The compensating update failed.
    RollbackFailed {
        /// What went wrong.
        error: &'a DeployError,
    },
    /// The rolled back service did not settle either.
    RollbackWaitFailed {
        /// What went wrong.
        error: &'a ShipError,
    },
    /// The rolled back service is steady again.
    RollbackRestored,
}

/// Receives progress events.
pub trait ProgressReporter: Send + Sync {
    /// Called for every event, in order.
    fn on_progress(&self, event: &ProgressEvent<'_>);
}

/// Reporter that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressEvent<'_> {
    /// Short stable name of the event kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::InitialHealth { .. } => "initial_health",
            Self::InitialHealthUnknown { .. } => "initial_health_unknown",
            Self::UpToDate => "up_to_date",
            Self::Changes { .. } => "changes",
            Self::DryRun => "dry_run",
            Self::Registered { .. } => "registered",
            Self::ServiceUpdated => "service_updated",
            Self::NotWaiting => "not_waiting",
            Self::Waiting { .. } => "waiting",
            Self::PollTick { .. } => "poll_tick",
            Self::FailureEvents { .. } => "failure_events",
            Self::Succeeded => "succeeded",
            Self::WaitFailed { .. } => "wait_failed",
            Self::RollingBack { .. } => "rolling_back",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::RollbackWaitFailed { .. } => "rollback_wait_failed",
            Self::RollbackRestored => "rollback_restored",
        }
    }
}

impl ProgressReporter for TracingReporter {
    fn on_progress(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started { cluster, service } => {
                info!("Updating service {service} in cluster {cluster}");
            }
            ProgressEvent::InitialHealth { status } => {
                if status.healthy {
                    info!("The service looks good to begin with");
                } else {
                    warn!("The service doesn't look good to begin with: {status}");
                }
            }
            ProgressEvent::InitialHealthUnknown { error } => {
                warn!("Unable to check the service before deploying: {error}");
            }
            ProgressEvent::UpToDate => info!("The service is up to date, nothing to do"),
            ProgressEvent::Changes { diff } => info!("These are the changes:\n{diff}"),
            ProgressEvent::DryRun => {
                info!("Not proceeding with the updates because this is a dry run");
            }
            ProgressEvent::Registered {
                previous,
                registered,
            } => {
                info!(
                    "Changing task definition from {previous} to {}",
                    registered.arn
                );
            }
            ProgressEvent::ServiceUpdated => debug!("Service update submitted"),
            ProgressEvent::NotWaiting => {
                warn!("Not waiting for the service to reflect changes; the outcome is unverified");
            }
            ProgressEvent::Waiting { phase } => match phase {
                WaitPhase::Deployment => {
                    info!("Waiting for the service to reflect the new changes");
                }
                WaitPhase::Rollback => info!("Waiting for the rolled back service to settle"),
            },
            ProgressEvent::PollTick { phase, attempt } => {
                debug!("Poll {attempt} ({phase:?}): not steady yet");
            }
            ProgressEvent::FailureEvents { lines } => {
                for line in *lines {
                    warn!("{line}");
                }
            }
            ProgressEvent::Succeeded => info!("Now everything looks good"),
            ProgressEvent::WaitFailed { error } => {
                error!("There was an error updating the service: {error}");
            }
            ProgressEvent::RollingBack { to } => warn!("Rolling back to {to}"),
            ProgressEvent::RollbackFailed { error } => error!("{error}"),
            ProgressEvent::RollbackWaitFailed { error } => {
                error!("Stopped waiting for the rollback: {error}");
            }
            ProgressEvent::RollbackRestored => {
                info!("Order restored, but still reporting on the original error");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::recording::RecordingReporter;
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::default();
        reporter.on_progress(&ProgressEvent::UpToDate);
        reporter.on_progress(&ProgressEvent::Waiting {
            phase: WaitPhase::Rollback,
        });

        assert_eq!(reporter.kinds(), vec!["up_to_date", "waiting"]);
        assert!(reporter.saw("waiting"));
        assert_eq!(reporter.count("dry_run"), 0);
    }

    #[test]
    fn test_tracing_reporter_accepts_every_event() {
        let reporter = TracingReporter;
        let lines = vec![String::from("[ERROR] t: unable")];
        reporter.on_progress(&ProgressEvent::FailureEvents { lines: &lines });
        reporter.on_progress(&ProgressEvent::RollbackFailed {
            error: &DeployError::RollbackFailed {
                message: String::from("throttled"),
            },
        });
    }
}
