//! Deployment orchestration.
//!
//! The [`Deployer`] takes a service from its current task definition to a
//! patched revision: fetch, pre-check, diff, register, update, wait. When the
//! wait fails the service is pointed back at the previous revision, and the
//! wait failure is what the caller gets back whatever the rollback does.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TaskPatch;
use crate::ecs::{
    DEFAULT_POLL_INTERVAL, EcsApi, EventMatcher, HealthChecker, ServiceSnapshot,
    SteadyStatePoller, TaskDefinition,
};
use crate::error::{DeployError, Result};
use crate::planner;
use crate::progress::{ProgressEvent, ProgressReporter, WaitPhase};

/// Default bound on each wait for steady state.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// One deployment attempt.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Cluster name or ARN.
    pub cluster: String,
    /// Service name.
    pub service: String,
    /// Overrides to apply.
    pub patch: TaskPatch,
    /// Bound on each wait for steady state.
    pub timeout: Duration,
    /// Stop after computing the diff.
    pub dry_run: bool,
    /// Stop after updating the service.
    pub no_wait: bool,
}

/// How a successful deployment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    /// The patch changes nothing; no mutation was made.
    UpToDate,
    /// Dry run; no mutation was made.
    DryRun,
    /// The service was updated but not waited for.
    Submitted,
    /// The service reached steady state on the new revision.
    Completed,
}

impl DeployRequest {
    /// Creates a request with the default timeout.
    #[must_use]
    pub fn new(cluster: impl Into<String>, service: impl Into<String>, patch: TaskPatch) -> Self {
        Self {
            cluster: cluster.into(),
            service: service.into(),
            patch,
            timeout: DEFAULT_TIMEOUT,
            dry_run: false,
            no_wait: false,
        }
    }

    /// Sets the wait timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the dry run flag.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the no wait flag.
    #[must_use]
    pub const fn with_no_wait(mut self, no_wait: bool) -> Self {
        self.no_wait = no_wait;
        self
    }

    /// Checks the request before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the cluster or service is blank.
    pub fn validate(&self) -> Result<()> {
        if self.cluster.trim().is_empty() {
            return Err(DeployError::InvalidInput { field: "cluster" }.into());
        }
        if self.service.trim().is_empty() {
            return Err(DeployError::InvalidInput { field: "service" }.into());
        }
        Ok(())
    }
}

/// Deploys patches to ECS services.
pub struct Deployer<'a, C: EcsApi + ?Sized> {
    /// Control plane client.
    client: &'a C,
    /// Decides which service events are failures.
    matcher: &'a dyn EventMatcher,
    /// Receives progress.
    reporter: &'a dyn ProgressReporter,
    /// Time between health checks while waiting.
    poll_interval: Duration,
}

impl<'a, C: EcsApi + ?Sized> Deployer<'a, C> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(
        client: &'a C,
        matcher: &'a dyn EventMatcher,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            client,
            matcher,
            reporter,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the time between health checks while waiting.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs one deployment.
    ///
    /// `cancel` aborts the waits; fetch, register and update calls are not
    /// interrupted.
    ///
    /// # Errors
    ///
    /// Returns the first error met before the wait, or the wait error itself
    /// once the service has been rolled back.
    pub async fn deploy(
        &self,
        request: &DeployRequest,
        cancel: &CancellationToken,
    ) -> Result<DeployOutcome> {
        request.validate()?;

        self.report(&ProgressEvent::Started {
            cluster: &request.cluster,
            service: &request.service,
        });

        let service = self
            .client
            .describe_service(&request.cluster, &request.service)
            .await?;

        self.pre_check(&service).await;

        let current = self
            .client
            .describe_task_definition(&service.task_definition)
            .await?;
        debug!("Service runs {}", current.family_revision());

        let (template, diff) = planner::apply(&request.patch, &current.to_template());

        if diff.is_empty() {
            self.report(&ProgressEvent::UpToDate);
            return Ok(DeployOutcome::UpToDate);
        }
        self.report(&ProgressEvent::Changes { diff: &diff });

        if request.dry_run {
            self.report(&ProgressEvent::DryRun);
            return Ok(DeployOutcome::DryRun);
        }

        let registered = self
            .client
            .register_task_definition(&template, &current)
            .await?;
        self.report(&ProgressEvent::Registered {
            previous: &current.arn,
            registered: &registered,
        });

        let updated = self
            .client
            .update_service(&service, &registered.arn)
            .await?;
        self.report(&ProgressEvent::ServiceUpdated);

        if request.no_wait {
            self.report(&ProgressEvent::NotWaiting);
            return Ok(DeployOutcome::Submitted);
        }

        self.report(&ProgressEvent::Waiting {
            phase: WaitPhase::Deployment,
        });

        match self
            .poller()
            .wait_until_good(&updated, request.timeout, WaitPhase::Deployment, cancel)
            .await
        {
            Ok(()) => {
                self.report(&ProgressEvent::Succeeded);
                info!("Deployed {} to {}", registered.family_revision(), service.service_name);
                Ok(DeployOutcome::Completed)
            }
            Err(err) => {
                self.report(&ProgressEvent::WaitFailed { error: &err });
                self.rollback(&updated, &current, request.timeout, cancel)
                    .await;
                Err(err)
            }
        }
    }

    /// Reports the health of the service before any change.
    async fn pre_check(&self, service: &ServiceSnapshot) {
        match HealthChecker::new(self.client).check(service).await {
            Ok(status) => self.report(&ProgressEvent::InitialHealth { status: &status }),
            Err(error) => self.report(&ProgressEvent::InitialHealthUnknown { error: &error }),
        }
    }

    /// Points the service back at `previous` and waits for it to settle.
    ///
    /// The outcome is only reported.
    async fn rollback(
        &self,
        service: &ServiceSnapshot,
        previous: &TaskDefinition,
        timeout: Duration,
        cancel: &CancellationToken,
    ) {
        self.report(&ProgressEvent::RollingBack { to: &previous.arn });

        let restored = match self.client.update_service(service, &previous.arn).await {
            Ok(restored) => restored,
            Err(err) => {
                let error = DeployError::RollbackFailed {
                    message: err.to_string(),
                };
                self.report(&ProgressEvent::RollbackFailed { error: &error });
                return;
            }
        };

        self.report(&ProgressEvent::Waiting {
            phase: WaitPhase::Rollback,
        });

        match self
            .poller()
            .wait_until_good(&restored, timeout, WaitPhase::Rollback, cancel)
            .await
        {
            Ok(()) => self.report(&ProgressEvent::RollbackRestored),
            Err(error) => self.report(&ProgressEvent::RollbackWaitFailed { error: &error }),
        }
    }

    fn poller(&self) -> SteadyStatePoller<'a, C> {
        SteadyStatePoller::new(self.client, self.matcher, self.reporter)
            .with_interval(self.poll_interval)
    }

    fn report(&self, event: &ProgressEvent<'_>) {
        self.reporter.on_progress(event);
    }
}

impl<C: EcsApi + ?Sized> std::fmt::Debug for Deployer<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
