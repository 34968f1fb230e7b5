//! Waiting for a service to reach steady state.
//!
//! The poller samples the service on a fixed interval until the health check
//! passes, the deadline expires, or the caller cancels. Health is only
//! evaluated on ticks, and only one fetch and check cycle runs at a time.

use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, WaitError};
use crate::progress::{ProgressEvent, ProgressReporter, WaitPhase};

use super::client::EcsApi;
use super::events::{EventCorrelator, EventMatcher};
use super::health::HealthChecker;
use super::types::ServiceSnapshot;

/// Default time between two health checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls a service until it is steady.
pub struct SteadyStatePoller<'a, C: EcsApi + ?Sized> {
    client: &'a C,
    matcher: &'a dyn EventMatcher,
    reporter: &'a dyn ProgressReporter,
    interval: Duration,
}

impl<'a, C: EcsApi + ?Sized> SteadyStatePoller<'a, C> {
    /// Creates a poller with the default interval.
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
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the poll interval. A zero interval falls back to the default.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Returns the poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until `service` is steady.
    ///
    /// The first health check happens one interval after the initial fetch.
    /// When a check fails the service is fetched again and its events are
    /// scanned for failures, which end up in the timeout error.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when `timeout` elapses first, `Cancelled` when
    /// `cancel` fires first, and any fetch, health check or event correlation
    /// error as soon as it happens.
    pub async fn wait_until_good(
        &self,
        service: &ServiceSnapshot,
        timeout: Duration,
        phase: WaitPhase,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cluster = service.cluster_arn.as_str();
        let name = service.service_name.as_str();
        let checker = HealthChecker::new(self.client);
        let mut correlator = EventCorrelator::new(self.matcher);

        info!(
            "Waiting up to {} for {name} to reach steady state",
            humantime::format_duration(timeout)
        );

        let mut current = self.client.describe_service(cluster, name).await?;

        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("Wait for {name} cancelled after {attempt} polls");
                    return Err(WaitError::Cancelled {
                        service: name.to_string(),
                    }
                    .into());
                }
                () = &mut deadline => {
                    debug!("Wait for {name} timed out after {attempt} polls");
                    return Err(WaitError::Timeout {
                        service: name.to_string(),
                        timeout,
                        errors: correlator.into_errors(),
                    }
                    .into());
                }
                _ = ticker.tick() => {
                    attempt = attempt.saturating_add(1);

                    if checker.looks_good(&current).await? {
                        debug!("{name} is steady after {attempt} polls");
                        return Ok(());
                    }

                    current = self.client.describe_service(cluster, name).await?;

                    let found = correlator.scan(&current)?;
                    if !found.is_empty() {
                        self.reporter.on_progress(&ProgressEvent::FailureEvents { lines: &found });
                    }

                    self.reporter.on_progress(&ProgressEvent::PollTick { phase, attempt });
                }
            }
        }
    }
}

impl<C: EcsApi + ?Sized> std::fmt::Debug for SteadyStatePoller<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteadyStatePoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
