//! Correlation of service events with a failing rollout.
//!
//! While a rollout is stuck, ECS usually explains why in the service event
//! stream ("... was unable to place a task ..."). The [`EventCorrelator`]
//! scans each fresh snapshot for such messages, remembering how far it has
//! already read so each event is reported once.

use chrono::{DateTime, Utc};

use crate::error::{Result, WaitError};

use super::types::ServiceSnapshot;

/// Default marker identifying failure-looking event messages.
pub const DEFAULT_FAILURE_MARKER: &str = "unable";

/// Decides whether an event message describes a failure.
pub trait EventMatcher: Send + Sync {
    /// Returns true if `message` looks like a failure.
    fn is_failure(&self, message: &str) -> bool;
}

impl<F> EventMatcher for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_failure(&self, message: &str) -> bool {
        self(message)
    }
}

/// Matches messages containing a fixed substring.
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    marker: String,
}

impl MarkerMatcher {
    /// Creates a matcher for the given marker.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for MarkerMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_MARKER)
    }
}

impl EventMatcher for MarkerMatcher {
    fn is_failure(&self, message: &str) -> bool {
        message.contains(&self.marker)
    }
}

/// Collects failure events newer than a moving checkpoint.
pub struct EventCorrelator<'a> {
    matcher: &'a dyn EventMatcher,
    checked_until: Option<DateTime<Utc>>,
    errors: Vec<String>,
}

impl<'a> EventCorrelator<'a> {
    /// Creates a correlator with no checkpoint yet.
    #[must_use]
    pub fn new(matcher: &'a dyn EventMatcher) -> Self {
        Self {
            matcher,
            checked_until: None,
            errors: Vec::new(),
        }
    }

    /// Scans a snapshot and returns the newly found error lines.
    ///
    /// The first scan anchors the checkpoint on the PRIMARY deployment's
    /// creation time. The checkpoint then advances to the newest event seen.
    ///
    /// # Errors
    ///
    /// Returns `NoPrimaryDeployment` if the first scan finds no PRIMARY
    /// deployment to anchor on.
    pub fn scan(&mut self, service: &ServiceSnapshot) -> Result<Vec<String>> {
        let since = match self.checked_until {
            Some(since) => since,
            None => {
                service
                    .primary_deployment()
                    .ok_or_else(|| WaitError::NoPrimaryDeployment {
                        service: service.service_name.clone(),
                    })?
                    .created_at
            }
        };

        let mut found = Vec::new();
        let mut latest = since;

        for event in &service.events {
            if event.created_at > since && self.matcher.is_failure(&event.message) {
                found.push(format!("[ERROR] {}: {}", event.created_at, event.message));
            }
            latest = latest.max(event.created_at);
        }

        self.checked_until = Some(latest);
        self.errors.extend(found.iter().cloned());
        Ok(found)
    }

    /// Returns the checkpoint, if established.
    #[must_use]
    pub const fn checked_until(&self) -> Option<DateTime<Utc>> {
        self.checked_until
    }

    /// Returns every error line collected so far.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Consumes the correlator and returns the collected error lines.
    #[must_use]
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

impl std::fmt::Debug for EventCorrelator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCorrelator")
            .field("checked_until", &self.checked_until)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
