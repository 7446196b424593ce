//! Optimistic alert verification.
//!
//! `verify` flips the alert to VERIFIED in the store before the request is
//! sent, then confirms with the backend. On failure the optimistic state is
//! kept by default and the error is surfaced; [`VerifyFailurePolicy::Revert`]
//! restores DETECTED instead.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use agni_core::{AlertId, VerifyFailurePolicy};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::gateway::{Endpoint, FetchGateway, Method};
use crate::health::{Source, UplinkMonitor};
use crate::store::ViewModelStore;

/// Failed verifications kept for display.
const MAX_VERIFY_FAILURES: usize = 20;

/// Result of a verify request.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Applied locally and acknowledged by the backend
    Confirmed,
    /// Already VERIFIED; no request was sent
    AlreadyVerified,
    /// Not in the current alert list; no request was sent
    UnknownAlert,
    /// Applied locally but the backend request failed
    Failed { error: SyncError, reverted: bool },
}

impl VerifyOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// A verification the backend did not acknowledge.
#[derive(Debug, Clone)]
pub struct VerifyFailure {
    pub alert_id: AlertId,
    pub error: SyncError,
    pub reverted: bool,
    pub at: DateTime<Utc>,
}

/// Two-phase verify: local apply, then backend confirm.
pub struct VerificationCoordinator {
    gateway: Arc<dyn FetchGateway>,
    store: Arc<ViewModelStore>,
    monitor: Arc<UplinkMonitor>,
    policy: VerifyFailurePolicy,
    failures: Mutex<VecDeque<VerifyFailure>>,
}

impl VerificationCoordinator {
    pub fn new(
        gateway: Arc<dyn FetchGateway>,
        store: Arc<ViewModelStore>,
        monitor: Arc<UplinkMonitor>,
        policy: VerifyFailurePolicy,
    ) -> Self {
        Self {
            gateway,
            store,
            monitor,
            policy,
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn policy(&self) -> VerifyFailurePolicy {
        self.policy
    }

    /// Verify an alert. The store reflects VERIFIED before this awaits.
    pub async fn verify(&self, alert_id: &str) -> VerifyOutcome {
        if !self.store.apply_verification(alert_id) {
            return match self.store.alert(alert_id) {
                Some(_) => VerifyOutcome::AlreadyVerified,
                None => {
                    warn!(alert_id, "verify requested for unknown alert");
                    VerifyOutcome::UnknownAlert
                }
            };
        }

        let endpoint = Endpoint::Verify(alert_id.to_string());
        match self.gateway.request(&endpoint, Method::Post, None).await {
            Ok(_) => {
                self.monitor.record_success(Source::Verify);
                info!(alert_id, "alert verification confirmed");
                VerifyOutcome::Confirmed
            }
            Err(e) => {
                let error = SyncError::from_fetch(endpoint.label(), e);
                self.monitor.record_failure(Source::Verify, &error);

                let reverted = match self.policy {
                    VerifyFailurePolicy::Keep => false,
                    VerifyFailurePolicy::Revert => self.store.revert_verification(alert_id),
                };
                warn!(alert_id, error = %error, reverted, "alert verification failed");

                self.push_failure(VerifyFailure {
                    alert_id: alert_id.to_string(),
                    error: error.clone(),
                    reverted,
                    at: Utc::now(),
                });
                VerifyOutcome::Failed { error, reverted }
            }
        }
    }

    fn push_failure(&self, failure: VerifyFailure) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.push_back(failure);
        while failures.len() > MAX_VERIFY_FAILURES {
            failures.pop_front();
        }
    }

    /// Unacknowledged verifications, oldest first.
    pub fn failures(&self) -> Vec<VerifyFailure> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
