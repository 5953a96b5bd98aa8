use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use crate::core::debug_logger::get_debug_logger;
use crate::core::ratelimit::{CheckError, CheckResult, Checker};
use crate::exporter::metrics::{CheckStatus, ExporterMetrics};

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error("check timed out after {0:?}")]
    Timeout(Duration),
}

/// What the HTTP handlers can see of the poller's progress
#[derive(Debug, Default)]
pub struct ExporterState {
    /// Last successful check, kept across later failures
    pub last_result: Option<CheckResult>,
    /// Error of the most recent attempt, cleared by a success
    pub last_error: Option<String>,
    pub attempts: u64,
}

pub type SharedState = Arc<RwLock<ExporterState>>;

pub struct Poller {
    checker: Arc<Checker>,
    metrics: Arc<ExporterMetrics>,
    state: SharedState,
    interval: Duration,
    check_timeout: Duration,
}

impl Poller {
    pub fn new(
        checker: Arc<Checker>,
        metrics: Arc<ExporterMetrics>,
        state: SharedState,
        interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            checker,
            metrics,
            state,
            interval,
            check_timeout,
        }
    }

    /// Run a single check and publish its outcome.
    pub async fn poll_once(&self) -> Result<(), PollError> {
        let outcome = match tokio::time::timeout(self.check_timeout, self.checker.check()).await {
            Ok(result) => result.map_err(PollError::from),
            Err(_) => Err(PollError::Timeout(self.check_timeout)),
        };

        // The IP may only have been learned during this check
        let identity = self.checker.identity_string();
        self.metrics.record_check_time(&identity, chrono::Utc::now());

        let mut state = self.state.write().await;
        state.attempts += 1;

        match outcome {
            Ok(result) => {
                self.metrics.set_status(&identity, CheckStatus::Running);
                self.metrics.record_result(&identity, &result);
                state.last_result = Some(result);
                state.last_error = None;
                Ok(())
            }
            Err(e) => {
                get_debug_logger().warn(
                    "Poller",
                    "check_failed",
                    &format!("unable to check dockerhub ratelimits: {}", e),
                );
                self.metrics.set_status(&identity, CheckStatus::Error);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Poll forever. The first check runs immediately.
    pub async fn run(self) {
        self.metrics
            .set_status(&self.checker.identity_string(), CheckStatus::Startup);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // Failures are already logged and published
            let _ = self.poll_once().await;
        }
    }
}
