use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::engine::{AssignmentEngine, PassReport};
use super::host::WorkHost;
use super::settings::WorkSettings;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReassignStatus {
    Settled,
    GaveUp,
}

impl ReassignStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReassignStatus::Settled => "settled",
            ReassignStatus::GaveUp => "gave up",
        }
    }
}

/// Result of one supervised invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ReassignOutcome {
    pub status: ReassignStatus,
    pub attempts: u32,
    /// Report of the final pass. On `GaveUp` its failures name every
    /// mutation that was still failing.
    pub last_pass: PassReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ReassignOutcome {
    pub fn is_settled(&self) -> bool {
        self.status == ReassignStatus::Settled
    }
}

/// Repeats whole assignment passes until one completes without failures.
///
/// Passes are idempotent, so already-applied priorities are simply set
/// again on each attempt.
#[derive(Debug, Clone)]
pub struct RetrySupervisor {
    engine: AssignmentEngine,
    max_attempts: u32,
}

impl RetrySupervisor {
    pub fn new(engine: AssignmentEngine) -> Self {
        Self {
            engine,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt bound. Values below one are raised to one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn engine(&self) -> &AssignmentEngine {
        &self.engine
    }

    /// Run passes until one is clean or the attempt bound is reached.
    /// Never fails; exhaustion is reported through the outcome.
    pub fn reassign<H: WorkHost>(&self, host: &H, settings: &WorkSettings) -> ReassignOutcome {
        let started_at = Utc::now();
        let mut attempts = 0;
        let mut last_pass = PassReport::default();

        while attempts < self.max_attempts {
            attempts += 1;
            last_pass = self.engine.run_pass(host, settings);

            if last_pass.is_clean() {
                if attempts > 1 {
                    info!(attempts, "work assignment settled after retries");
                }
                return ReassignOutcome {
                    status: ReassignStatus::Settled,
                    attempts,
                    last_pass,
                    started_at,
                    finished_at: Utc::now(),
                };
            }

            debug!(
                attempt = attempts,
                failures = last_pass.failures.len(),
                remaining = self.max_attempts - attempts,
                "work assignment pass failed"
            );
        }

        error!(
            attempts,
            failures = last_pass.failures.len(),
            "work assignment giving up"
        );

        ReassignOutcome {
            status: ReassignStatus::GaveUp,
            attempts,
            last_pass,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
