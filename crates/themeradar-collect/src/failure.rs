//! Failure classification for collector errors.
//!
//! Every error that escapes a collector passes through the classifier, which
//! decides whether the retry loop should try again, assigns a severity for
//! logging, and accumulates per-source counters so the orchestrator can
//! report an end-of-run summary.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use themeradar_core::SourceId;

use crate::error::CollectError;

/// How bad an error is, for logging and the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Transient; the retry loop may recover on its own.
    Warning,
    /// The source failed for this run but other sources are unaffected.
    Error,
    /// Operator attention needed (bad credential, schema drift).
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated error counts for one collection run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorSummary {
    pub total: u64,
    pub by_severity: HashMap<String, u64>,
    pub by_source: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    by_severity: HashMap<Severity, u64>,
    by_source: HashMap<SourceId, u64>,
}

/// Retry policy plus error accounting, scoped to one collection run.
#[derive(Debug, Default)]
pub struct FailureClassifier {
    counters: Mutex<Counters>,
}

impl FailureClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the retry loop should attempt the request again.
    ///
    /// Rate limits and transient transport failures retry; credential
    /// problems, deserialization failures, and 4xx statuses do not, since
    /// repeating the identical request cannot change the answer.
    ///
    /// This only classifies the error. The attempt budget lives with the
    /// caller: [`fetch_with_retry`](crate::fetch_with_retry) counts
    /// attempts and [`RateGovernor::backoff`](crate::RateGovernor::backoff)
    /// turns an exhausted budget into [`CollectError::RetryExhausted`].
    #[must_use]
    pub fn should_retry(&self, error: &CollectError) -> bool {
        match error {
            CollectError::RateLimited { .. } => true,
            CollectError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            CollectError::UnexpectedStatus { status, .. } => *status >= 500,
            CollectError::Unauthorized { .. }
            | CollectError::MissingCredential { .. }
            | CollectError::Deserialize { .. }
            | CollectError::RetryExhausted { .. }
            | CollectError::Cancelled => false,
        }
    }

    #[must_use]
    pub fn severity_for(&self, error: &CollectError) -> Severity {
        match error {
            CollectError::RateLimited { .. } | CollectError::Http(_) => Severity::Warning,
            CollectError::UnexpectedStatus { .. }
            | CollectError::RetryExhausted { .. }
            | CollectError::Cancelled => Severity::Error,
            CollectError::Unauthorized { .. }
            | CollectError::MissingCredential { .. }
            | CollectError::Deserialize { .. } => Severity::Critical,
        }
    }

    /// Logs the error at a level matching its severity and counts it.
    pub fn log_error(&self, source: SourceId, error: &CollectError) {
        let severity = self.severity_for(error);
        match severity {
            Severity::Warning => {
                tracing::warn!(source = %source, error = %error, "collector error");
            }
            Severity::Error => {
                tracing::error!(source = %source, error = %error, "collector error");
            }
            Severity::Critical => {
                tracing::error!(
                    source = %source,
                    error = %error,
                    severity = %severity,
                    "collector error requires operator attention"
                );
            }
        }

        let mut counters = self
            .counters
            .lock()
            .expect("failure classifier mutex poisoned");
        counters.total += 1;
        *counters.by_severity.entry(severity).or_default() += 1;
        *counters.by_source.entry(source).or_default() += 1;
    }

    /// Snapshot of the counters accumulated so far.
    #[must_use]
    pub fn error_summary(&self) -> ErrorSummary {
        let counters = self
            .counters
            .lock()
            .expect("failure classifier mutex poisoned");
        ErrorSummary {
            total: counters.total,
            by_severity: counters
                .by_severity
                .iter()
                .map(|(k, v)| (k.as_str().to_owned(), *v))
                .collect(),
            by_source: counters
                .by_source
                .iter()
                .map(|(k, v)| (k.as_str().to_owned(), *v))
                .collect(),
        }
    }
}
