//! Signal collection: rate governance, failure classification, the five
//! source collectors, and the orchestrator that drives them.

mod cancel;
mod error;
mod failure;
mod growth;
mod orchestrator;
mod rate;
mod retry;
pub mod sources;
mod types;

pub use cancel::CancelFlag;
pub use error::CollectError;
pub use failure::{ErrorSummary, FailureClassifier, Severity};
pub use orchestrator::{
    run_collection, CollectRequest, CollectionSummary, OrchestratorError, OutcomeStatus,
    SourceOutcome, SourceSelection,
};
pub use rate::{BackoffPolicy, RateGovernor};
pub use retry::fetch_with_retry;
pub use types::{CollectorContext, Observation};
