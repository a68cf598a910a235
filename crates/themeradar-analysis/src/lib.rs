//! Theme analysis: the shared scoring formulas, the periodic batch scorer,
//! and the insight-producing theme analyzer.

use themeradar_db::DbError;
use thiserror::Error;

mod analyzer;
mod batch;
pub mod scoring;

pub use analyzer::{analyze_theme, analyze_themes, AnalyzeReport, ThemeAnalysis};
pub use batch::{run_batch_update, BatchMode, BatchReport};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Db(#[from] DbError),
}
