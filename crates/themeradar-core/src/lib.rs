use thiserror::Error;

mod app_config;
mod config;
pub mod sources;
pub mod types;

pub use app_config::{AppConfig, Environment, TrendsBackendKind};
pub use config::{load_app_config, load_app_config_from_env};
pub use sources::{load_sources, SourceId, SourceSettings, SourcesFile};
pub use types::{
    AlertType, CompetitionLevel, Impact, InsightType, RevenueRange, TechnicalDifficulty,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("config validation failed: {0}")]
    Validation(String),
}
