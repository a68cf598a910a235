use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Identifier for one external signal source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Trends,
    Forum,
    Social,
    Launchboard,
    Codehost,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Trends,
        SourceId::Forum,
        SourceId::Social,
        SourceId::Launchboard,
        SourceId::Codehost,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Trends => "trends",
            SourceId::Forum => "forum",
            SourceId::Social => "social",
            SourceId::Launchboard => "launchboard",
            SourceId::Codehost => "codehost",
        }
    }

    /// Parse a source identifier from its wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<SourceId> {
        match s {
            "trends" => Some(SourceId::Trends),
            "forum" => Some(SourceId::Forum),
            "social" => Some(SourceId::Social),
            "launchboard" => Some(SourceId::Launchboard),
            "codehost" => Some(SourceId::Codehost),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// `CollectError` in themeradar-collect has variants with a field named
// `source: SourceId`; thiserror requires such fields to implement `Error`.
impl std::error::Error for SourceId {}

/// Per-source rate window and endpoint settings loaded from `sources.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Maximum requests allowed within one window.
    pub request_limit: u32,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Endpoint base URL. Overridable so tests can point at a local server.
    pub base_url: Option<String>,
}

impl SourceSettings {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesFile {
    pub sources: HashMap<SourceId, SourceSettings>,
}

impl SourcesFile {
    /// Settings for one source, falling back to [`default_settings`] when the
    /// file does not list it.
    #[must_use]
    pub fn settings_for(&self, source: SourceId) -> SourceSettings {
        self.sources
            .get(&source)
            .cloned()
            .unwrap_or_else(|| default_settings(source))
    }
}

impl Default for SourcesFile {
    fn default() -> Self {
        let sources = SourceId::ALL
            .into_iter()
            .map(|s| (s, default_settings(s)))
            .collect();
        Self { sources }
    }
}

/// Conservative defaults matching the remote APIs' published limits.
#[must_use]
pub fn default_settings(source: SourceId) -> SourceSettings {
    let (request_limit, window_secs) = match source {
        SourceId::Trends => (60, 60),
        SourceId::Forum => (100, 600),
        SourceId::Social => (180, 900),
        SourceId::Launchboard => (50, 900),
        SourceId::Codehost => (30, 60),
    };
    SourceSettings {
        request_limit,
        window_secs,
        base_url: None,
    }
}

/// Load and validate per-source settings from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: SourcesFile = serde_yaml::from_str(&content)?;
    validate_sources(&file)?;
    Ok(file)
}

fn validate_sources(file: &SourcesFile) -> Result<(), ConfigError> {
    for (source, settings) in &file.sources {
        if settings.request_limit == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{source}' has request_limit 0; must be positive"
            )));
        }
        if settings.window_secs == 0 {
            return Err(ConfigError::Validation(format!(
                "source '{source}' has window_secs 0; must be positive"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_round_trips_through_str() {
        for source in SourceId::ALL {
            assert_eq!(SourceId::parse(source.as_str()), Some(source));
        }
    }

    #[test]
    fn unknown_source_name_is_rejected() {
        assert_eq!(SourceId::parse("pinterest"), None);
        assert_eq!(SourceId::parse(""), None);
    }

    #[test]
    fn default_file_covers_every_source() {
        let file = SourcesFile::default();
        for source in SourceId::ALL {
            let settings = file.settings_for(source);
            assert!(settings.request_limit > 0, "{source} has zero limit");
            assert!(settings.window_secs > 0, "{source} has zero window");
        }
    }

    #[test]
    fn settings_for_unlisted_source_falls_back_to_default() {
        let file = SourcesFile {
            sources: HashMap::new(),
        };
        let settings = file.settings_for(SourceId::Codehost);
        assert_eq!(settings.request_limit, 30);
        assert_eq!(settings.window_secs, 60);
    }

    #[test]
    fn yaml_parse_and_validate() {
        let yaml = "
sources:
  trends:
    request_limit: 10
    window_secs: 60
  forum:
    request_limit: 20
    window_secs: 120
    base_url: \"http://localhost:9999\"
";
        let file: SourcesFile = serde_yaml::from_str(yaml).expect("parse");
        validate_sources(&file).expect("validate");
        assert_eq!(file.settings_for(SourceId::Trends).request_limit, 10);
        assert_eq!(
            file.settings_for(SourceId::Forum).base_url.as_deref(),
            Some("http://localhost:9999")
        );
    }

    #[test]
    fn zero_request_limit_fails_validation() {
        let yaml = "
sources:
  social:
    request_limit: 0
    window_secs: 60
";
        let file: SourcesFile = serde_yaml::from_str(yaml).expect("parse");
        let result = validate_sources(&file);
        assert!(
            matches!(result, Err(ConfigError::Validation(_))),
            "expected Validation error, got: {result:?}"
        );
    }
}
