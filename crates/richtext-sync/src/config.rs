//! Sync engine configuration.
//!
//! Defaults suit most hosts. Overrides come from `RICHTEXT_SYNC_*` environment
//! variables or a camelCase JSON object; both are validated before use.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// URL given to a link node that arrives without one.
    pub link_placeholder: String,
    /// Treat editor updates that only moved the selection as non-edits.
    pub ignore_selection_change: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            link_placeholder: "#".to_string(),
            ignore_selection_change: true,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `RICHTEXT_SYNC_LINK_PLACEHOLDER`: URL for links without one (default `#`)
    /// - `RICHTEXT_SYNC_IGNORE_SELECTION_CHANGE`: `true`/`false` (default `true`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`SyncConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(placeholder) = lookup("RICHTEXT_SYNC_LINK_PLACEHOLDER") {
            config.link_placeholder = placeholder;
        }
        if let Some(value) = lookup("RICHTEXT_SYNC_IGNORE_SELECTION_CHANGE") {
            config.ignore_selection_change =
                parse_bool("RICHTEXT_SYNC_IGNORE_SELECTION_CHANGE", &value)?;
        }

        config.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.link_placeholder.trim().is_empty() {
            return Err(ConfigError::EmptyLinkPlaceholder);
        }
        Ok(self)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Link placeholder must not be empty")]
    EmptyLinkPlaceholder,

    #[error("{var} must be a boolean, got {value:?}")]
    InvalidBool { var: &'static str, value: String },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}
