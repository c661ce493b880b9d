use thiserror::Error;

/// Configuration problems detected after discovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration `{key}`: {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
