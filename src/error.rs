use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TipError>;

/// Everything that can go wrong between the tip files, the state file and the engine.
#[derive(Debug, Error)]
pub enum TipError {
    #[error("could not load tips for '{language}': {details}")]
    Load { language: String, details: String },

    #[error("invalid tip #{index}: missing or empty '{field}'")]
    Validation { index: usize, field: &'static str },

    #[error("unsupported language '{code}'")]
    UnsupportedLanguage { code: String },

    #[error("no tips available for '{language}'")]
    EmptyCollection { language: String },

    #[error("state file {path}: {details}")]
    Storage { path: PathBuf, details: String },

    #[error("invalid configuration: {details}")]
    Config { details: String },
}

impl From<config::ConfigError> for TipError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config { details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let err = TipError::Validation { index: 3, field: "title" };
        assert_eq!(err.to_string(), "invalid tip #3: missing or empty 'title'");

        let err = TipError::UnsupportedLanguage { code: "xx".into() };
        assert_eq!(err.to_string(), "unsupported language 'xx'");
    }

    #[test]
    fn config_errors_convert() {
        let err: TipError = config::ConfigError::Message("bad".into()).into();
        assert!(matches!(err, TipError::Config { .. }));
    }
}
