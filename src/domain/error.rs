//! Domain error types.

/// A malformed list value (instrument list, enabled indicator list).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValueError {
    #[error("empty token in list")]
    EmptyToken,

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
}

/// Top-level error type for confluence.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("instrument {0} is not configured")]
    UnknownInstrument(String),

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("insufficient data for {instrument}: have {bars} bars, need {minimum}")]
    InsufficientData {
        instrument: String,
        bars: usize,
        minimum: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfluenceError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ConfluenceError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        ConfluenceError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&ConfluenceError> for std::process::ExitCode {
    fn from(err: &ConfluenceError) -> Self {
        let code: u8 = match err {
            ConfluenceError::Io(_) => 1,
            ConfluenceError::ConfigParse { .. }
            | ConfluenceError::ConfigMissing { .. }
            | ConfluenceError::ConfigInvalid { .. } => 2,
            ConfluenceError::Data { .. } => 3,
            ConfluenceError::NoData { .. } | ConfluenceError::InsufficientData { .. } => 5,
            ConfluenceError::Report { .. } => 6,
            ConfluenceError::UnknownInstrument(_) => 7,
        };
        std::process::ExitCode::from(code)
    }
}
