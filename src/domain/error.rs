//! Domain error types.

/// Top-level error type for trendcross.
#[derive(Debug, thiserror::Error)]
pub enum TrendcrossError {
    #[error("schema error: missing {field} ({reason})")]
    Schema { field: String, reason: String },

    #[error("insufficient data: have {bars} usable bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("no data in range {start} to {end}")]
    NoDataInRange { start: String, end: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("missing indicator data {indicator}: {reason}")]
    MissingIndicatorData { indicator: String, reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

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

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrendcrossError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        TrendcrossError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error kind.
    pub fn exit_status(&self) -> u8 {
        match self {
            TrendcrossError::Io(_) | TrendcrossError::Serialization(_) => 1,
            TrendcrossError::ConfigParse { .. }
            | TrendcrossError::ConfigMissing { .. }
            | TrendcrossError::ConfigInvalid { .. } => 2,
            TrendcrossError::DataSource { .. } | TrendcrossError::Schema { .. } => 3,
            TrendcrossError::InvalidParameter { .. } => 4,
            TrendcrossError::InsufficientData { .. }
            | TrendcrossError::NoDataInRange { .. }
            | TrendcrossError::MissingIndicatorData { .. } => 5,
        }
    }
}

impl From<&TrendcrossError> for std::process::ExitCode {
    fn from(err: &TrendcrossError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
