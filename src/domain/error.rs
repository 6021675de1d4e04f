//! Domain error types.

use crate::domain::series::SeriesId;

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for tabacktest.
///
/// Everything except `Data` and `Io` is a configuration error: it is raised
/// while a strategy is being assembled, before any bar is simulated.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("invalid window for {indicator}: {window} (zero or warm-up overflow)")]
    InvalidWindow { indicator: String, window: usize },

    #[error("invalid percentage for {rule}: {value} (negative or out of range)")]
    InvalidPercentage { rule: String, value: String },

    #[error("indicator bound to series {found:?}, expected series {expected:?}")]
    SeriesMismatch { expected: SeriesId, found: SeriesId },

    #[error("invalid bar range {start}..={end} for a series of {len} bars")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("bar {index} at {timestamp} is not after the previous bar")]
    UnorderedBars { index: usize, timestamp: String },

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
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    /// True for every error raised while assembling a strategy.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, BacktestError::Data { .. } | BacktestError::Io(_))
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. }
            | BacktestError::InvalidWindow { .. }
            | BacktestError::InvalidPercentage { .. }
            | BacktestError::SeriesMismatch { .. }
            | BacktestError::InvalidRange { .. } => 2,
            BacktestError::RuleParse(_) | BacktestError::RuleInvalid { .. } => 4,
            BacktestError::Data { .. } | BacktestError::UnorderedBars { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
