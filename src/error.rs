use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error carried back to `main`, which prints the message and exits
/// with `exit_code`.
///
/// Exit codes:
/// - 2: bad input or configuration
/// - 3: no usable data
/// - 4: runtime / pipeline failure
#[derive(Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

/// Failures raised by the aggregation pipeline itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PollError {
    /// A race has no admissible polls on `day` and no prior to stand in for them.
    #[error("race {race_id} has no polls as of {day} and no configured assumption")]
    MissingAssumption { race_id: String, day: NaiveDate },

    /// The estimator was handed an empty sample.
    #[error("estimator called with no margins")]
    InsufficientData,

    /// A feed could not be fetched or read.
    #[error("feed for {race_id} unavailable: {message}")]
    Feed { race_id: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<PollError> for AppError {
    fn from(err: PollError) -> Self {
        let code = match err {
            PollError::Config(_) => 2,
            PollError::MissingAssumption { .. } | PollError::InsufficientData | PollError::Feed { .. } => 4,
        };
        AppError::new(code, err.to_string())
    }
}
