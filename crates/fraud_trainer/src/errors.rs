use fraudscope_core::CoreError;
use thiserror::Error;

/// Errors returned by partitioning, resampling, training and evaluation.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A model was asked to score a matrix laid out differently from its training data
    #[error("feature mismatch: model trained on {expected:?}, got {actual:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("invalid stage transition: {0}")]
    InvalidStage(String),

    #[error("model '{0}' has not been trained")]
    UnknownModel(String),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
