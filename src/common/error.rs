use rust_bert::RustBertError;
use rust_tokenizers::error::TokenizerError;
use tch::TchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FineTuneError {
    #[error("IO error: {0}")]
    IOError(String),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("Tch tensor error: {0}")]
    TchError(String),

    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid configuration error: {0}")]
    InvalidConfigurationError(String),

    #[error("Record {index} has no `{language}` field")]
    MissingField { index: usize, language: String },

    #[error("Invalid train/test split: {0}")]
    InvalidSplit(String),

    #[error("Cannot compute metrics over an empty prediction batch")]
    EmptyPredictions,

    #[error("Value error: {0}")]
    ValueError(String),
}

impl From<std::io::Error> for FineTuneError {
    fn from(error: std::io::Error) -> Self {
        FineTuneError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for FineTuneError {
    fn from(error: serde_json::Error) -> Self {
        FineTuneError::JsonError(error.to_string())
    }
}

impl From<TokenizerError> for FineTuneError {
    fn from(error: TokenizerError) -> Self {
        FineTuneError::TokenizerError(error.to_string())
    }
}

impl From<TchError> for FineTuneError {
    fn from(error: TchError) -> Self {
        FineTuneError::TchError(error.to_string())
    }
}

impl From<RustBertError> for FineTuneError {
    fn from(error: RustBertError) -> Self {
        FineTuneError::ModelError(error.to_string())
    }
}
