use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid checkpoint magic/header: {0}")]
    InvalidHeader(String),
    #[error("checkpoint file too short: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("invalid tokenizer file: {0}")]
    InvalidTokenizer(String),
    #[error("vocabulary miss: no token for id {0}")]
    TokenNotFound(u32),
    #[error("tensor error: {0}")]
    TensorError(#[from] lg_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
