use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("argument error: {0}")]
    Args(String),
    #[error("context acquisition failed: {0}")]
    Context(String),
    #[error(transparent)]
    Model(#[from] lg_model::ModelError),
    #[error(transparent)]
    Tensor(#[from] lg_tensor::TensorError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
