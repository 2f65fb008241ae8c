use thiserror::Error;

use rowpipe_operators::OpError;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("invalid projection: {0}")]
    Plan(String),

    #[error("operator: {0}")]
    Operator(#[from] OpError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("pipeline task: {0}")]
    Join(String),
}

impl ExecError {
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, ExecError::Operator(e) if e.is_resource_exhaustion())
    }

    pub fn is_killed(&self) -> bool {
        matches!(self, ExecError::Operator(OpError::JobKilled(_)))
    }
}

impl From<rowpipe_core::Error> for ExecError {
    fn from(e: rowpipe_core::Error) -> Self {
        match e {
            rowpipe_core::Error::Config(msg) => ExecError::Config(msg),
            other => ExecError::Plan(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ExecError {
    fn from(e: tokio::task::JoinError) -> Self {
        ExecError::Join(e.to_string())
    }
}
