use thiserror::Error;

/// Failure of a pass invocation.
///
/// Passes are not atomic: rewrites committed before the failure stay in the
/// graph.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("pass not implemented yet: {0}")]
    NotImplemented(&'static str),
}

impl PassError {
    pub fn precondition(message: impl Into<String>) -> Self {
        PassError::PreconditionViolation(message.into())
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, PassError::NotImplemented(_))
    }
}

impl From<anyhow::Error> for PassError {
    fn from(err: anyhow::Error) -> Self {
        PassError::PreconditionViolation(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, PassError>;
