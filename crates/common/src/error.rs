use thiserror::Error;

/// Everything that can go wrong between the user and the signal service.
/// All variants are recoverable and render as a message for the view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Validation(String),
    #[error("controller has been disposed")]
    Disposed,
}

impl SyncError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Service(_) => "service",
            Self::Validation(_) => "validation",
            Self::Disposed => "disposed",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
