use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transient automation failure: {0}")]
    Transient(String),

    #[error("Window activation failed after {attempts} attempts")]
    ActivationExhausted { attempts: u32 },

    #[error("Fatal process failure: {0}")]
    FatalProcess(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Application is not running: {0}")]
    NotRunning(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// The coarse failure classes callers are expected to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller. Never retried.
    InvalidArgument,
    /// The UI tree raced us. Retrying the step may succeed.
    TransientAutomationFailure,
    /// Focus could not be obtained; the driver continued best-effort.
    ActivationExhausted,
    /// The application had to be force-terminated.
    FatalProcessFailure,
}

impl AutomationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::InvalidArgument(_) | AutomationError::Config(_) => {
                ErrorKind::InvalidArgument
            }
            AutomationError::ActivationExhausted { .. } => ErrorKind::ActivationExhausted,
            AutomationError::FatalProcess(_) => ErrorKind::FatalProcessFailure,
            _ => ErrorKind::TransientAutomationFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientAutomationFailure
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        AutomationError::InvalidArgument(msg.into())
    }
}
