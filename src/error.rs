// /src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// A type alias for `Result<T, anyhow::Error>` to be used throughout the application.
pub type AppResult<T> = anyhow::Result<T>;

/// Broad classification of a [`UserError`], used for exit codes and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Environment,
    Filesystem,
    ResourceExhausted,
    Cancelled,
    ExternalTool,
}

/// Errors that are intended to be displayed directly to the user.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("'{url}' is not a valid repository URL")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("'{url}' has no hierarchical path to clone into")]
    UnsupportedUrl { url: String },

    #[error("Could not split host '{host}' into host and port")]
    InvalidHostPort { host: String },

    #[error("Environment entry '{entry}' must have the form key=value")]
    InvalidEnvEntry { entry: String },

    #[error("Could not determine your home directory. Pass --dir or set $GITREPO_DIR.")]
    HomeDirUnavailable,

    #[error("The parent of the storage directory, '{parent}', does not exist")]
    StorageParentMissing {
        parent: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}'")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not allocate a unique directory under '{temp_root}' after {attempts} attempts")]
    TempAttemptsExhausted { temp_root: PathBuf, attempts: u32 },

    #[error("'{command}' was cancelled")]
    Cancelled { command: String },

    #[error("Could not find the external command '{command}'")]
    ToolNotFound {
        command: String,
        #[source]
        source: which::Error,
    },

    #[error("The external command '{command}' failed to execute")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("The external command '{command}' exited with status {code}")]
    CommandExited { command: String, code: i32 },

    #[error("The external command '{command}' was terminated by a signal")]
    CommandTerminated { command: String, signal: Option<i32> },
}

impl UserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::InvalidUrl { .. }
            | UserError::UnsupportedUrl { .. }
            | UserError::InvalidHostPort { .. }
            | UserError::InvalidEnvEntry { .. }
            | UserError::HomeDirUnavailable => ErrorKind::Configuration,
            UserError::StorageParentMissing { .. } => ErrorKind::Environment,
            UserError::CreateDirFailed { .. } => ErrorKind::Filesystem,
            UserError::TempAttemptsExhausted { .. } => ErrorKind::ResourceExhausted,
            UserError::Cancelled { .. } => ErrorKind::Cancelled,
            UserError::ToolNotFound { .. }
            | UserError::CommandFailed { .. }
            | UserError::CommandExited { .. }
            | UserError::CommandTerminated { .. } => ErrorKind::ExternalTool,
        }
    }

    /// The process exit status to report for this error.
    pub fn exit_code(&self) -> i32 {
        match (self, self.kind()) {
            (UserError::CommandExited { code, .. }, _) if *code != 0 => *code,
            (
                UserError::CommandTerminated {
                    signal: Some(signal),
                    ..
                },
                _,
            ) => 128 + signal,
            (_, ErrorKind::Cancelled) => 130,
            _ => 1,
        }
    }
}

/// Classifies an application error, if it carries a [`UserError`] anywhere in its chain.
#[cfg(test)]
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    user_error(err).map(UserError::kind)
}

/// Finds the first [`UserError`] in the error chain.
pub fn user_error(err: &anyhow::Error) -> Option<&UserError> {
    err.chain().find_map(|cause| cause.downcast_ref::<UserError>())
}
