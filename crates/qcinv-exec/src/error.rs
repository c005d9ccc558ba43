//! Error types for qcinv-exec

use thiserror::Error;

/// Errors that can occur while running an external command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Command exited with a non-zero status
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ExecError {
    /// Check if the program could not be started at all
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ExecError::SpawnError(_))
    }
}
