//! Command runner trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs an external program to completion and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to exit.
    ///
    /// A non-zero exit status is not an error at this level; callers inspect
    /// [`CommandResult::success`].
    ///
    /// # Errors
    /// Returns an error if the process cannot be spawned or its output cannot be read.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError>;

    /// Short name of the runner, used in logs
    fn runner_type(&self) -> &'static str;
}
