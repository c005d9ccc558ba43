//! qcinv-exec: external command execution
//!
//! Provides the runner trait and a local implementation used to invoke the
//! cloud provider CLI.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalRunner;
pub use result::CommandResult;
pub use traits::CommandRunner;
