//! CLI command implementations

pub mod error;
pub mod streams;
pub mod sync;
pub mod validate;

pub use error::CliError;
pub use streams::StreamsCommand;
pub use sync::{Cli, Commands, OutputFormat, SyncArgs};
pub use validate::ValidateCommand;
