//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod run;
pub mod validate;
pub mod version;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::error::AkashicError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// `shutdown` is cancelled on the first interrupt signal.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, shutdown: CancellationToken) -> Result<(), AkashicError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cli.color, &shutdown).await,
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => version::run(&args),
    }
}
