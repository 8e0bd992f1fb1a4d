//! Version information display

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::error::AkashicError;

/// Print version information.
///
/// # Errors
///
/// Returns an error if the JSON document cannot be serialized.
pub fn run(args: &VersionArgs) -> Result<(), AkashicError> {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    match args.format {
        OutputFormat::Human => println!("{name} {version}"),
        OutputFormat::Json => {
            let doc = json!({ "name": name, "version": version });
            println!("{}", serde_json::to_string(&doc)?);
        }
    }
    Ok(())
}
