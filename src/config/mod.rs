//! Configuration
//!
//! The whole narrative (stage delays, scan lines, log scripts, redirect
//! target) is data. The built-in default is the stock narrative; a
//! YAML file can replace any part of it.

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::SequenceConfig;
pub use validation::{ValidationResult, Validator};
