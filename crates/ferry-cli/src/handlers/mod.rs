//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(args, ...) -> Result<_, CliError>`
//! - Thin wrappers that:
//!   1. Validate CLI-specific input
//!   2. Build and drive the upload queue
//!   3. Format output for the terminal

pub mod upload;
