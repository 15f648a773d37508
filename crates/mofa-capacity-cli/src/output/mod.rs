//! Output formatting module
//!
//! Tables for `list`, pretty JSON for `--json`.

use crate::CliError;
use serde::Serialize;

mod table;

pub use table::Table;

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
