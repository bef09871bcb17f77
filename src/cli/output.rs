//! Output mode helpers shared by the subcommands.
//!
//! Global flags are exported as environment variables by `main` so every
//! module can check them without threading a flags struct around.

/// True when `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("FIELDWORK_JSON").is_ok()
}

/// True when `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("FIELDWORK_QUIET").is_ok()
}

/// Print a value as pretty JSON to stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}
