//! CLI subcommand implementations for the Fieldwork binary.

pub mod fill_cmd;
pub mod harvest_cmd;
pub mod output;
