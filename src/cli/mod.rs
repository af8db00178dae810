//! Command-line front end.

mod commands;
mod helpers;
mod icons;

pub use commands::{is_verbose, run};
