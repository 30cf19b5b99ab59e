//! Command Line Interface (CLI) layer for geoscope.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `compose`, `aggregate`
//! and `mask` subcommands. It wires user-provided options and an optional
//! JSON config to the library functionality exposed via `geoscope::api`.
//!
//! If you are embedding geoscope into another application, prefer using
//! the `geoscope::api` or `geoscope::core` modules instead of the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
