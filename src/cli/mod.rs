//! Command-line interface for sandbox-bench.
//!
//! Provides commands to benchmark providers and to list providers, suites
//! and capabilities.

mod commands;

pub use commands::{
    build_config, parse_cli, run, run_with_cli, Cli, Commands, CredentialArgs, RunArgs,
};
