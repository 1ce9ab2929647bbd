//! Benchmark runner.
//!
//! Drives each provider session through a fixed lifecycle and turns what
//! happened into a scored [`BenchmarkResult`].
//!
//! # Architecture
//!
//! ```text
//! authenticate → create_sandbox → suite₁ … suiteₙ → destroy → finalize
//!      │               │                                 ▲
//!      └── fatal ──────┴── fatal: skip to finalize ──────┘
//! ```
//!
//! Each provider gets `warmup_runs` discarded runs followed by
//! `measured_runs` runs; the fastest completed measured run is kept.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sandbox_bench::provider::ProviderRegistry;
//! use sandbox_bench::runner::{BenchmarkRunner, RunConfig};
//! use sandbox_bench::suites::SuiteRegistry;
//!
//! let config = RunConfig::new(vec!["docker-image".into()])
//!     .with_suites(vec!["full".into()]);
//! let runner = BenchmarkRunner::new(
//!     config,
//!     Arc::new(ProviderRegistry::builtin()),
//!     Arc::new(SuiteRegistry::builtin()),
//! )?;
//! let results = runner.run_all(&credentials).await;
//! ```

pub mod config;
pub mod executor;
pub mod result;
pub mod sandbox;

pub use crate::error::RunnerError;
pub use config::RunConfig;
pub use executor::{select_best, sort_by_score, BenchmarkRunner};
pub use result::{BenchmarkResult, TraceEntry};
pub use sandbox::SandboxLease;
