//! CLI command definitions for sandbox-bench.
//!
//! Benchmarks sandbox providers and prints or exports the ranked results.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use crate::capabilities::{capability_description, known_capabilities};
use crate::export::{render_capability_matrix, render_results_table, BenchmarkReport};
use crate::metrics::{export_metrics, init_metrics};
use crate::provider::{DockerImageProvider, HttpAgentProvider, ProviderRegistry};
use crate::runner::{BenchmarkRunner, RunConfig};
use crate::suites::SuiteRegistry;

/// Benchmark AI agent sandbox providers.
#[derive(Parser, Debug)]
#[command(name = "sandbox-bench")]
#[command(about = "Benchmark AI agent sandbox providers")]
#[command(version)]
#[command(
    long_about = "sandbox-bench runs each sandbox provider through authenticate, create, a set of test suites and destroy, then scores it on speed, reliability, cost and capability coverage.\n\nExample usage:\n  DOCKER_IMAGE=python:3.12 sandbox-bench run --provider docker-image --suite full --output results.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Benchmark one or more providers.
    #[command(alias = "bench")]
    Run(RunArgs),

    /// List registered providers.
    List(CredentialArgs),

    /// List test suites and suite aliases.
    Suites,

    /// List the capabilities probed by the built-in suites.
    Capabilities,
}

/// Arguments for the `run` command.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Provider to benchmark (repeatable).
    #[arg(short, long = "provider")]
    pub providers: Vec<String>,

    /// Benchmark every registered provider.
    #[arg(long, conflicts_with = "providers")]
    pub all: bool,

    /// Suite or suite alias to run (repeatable).
    #[arg(short, long = "suite")]
    pub suites: Vec<String>,

    /// Measured runs per provider.
    #[arg(short = 'n', long)]
    pub runs: Option<u32>,

    /// Discarded warmup runs per provider.
    #[arg(long)]
    pub warmup: Option<u32>,

    /// YAML configuration file; flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the JSON report to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write Prometheus metrics to this file after the batch.
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Image to request from providers that support one.
    #[arg(long)]
    pub image: Option<String>,

    /// Print the JSON report instead of tables.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

/// Per-provider credentials, read from flags or the environment.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct CredentialArgs {
    /// Image used as the docker-image sandbox.
    #[arg(long, env = "DOCKER_IMAGE")]
    pub docker_image: Option<String>,

    /// Base URL of a running sandbox agent for http-agent.
    #[arg(long, env = "SANDBOX_AGENT_URL")]
    pub agent_url: Option<String>,
}

impl CredentialArgs {
    /// Maps provider names to their credentials, skipping blank values.
    pub fn to_map(&self) -> HashMap<String, String> {
        [
            (DockerImageProvider::NAME, &self.docker_image),
            (HttpAgentProvider::NAME, &self.agent_url),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
    }
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_benchmark_command(args).await,
        Commands::List(credentials) => {
            run_list_command(&credentials);
            Ok(())
        }
        Commands::Suites => {
            run_suites_command();
            Ok(())
        }
        Commands::Capabilities => {
            run_capabilities_command();
            Ok(())
        }
    }
}

/// Builds the run configuration from an optional file plus flag overrides.
pub fn build_config(args: &RunArgs, registry: &ProviderRegistry) -> anyhow::Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)?,
        None => RunConfig::default(),
    };

    if args.all {
        config.providers = registry.names();
    } else if !args.providers.is_empty() {
        config.providers = args.providers.clone();
    }
    if !args.suites.is_empty() {
        config.suites = args.suites.clone();
    }
    if let Some(runs) = args.runs {
        config.measured_runs = runs;
    }
    if let Some(warmup) = args.warmup {
        config.warmup_runs = warmup;
    }
    if args.image.is_some() {
        config.image = args.image.clone();
    }

    if config.providers.is_empty() {
        anyhow::bail!(
            "No providers selected. Use --provider <name> or --all (available: {})",
            registry.names().join(", ")
        );
    }
    Ok(config)
}

async fn run_benchmark_command(args: RunArgs) -> anyhow::Result<()> {
    let providers = Arc::new(ProviderRegistry::builtin());
    let suites = Arc::new(SuiteRegistry::builtin());
    let config = build_config(&args, &providers)?;

    if args.metrics_out.is_some() {
        init_metrics()?;
    }

    let runner = BenchmarkRunner::new(config, providers, suites)?;
    info!(
        "Benchmarking {} provider(s) with suites [{}], {} warmup + {} measured run(s)",
        runner.config().providers.len(),
        runner.suite_plan().join(", "),
        runner.config().warmup_runs,
        runner.config().measured_runs
    );

    let results = runner.run_all(&args.credentials.to_map()).await;
    if results.is_empty() {
        warn!("No provider produced a completed run");
    }
    let report = BenchmarkReport::new(runner.config(), runner.suite_plan(), results);

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    if let Some(path) = &args.output {
        report.write_json(path)?;
    }
    if let Some(path) = &args.metrics_out {
        fs::write(path, export_metrics())?;
        info!("Metrics written to {}", path.display());
    }

    Ok(())
}

fn print_report(report: &BenchmarkReport) {
    println!("\n=== Sandbox Benchmark Results ===");
    println!("Suites: {}", report.config.suites.join(", "));
    println!();
    print!("{}", render_results_table(&report.results));

    let matrix = render_capability_matrix(&report.results);
    if !matrix.is_empty() {
        println!("\n=== Capabilities ===");
        print!("{matrix}");
    }

    for r in report.results.iter().filter(|r| !r.error_messages.is_empty()) {
        println!("\n{} errors:", r.provider);
        for message in &r.error_messages {
            println!("  - {message}");
        }
    }
}

fn run_list_command(credentials: &CredentialArgs) {
    let registry = ProviderRegistry::builtin();
    let configured = credentials.to_map();

    println!("Available providers:");
    for name in registry.names() {
        let status = if configured.contains_key(&name) {
            "configured"
        } else {
            "no credential"
        };
        let session = registry
            .factory(&name)
            .map_err(|e| e.to_string())
            .and_then(|factory| factory().map_err(|e| e.to_string()));
        match session {
            Ok(provider) => {
                let info = provider.info();
                println!(
                    "  {:<14} {:<24} discoverability {:.1}  [{}]",
                    name,
                    info.display_name,
                    info.discoverability_score(),
                    status
                );
                println!("  {:<14} {}", "", info.description);
            }
            Err(e) => println!("  {:<14} unavailable: {}", name, e),
        }
    }
}

fn run_suites_command() {
    let registry = SuiteRegistry::builtin();

    println!("Test suites:");
    for (name, description) in registry.describe() {
        println!("  {:<13} {}", name, description);
    }

    println!("\nAliases:");
    for (alias, members) in registry.aliases() {
        println!("  {:<13} {}", alias, members.join(", "));
    }
}

fn run_capabilities_command() {
    println!("Capabilities:");
    for name in known_capabilities() {
        println!(
            "  {:<17} {}",
            name,
            capability_description(name).unwrap_or_default()
        );
    }
}
