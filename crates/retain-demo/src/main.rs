//! Retain demo
//!
//! `retain-demo scenario` walks a counter screen through rebuilds,
//! navigation, configuration changes, dismissal, and host destruction.
//! `retain-demo stress` hammers one store from many threads.

mod counter;
mod scenario;
mod stress;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use retain_core::RetentionConfig;
use std::path::PathBuf;
use stress::StressConfig;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("retain-demo")
        .version(retain_core::VERSION)
        .about("Retained component store demo")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML retention config"),
        )
        .subcommand(Command::new("scenario").about("Run the host lifecycle scenario"))
        .subcommand(
            Command::new("stress")
                .about("Run concurrent acquire/evict churn")
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .default_value("8")
                        .value_parser(value_parser!(usize))
                        .help("Worker threads"),
                )
                .arg(
                    Arg::new("keys")
                        .long("keys")
                        .default_value("64")
                        .value_parser(value_parser!(usize))
                        .help("Distinct component keys"),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .default_value("10000")
                        .value_parser(value_parser!(usize))
                        .help("Iterations per thread"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<RetentionConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => RetentionConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RetentionConfig::default()),
    }
}

fn count_arg(args: &ArgMatches, name: &str) -> Result<usize> {
    args.get_one::<usize>(name)
        .copied()
        .with_context(|| format!("missing --{name}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("scenario", args)) => {
            let config = load_config(args)?;
            println!("Running retention scenario...");
            println!("After destroy: {:?}", config.after_destroy);
            println!();

            let report = scenario::run_scenario(config).await?;
            println!("{}", report.generate_text());

            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("stress", args)) => {
            let config = load_config(args)?;
            let stress = StressConfig {
                threads: count_arg(args, "threads")?,
                keys: count_arg(args, "keys")?,
                rounds: count_arg(args, "rounds")?,
            };

            println!("Running stress test...");
            println!("Threads: {}", stress.threads);
            println!("Keys: {}", stress.keys);
            println!("Rounds: {}", stress.rounds);
            println!();

            let report = tokio::task::spawn_blocking(move || stress::run_stress(stress, &config))
                .await
                .context("stress workers")?;

            println!("Stress Test Report:");
            println!("  Acquires: {}", report.acquires);
            println!("  Created: {}", report.created);
            println!("  Cleanups: {}", report.cleanups);
            println!("  Cleanup Failures: {}", report.final_clear.failures.len());
            println!("  Time: {}ms", report.elapsed_ms);
            println!("  Success: {}", report.success());

            std::process::exit(if report.success() { 0 } else { 1 });
        }
        _ => {
            cli().print_help()?;
            Ok(())
        }
    }
}
