//! testgrid - run test suites with keyed exclusion and lifecycle hooks
//!
//! ## Usage
//!
//! ```bash
//! # Run a suite with at most 8 concurrent tests
//! testgrid run suite.yaml -j 8
//!
//! # Run a subset, stopping at the first failure
//! testgrid run suite.yaml --filter 'Database::*' --fail-fast
//!
//! # List tests and hooks
//! testgrid list suite.yaml
//! testgrid hooks suite.yaml --format json
//!
//! # Create a starter configuration and suite
//! testgrid config init --with-suite
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use testgrid::cancel::EngineCancellation;
use testgrid::cli::{self, Args};
use testgrid::config::{ConfigFile, EngineConfig, EnvConfig};
use testgrid::executor::TestFilter;
use testgrid::framework::{ExecuteRequest, TestFramework};
use testgrid::hooks::HookOrchestrator;
use testgrid::output::{write_results_to_file, OutputFormat, ResultFormatter};
use testgrid::results::CollectingSink;
use testgrid::suite::SuiteFile;
use testgrid::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let mut engine = ConfigFile::resolve(args.config.as_deref(), &env)?;
    if args.verbose {
        engine.log_level = LogLevel::Debug;
    }
    init_logger(engine.log_level);

    match args.command {
        cli::Command::Run(run_args) => {
            let passed = run_suite(run_args, engine).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_tests(list_args, engine).await?;
        }
        cli::Command::Hooks(list_args) => {
            list_hooks(list_args, &engine)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &engine)?;
        }
    }

    Ok(())
}

fn output_format(requested: Option<&str>, engine: &EngineConfig) -> Result<OutputFormat> {
    let name = requested.unwrap_or(&engine.output_format);
    OutputFormat::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown output format: {name}"))
}

/// Host cancellation token tripped by Ctrl-C
fn host_token() -> CancellationToken {
    let host = CancellationToken::new();
    let signal = host.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling the run");
            signal.cancel();
        }
    });
    host
}

fn load_suite(path: &Path, host: &CancellationToken) -> Result<(SuiteFile, HookOrchestrator)> {
    let suite = SuiteFile::load(path)?;
    let mut hooks = HookOrchestrator::new().with_cancellation(EngineCancellation::linked_to(host));
    suite.register_hooks(&mut hooks);
    Ok((suite, hooks))
}

async fn run_suite(args: cli::RunArgs, mut engine: EngineConfig) -> Result<bool> {
    if let Some(max) = args.max_parallel {
        anyhow::ensure!(max >= 1, "--max-parallel must be at least 1");
        engine.max_parallel_tests = Some(max);
    }
    if args.fail_fast {
        engine.fail_fast = true;
    }
    if let Some(ms) = args.timeout_ms {
        engine.default_test_timeout_ms = Some(ms);
    }
    let format = output_format(args.format.as_deref(), &engine)?;
    let filter = match &args.filter {
        Some(expression) => TestFilter::parse(expression)?,
        None => TestFilter::All,
    };

    let host = host_token();
    let (suite, hooks) = load_suite(&args.suite, &host)?;
    info!(
        "Running suite '{}' (max parallel: {}, fail-fast: {}, filter: {})",
        suite.name,
        engine
            .max_parallel_tests
            .map_or_else(|| "unbounded".to_string(), |m| m.to_string()),
        engine.fail_fast,
        filter
    );

    let framework = TestFramework::new(hooks, engine);
    let summary = framework
        .execute_request(
            &ExecuteRequest::run(filter),
            &suite,
            Arc::new(CollectingSink::new()),
        )
        .await?;

    println!("{}", ResultFormatter::new(format).format_summary(&summary));

    if let Some(path) = &args.output {
        write_results_to_file(path, &summary, format)?;
        info!("Results saved to {}", path.display());
    }

    Ok(summary.is_all_passed())
}

async fn list_tests(args: cli::ListArgs, engine: EngineConfig) -> Result<()> {
    let format = output_format(args.format.as_deref(), &engine)?;
    let (suite, hooks) = load_suite(&args.suite, &CancellationToken::new())?;

    let framework = TestFramework::new(hooks, engine);
    let sink = Arc::new(CollectingSink::new());
    framework
        .execute_request(&ExecuteRequest::discover(), &suite, sink.clone())
        .await?;

    println!("{}", ResultFormatter::new(format).format_tests(&sink.discovered()));
    Ok(())
}

fn list_hooks(args: cli::ListArgs, engine: &EngineConfig) -> Result<()> {
    let format = output_format(args.format.as_deref(), engine)?;
    let (_, hooks) = load_suite(&args.suite, &CancellationToken::new())?;

    println!("{}", ResultFormatter::new(format).format_hooks(&hooks.hook_infos()));
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, engine: &EngineConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init {
            path,
            force,
            with_suite,
        } => {
            let suite_path = path.with_file_name("suite.yaml");
            let mut targets: Vec<&PathBuf> = vec![&path];
            if with_suite {
                targets.push(&suite_path);
            }
            for target in targets {
                if target.exists() && !force {
                    anyhow::bail!(
                        "File already exists: {}. Use --force to overwrite.",
                        target.display()
                    );
                }
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            if with_suite {
                SuiteFile::example().save(&suite_path)?;
                println!("✓ Example suite created: {}", suite_path.display());
            }
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env } => {
            if env {
                EnvConfig::load().print_summary();
                println!();
                testgrid::config::env::print_env_help();
            } else {
                let effective = ConfigFile {
                    engine: engine.clone(),
                    ..ConfigFile::default()
                };
                println!("{}", serde_yaml::to_string(&effective)?);
            }
        }
    }

    Ok(())
}
