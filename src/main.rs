//! depdoctor - package.json dependency upgrader CLI tool
//!
//! Reports or writes upgrades for npm-style manifests and, in doctor mode,
//! keeps only the upgrades that still install and pass the test command.

use clap::Parser;
use depdoctor::aggregator::Aggregator;
use depdoctor::cli::CliArgs;
use depdoctor::manifest::{project_dir, ProjectSettings};
use depdoctor::output::{create_formatter, OutputConfig};
use depdoctor::registry::{HttpClient, NpmRegistry};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    // Run the main logic and handle errors
    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "depdoctor=debug"
    } else {
        "depdoctor=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    args.validate()?;

    let settings = ProjectSettings::from_dir(&project_dir(&args.path));
    let ctx = args.run_context(&settings)?;
    tracing::info!(
        "depdoctor v{}: {} (registry {})",
        env!("CARGO_PKG_VERSION"),
        args.path.display(),
        ctx.registry_url
    );

    let registry = NpmRegistry::new(HttpClient::new()?).with_registry_url(ctx.registry_url.clone());
    let output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet);

    let aggregator = Aggregator::new(ctx, Arc::new(registry))
        .with_scope(args.scope())
        .with_mode(args.mode())
        .with_decisions(args.decisions())
        .with_progress(output_config.shows_progress());
    let summary = aggregator.run(&args.path).await?;

    // Output results
    let formatter = create_formatter(output_config);
    let mut stdout = io::stdout().lock();
    formatter.format(&summary, &mut stdout)?;
    stdout.flush()?;
    drop(stdout);

    // Run package manager install if requested
    if let Err(e) = aggregator.install_after_upgrade(&summary, &args.path).await {
        eprintln!("Install failed: {}", e);
        if !e.output.is_empty() {
            eprintln!("{}", e.output);
        }
        return Ok(ExitCode::FAILURE);
    }

    // Return appropriate exit code
    if summary.has_errors() {
        // Partial success - some dependencies could not be resolved
        Ok(ExitCode::from(2))
    } else if args.error_level >= 2 && summary.pending_upgrades() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
