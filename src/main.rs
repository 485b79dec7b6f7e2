//! refreeze - re-freeze Python requirements against a container base image
//!
//! Default invocation, from the repository root, regenerates
//! `requirements.txt` from `requirements.in` inside the image named by the
//! first `FROM` of `Dockerfile`.

use clap::Parser;
use refreeze::cli::CliArgs;
use refreeze::config::FreezeConfig;
use refreeze::environment::SystemEngine;
use refreeze::error::AppError;
use refreeze::interrupt;
use refreeze::orchestrator::FreezeOrchestrator;
use refreeze::output::{create_formatter, OutputConfig, OutputFormat, OutputFormatter};
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args);
    interrupt::install_handler();

    let output_config = OutputConfig::from_cli(args.json, args.diff, args.verbose, args.quiet);
    let formatter = create_formatter(&output_config);

    match run(&args, &output_config, formatter.as_ref()) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `REFREEZE_LOG` overrides the level picked by the flags
fn init_tracing(args: &CliArgs) {
    let default_level = if args.trace {
        "trace"
    } else if args.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("REFREEZE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Main application logic
fn run(
    args: &CliArgs,
    output_config: &OutputConfig,
    formatter: &dyn OutputFormatter,
) -> anyhow::Result<ExitCode> {
    if args.verbose {
        eprintln!("refreeze v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Target: {}", args.path.display());
        if args.dry_run {
            eprintln!("Mode: dry-run");
        }
    }

    let result = FreezeConfig::resolve(args)
        .map_err(AppError::from)
        .and_then(|config| {
            let engine = SystemEngine::new(config.engine.as_str());
            FreezeOrchestrator::new(config, &engine)
                .with_progress(output_config.shows_progress())
                .run()
        });

    match result {
        Ok(report) => {
            let mut stdout = io::stdout().lock();
            formatter.format(&report, &mut stdout)?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            // JSON consumers read stdout only
            if output_config.format == OutputFormat::Json {
                let mut stdout = io::stdout().lock();
                formatter.format_error(&e, &mut stdout)?;
                stdout.flush()?;
            } else {
                formatter.format_error(&e, &mut io::stderr().lock())?;
            }
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
