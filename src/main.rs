//! photovault - photo storage CLI
//!
//! Keeps photo metadata and photo bytes consistent across SQLite and the
//! filesystem.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use photovault::app::AppContext;
use photovault::cli::Cli;
use photovault::cli::output::{emit_robot, robot_error_structured};
use photovault::config::{self, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config decides robot mode, so it is loaded before logging starts
    let root = config::default_root();
    let loaded = Config::load(cli.config.as_deref(), &root);
    let robot = cli.robot_mode(loaded.as_ref().ok());
    init_tracing(&cli, robot);

    let result = loaded.and_then(|config| {
        let ctx = AppContext::from_config(root, config, robot, cli.command.skips_migrations())?;
        photovault::cli::commands::run(&ctx, &cli.command)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if robot {
                // Robot mode: structured JSON error on stdout
                if emit_robot(&robot_error_structured(&e)).is_err() {
                    eprintln!("Error: {e}");
                }
            } else {
                let structured = e.to_structured();
                eprintln!("Error: {structured}");
                if !structured.suggestion.is_empty() {
                    eprintln!("Hint: {}", structured.suggestion);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli, robot: bool) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,photovault=info",
        1 => "info,photovault=debug",
        2 => "debug,photovault=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Human-readable logging
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
