//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{self, Config};

pub mod commands;
pub mod output;

/// photovault - store, list and delete photos
#[derive(Parser, Debug)]
#[command(name = "photovault")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: <vault root>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Robot mode from `--robot`, `robot.format = "json"` or
    /// `PHOTOVAULT_ROBOT`. Without a loaded config only the flag and the
    /// environment count.
    #[must_use]
    pub fn robot_mode(&self, config: Option<&Config>) -> bool {
        self.robot || config.map_or_else(config::robot_requested_by_env, Config::robot_output)
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending schema migrations
    Migrate(commands::migrate::MigrateArgs),

    /// Import a file as a new photo
    Import(commands::import::ImportArgs),

    /// Show photo details
    Show(commands::show::ShowArgs),

    /// List photos
    List(commands::list::ListArgs),

    /// Delete a photo
    Delete(commands::delete::DeleteArgs),

    /// Report blobs left in staging by interrupted deletes
    Staging(commands::staging::StagingArgs),
}

impl Commands {
    /// Whether startup should leave the schema alone. `migrate` applies
    /// (or only inspects) migrations itself.
    #[must_use]
    pub const fn skips_migrations(&self) -> bool {
        matches!(self, Self::Migrate(_))
    }
}
