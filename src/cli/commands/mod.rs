//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod delete;
pub mod import;
pub mod list;
pub mod migrate;
pub mod show;
pub mod staging;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Migrate(args) => migrate::run(ctx, args),
        Commands::Import(args) => import::run(ctx, args),
        Commands::Show(args) => show::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
        Commands::Delete(args) => delete::run(ctx, args),
        Commands::Staging(args) => staging::run(ctx, args),
    }
}
