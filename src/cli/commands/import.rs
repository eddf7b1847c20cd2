//! photovault import - Add a file to the vault

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// File to import
    pub file: PathBuf,

    /// Photo id (default: random)
    #[arg(long)]
    pub id: Option<String>,

    /// Content type (default: guessed from the extension)
    #[arg(long)]
    pub content_type: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let record = ctx.import_photo(
        &args.file,
        args.id.as_deref(),
        args.content_type.as_deref(),
    )?;

    if ctx.robot_mode {
        return emit_robot(&robot_ok(serde_json::json!({ "photo": record })));
    }

    println!(
        "{} {} ({} bytes)",
        "Imported".green().bold(),
        record.id,
        record.size_bytes
    );
    Ok(())
}
