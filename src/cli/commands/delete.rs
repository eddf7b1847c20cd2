//! photovault delete - Soft-delete a photo

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Photo id
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &DeleteArgs) -> Result<()> {
    let outcome = ctx.coordinator.delete(&args.id)?;

    if ctx.robot_mode {
        let mut response = robot_ok(serde_json::json!({
            "id": outcome.id,
            "original_name": outcome.original_name,
            "deleted_at": outcome.deleted_at,
            "finalized": outcome.finalized(),
            "blob_path": outcome.blob.path(),
        }));
        if !outcome.finalized() {
            response = response.with_warnings(vec![format!(
                "blob left in staging at {}",
                outcome.blob.path().display()
            )]);
        }
        return emit_robot(&response);
    }

    println!("{} {}", "Deleted".green().bold(), outcome.id);
    if !outcome.finalized() {
        println!(
            "{} blob left in staging at {}",
            "warning:".yellow().bold(),
            outcome.blob.path().display()
        );
    }
    Ok(())
}
