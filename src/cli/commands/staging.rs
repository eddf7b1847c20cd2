//! photovault staging - Report blobs held in staging
//!
//! A blob stays in staging when a delete committed but could not move it to
//! its final place, or when the process stopped between backup and commit.
//! The report is read-only.

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;
use crate::storage::RecordState;

#[derive(Args, Debug)]
pub struct StagingArgs {}

pub fn run(ctx: &AppContext, _args: &StagingArgs) -> Result<()> {
    let report = ctx.coordinator.staged_report()?;

    if ctx.robot_mode {
        let payload = serde_json::json!({
            "count": report.len(),
            "staged": report,
        });
        return emit_robot(&robot_ok(payload));
    }

    if report.is_empty() {
        println!("{}", "Staging is empty".dimmed());
        return Ok(());
    }

    for item in &report {
        let record = match item.record {
            RecordState::Active => "record active".yellow(),
            RecordState::Deleted => "record deleted".green(),
            RecordState::Missing => "no record".red(),
        };
        println!(
            "{}  {}  {}  {}",
            item.blob.id.bold(),
            item.blob.stamp.dimmed(),
            record,
            item.blob.path.display()
        );
    }
    Ok(())
}
