//! photovault migrate - Apply or inspect schema migrations

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::storage::VersionLedger;

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Show applied and pending migrations without applying anything
    #[arg(long)]
    pub status: bool,
}

pub fn run(ctx: &AppContext, args: &MigrateArgs) -> Result<()> {
    if args.status {
        return status(ctx);
    }

    let report = ctx.migrate()?;
    let entries = VersionLedger::entries(&ctx.metadata.connect()?)?;

    if ctx.robot_mode {
        let warnings = report
            .warnings
            .iter()
            .map(|w| format!("skipped {}: {}", w.file_name, w.reason))
            .collect();
        let payload = serde_json::json!({
            "applied": report.applied,
            "already_applied": report.already_applied,
            "unknown_applied": report.unknown_applied,
            "ledger": entries,
        });
        return emit_robot(&robot_ok(payload).with_warnings(warnings));
    }

    let mut layout = HumanLayout::new();
    layout.title("Schema Migrations");
    layout.kv("Source", &ctx.migrator.source().describe());
    layout.kv("Applied now", &report.applied.len().to_string());
    layout.kv("Ledger", &entries.len().to_string());
    for entry in &report.applied {
        layout.bullet(&format!("{} {}", "applied".green(), entry.label()));
    }
    for warning in &report.warnings {
        layout.bullet(&format!(
            "{} {}: {}",
            "skipped".yellow(),
            warning.file_name,
            warning.reason
        ));
    }
    for version in &report.unknown_applied {
        layout.bullet(&format!("{} {version} (not in source)", "unknown".yellow()));
    }
    emit_human(layout);
    Ok(())
}

fn status(ctx: &AppContext) -> Result<()> {
    let statuses = ctx.migration_status()?;

    if ctx.robot_mode {
        let pending = statuses.iter().filter(|s| s.applied_at.is_none()).count();
        let payload = serde_json::json!({
            "count": statuses.len(),
            "pending": pending,
            "migrations": statuses,
        });
        return emit_robot(&robot_ok(payload));
    }

    let mut layout = HumanLayout::new();
    layout.title("Migration Status");
    if statuses.is_empty() {
        layout.push_line("No migrations found".dimmed().to_string());
    }
    for status in &statuses {
        let state = status.applied_at.as_deref().map_or_else(
            || "pending".yellow().to_string(),
            |at| format!("{} {}", "applied".green(), at.dimmed()),
        );
        layout.kv(&format!("{}_{}", status.version, status.name), &state);
    }
    emit_human(layout);
    Ok(())
}
