//! photovault list - List photos

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of photos to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Offset for pagination
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let photos = ctx.metadata.list_active(args.limit, args.offset)?;
    let total = ctx.metadata.count_active()?;

    if ctx.robot_mode {
        let payload = serde_json::json!({
            "count": photos.len(),
            "total": total,
            "photos": photos,
        });
        return emit_robot(&robot_ok(payload));
    }

    if photos.is_empty() {
        println!("{}", "No photos".dimmed());
        return Ok(());
    }

    println!(
        "{:32} {:>10}  {:27}  {}",
        "ID".bold(),
        "SIZE".bold(),
        "CREATED".bold(),
        "NAME".bold()
    );
    for photo in &photos {
        println!(
            "{:32} {:>10}  {:27}  {}",
            photo.id,
            photo.size_bytes,
            photo.created_at.dimmed(),
            photo.original_name
        );
    }
    println!();
    println!("{} of {} photos", photos.len(), total);
    Ok(())
}
