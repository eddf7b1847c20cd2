//! photovault show - Show photo details

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Photo id
    pub id: String,
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    // A photo whose delete is in flight is reported as not found
    let record = ctx.coordinator.fetch(&args.id)?;
    let blob_path = ctx.objects.primary_path(&record.id);

    if ctx.robot_mode {
        let payload = serde_json::json!({
            "photo": record,
            "blob_path": blob_path,
        });
        return emit_robot(&robot_ok(payload));
    }

    let mut layout = HumanLayout::new();
    layout.title(&record.original_name);
    layout.kv("ID", &record.id);
    layout.kv("Type", record.content_type.as_deref().unwrap_or("-"));
    layout.kv("Size", &format!("{} bytes", record.size_bytes));
    layout.kv("Created", &record.created_at);
    layout.kv("Blob", &blob_path.display().to_string());
    emit_human(layout);
    Ok(())
}
