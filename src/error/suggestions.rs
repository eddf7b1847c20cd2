//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with hints that
//! name the photo id or migration involved.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::PhotoNotFound => suggest_photo_not_found(context),
        ErrorCode::MigrationFailed => suggest_migration_failed(context),
        ErrorCode::CompensationFailed => suggest_compensation_failed(context),
        _ => code.suggestion().to_string(),
    }
}

fn context_str<'a>(context: Option<&'a Value>, key: &str) -> Option<&'a str> {
    context.and_then(|c| c.get(key)).and_then(Value::as_str)
}

fn suggest_photo_not_found(context: Option<&Value>) -> String {
    let Some(id) = context_str(context, "photo_id") else {
        return ErrorCode::PhotoNotFound.suggestion().to_string();
    };

    format!(
        "Photo '{id}' is not active. It may never have existed or may already be deleted.\n  - `photovault list` shows active photos"
    )
}

fn suggest_migration_failed(context: Option<&Value>) -> String {
    match (
        context_str(context, "version"),
        context_str(context, "name"),
    ) {
        (Some(version), Some(name)) => format!(
            "Migration {version}_{name} was rolled back and not recorded. Fix the script and rerun `photovault migrate`"
        ),
        _ => ErrorCode::MigrationFailed.suggestion().to_string(),
    }
}

fn suggest_compensation_failed(context: Option<&Value>) -> String {
    let Some(id) = context_str(context, "photo_id") else {
        return ErrorCode::CompensationFailed.suggestion().to_string();
    };

    format!(
        "The blob for '{id}' is still in staging. Run `photovault staging` and move `{id}.backup.*` back to the blob root"
    )
}
