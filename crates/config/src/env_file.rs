//! `.env` file writer backing the `setenv` admin command.
//!
//! Replaces (or appends) a `KEY="value"` line. Configuration is read once at
//! startup, so a new value takes effect on the next restart; the running
//! process environment is left alone.

use std::path::Path;

use tracing::info;

use crate::ConfigError;

/// Set `key` to `value` in the `.env` file at `path`.
///
/// Existing lines are matched case-insensitively on `KEY=`. A missing file is
/// created.
pub fn set_value(key: &str, value: &str, path: &Path) -> Result<(), ConfigError> {
    let key = key.trim();
    if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
        return Err(ConfigError::ValidationError(format!(
            "invalid environment variable name: {key:?}"
        )));
    }

    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let updated = upsert_line(&existing, key, value);
    std::fs::write(path, updated).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    info!(key = %key, file = %path.display(), "Updated .env");
    Ok(())
}

/// Rewrite `content` with `key` set to `value`.
fn upsert_line(content: &str, key: &str, value: &str) -> String {
    let new_line = format!("{key}=\"{value}\"");
    let prefix = format!("{}=", key.to_lowercase());

    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if line.to_lowercase().starts_with(&prefix) {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(new_line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
