//! JSON documents persisted inside the cache directory

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a document, falling back to its default when absent or unreadable
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return T::default(),
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            crate::trace_statement!("Ignoring unreadable {}: {}", path.display(), e);
            T::default()
        }
    }
}

/// Write a document through a temporary file and rename it into place
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension(format!("tmp{}", std::process::id()));

    std::fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
