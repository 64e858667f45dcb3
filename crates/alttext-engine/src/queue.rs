//! Work-queue files: the scanner's output and the reviewed resolutions.
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::EngineError;
use crate::model::{AssetDeficiency, Resolution, SkippedEntry};

/// Write the queue as pretty-printed JSON.
pub fn write_queue(path: &Path, items: &[AssetDeficiency]) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(items).map_err(|source| EngineError::Queue {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| EngineError::io(path, e))?;
    tracing::info!(path = %path.display(), count = items.len(), "wrote queue");
    Ok(())
}

/// Load a resolutions file. Any unreadable or malformed file is fatal.
pub fn load_resolutions(path: &Path) -> Result<Vec<Resolution>, EngineError> {
    let data = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_str(&data).map_err(|source| EngineError::Queue {
        path: path.to_path_buf(),
        source,
    })
}

/// Split records with usable text from those without. The skip list is
/// keyed by (document, asset basename), deduplicated and sorted.
pub fn partition_resolutions(resolutions: &[Resolution]) -> (Vec<&Resolution>, Vec<SkippedEntry>) {
    let mut usable = Vec::new();
    let mut skipped = BTreeSet::new();
    for res in resolutions {
        if res.usable_text().is_some() {
            usable.push(res);
        } else {
            skipped.insert(SkippedEntry {
                document_path: res.document_path.clone(),
                asset_basename: res.asset_basename(),
            });
        }
    }
    (usable, skipped.into_iter().collect())
}
