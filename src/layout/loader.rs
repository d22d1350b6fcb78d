//! Load tower layouts from TOML files

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::core::types::StrongholdId;
use crate::layout::{LayoutError, StrongholdLayout, TowerLayouts};

#[derive(Debug, Deserialize)]
struct LayoutFile {
    #[serde(default, rename = "stronghold")]
    strongholds: Vec<LayoutEntry>,
}

#[derive(Debug, Deserialize)]
struct LayoutEntry {
    id: StrongholdId,
    #[serde(flatten)]
    layout: StrongholdLayout,
}

/// Load all layouts from a TOML file
pub fn load_layouts(path: &Path) -> Result<TowerLayouts, LayoutError> {
    let content = fs::read_to_string(path)?;
    let layouts = parse_layouts(&content)?;
    tracing::info!(count = layouts.len(), path = %path.display(), "Loaded tower layouts");
    Ok(layouts)
}

pub fn parse_layouts(content: &str) -> Result<TowerLayouts, LayoutError> {
    let file: LayoutFile = toml::from_str(content)?;
    let mut layouts = TowerLayouts::new();
    for entry in file.strongholds {
        layouts.insert(entry.id, entry.layout)?;
    }
    Ok(layouts)
}
