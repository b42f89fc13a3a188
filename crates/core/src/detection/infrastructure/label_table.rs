use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::LABELS_FILE_EXTENSION;

/// Metadata key under which YOLO exporters store the class names.
pub const NAMES_METADATA_KEY: &str = "names";

/// Class ids at or above this are treated as a corrupt table.
const MAX_CLASS_ID: usize = 100_000;

/// Parses a class-name table as stored in model metadata.
///
/// Accepts a JSON array (`["person", "car"]`) or the Python-dict form
/// written by YOLO exporters (`{0: 'person', 1: 'car'}`). Gaps in a dict
/// are filled with `class_<id>`. Ids of [`MAX_CLASS_ID`] or more reject the
/// whole table.
pub fn parse_names(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(raw)
            .ok()
            .filter(|names| !names.is_empty());
    }
    if raw.starts_with('{') {
        return parse_dict(raw);
    }
    None
}

/// Reads `<model>.names` next to the artifact: one label per line.
pub fn read_sidecar(model_path: &Path) -> Option<Vec<String>> {
    let contents = fs::read_to_string(sidecar_path(model_path)).ok()?;
    let names: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

pub fn sidecar_path(model_path: &Path) -> PathBuf {
    model_path.with_extension(LABELS_FILE_EXTENSION)
}

pub fn fallback_label(class_id: usize) -> String {
    format!("class_{class_id}")
}

fn parse_dict(raw: &str) -> Option<Vec<String>> {
    let mut entries: Vec<(usize, String)> = Vec::new();
    let mut rest = raw.trim_start_matches('{');

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() || rest.starts_with('}') {
            break;
        }

        let digits_end = rest.find(|c: char| !c.is_ascii_digit())?;
        let id: usize = rest[..digits_end]
            .parse()
            .ok()
            .filter(|id| *id < MAX_CLASS_ID)?;
        rest = rest[digits_end..].trim_start().strip_prefix(':')?.trim_start();

        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        rest = &rest[1..];
        let label_end = rest.find(quote)?;
        entries.push((id, rest[..label_end].to_string()));
        rest = &rest[label_end + 1..];
    }

    let len = entries.iter().map(|(id, _)| id + 1).max()?;
    let mut names: Vec<String> = (0..len).map(fallback_label).collect();
    for (id, label) in entries {
        names[id] = label;
    }
    Some(names)
}
