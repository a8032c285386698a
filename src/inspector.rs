//! Tools for inspecting the structure of a keyed archive.
//! Useful for triaging unfamiliar archives before conversion.

use std::collections::HashMap;

use serde::Serialize;

use crate::archive::KeyedArchive;
use crate::value::{Value, CLASS_KEY};

/// A structural report of a keyed archive.
#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    /// The `$archiver` entry, if present.
    pub archiver: Option<String>,
    /// The `$version` entry, if present.
    pub version: Option<i64>,
    /// Number of entries in the object table.
    pub object_count: usize,
    /// Root names in discovery order.
    pub roots: Vec<String>,
    /// Archived classes by frequency.
    pub classes: Vec<ClassCount>,
}

/// One class and how many table entries carry it.
#[derive(Debug, Serialize)]
pub struct ClassCount {
    /// The archived class name.
    pub name: String,
    /// Number of entries tagged with it.
    pub count: usize,
}

/// Summarizes an archive without resolving it.
pub fn inspect(archive: &KeyedArchive) -> ArchiveReport {
    let table = archive.objects();
    let mut histogram: HashMap<&str, usize> = HashMap::new();
    for entry in table {
        let name = entry
            .get(CLASS_KEY)
            .and_then(Value::as_uid)
            .and_then(|index| table.get(index as usize))
            .and_then(|class| class.get("$classname"))
            .and_then(Value::as_text);
        if let Some(name) = name {
            *histogram.entry(name).or_insert(0) += 1;
        }
    }
    let mut classes: Vec<ClassCount> = histogram
        .into_iter()
        .map(|(name, count)| ClassCount {
            name: name.to_string(),
            count,
        })
        .collect();
    classes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    ArchiveReport {
        archiver: archive.archiver().map(str::to_string),
        version: archive.version(),
        object_count: table.len(),
        roots: archive.root_names().iter().map(|s| s.to_string()).collect(),
        classes,
    }
}
