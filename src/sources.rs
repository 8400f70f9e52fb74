//! Rule source collection
//!
//! Order is part of the cache identity: declared archive entries first, in
//! declaration order, then the user's rule file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::archive::{normalize_entry, JarReader};
use crate::error::PatchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum RuleSource {
    /// Entry inside the input archive
    Archive(String),
    /// Plain file on the host filesystem
    File(PathBuf),
}

impl RuleSource {
    /// Human readable origin, used in errors and logs
    pub fn label(&self) -> String {
        match self {
            Self::Archive(entry) => format!("archive:{}", entry),
            Self::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Fails when a configured rule file is missing
pub fn require_explicit(explicit: Option<&Path>) -> Result<(), PatchError> {
    match explicit {
        Some(path) if !path.is_file() => Err(PatchError::Configuration(format!(
            "Access transformer file {} does not exist",
            path.display()
        ))),
        _ => Ok(()),
    }
}

/// Resolve which rule sources exist, in a stable order.
///
/// The archive is opened read-only and closed before this returns.
pub fn collect_sources(
    archive: &Path,
    declared_entries: &[String],
    explicit: Option<&Path>,
) -> Result<Vec<RuleSource>, PatchError> {
    require_explicit(explicit)?;

    let mut sources = Vec::with_capacity(declared_entries.len() + 1);
    if !declared_entries.is_empty() {
        let mut jar = JarReader::open(archive)?;
        for entry in declared_entries {
            let name = normalize_entry(entry);
            if jar.contains(name)? {
                let source = RuleSource::Archive(name.to_string());
                if !sources.contains(&source) {
                    sources.push(source);
                }
            } else {
                debug!("No rule entry {} in {}", name, archive.display());
            }
        }
    }

    if let Some(path) = explicit {
        sources.push(RuleSource::File(path.to_path_buf()));
    }

    Ok(sources)
}
