//! Content-addressed output resolution
//!
//! Presence of the derived archive is treated as proof it is valid. There is
//! no timestamp check and no re-verification of the cached file.

use std::path::Path;

use tracing::debug;

use crate::artifact::ArtifactRef;
use crate::error::PatchError;
use crate::hashing::short_file_hash;
use crate::sources::RuleSource;

pub const STAGE_TAG: &str = "at";

/// Stage tag for a run with the given user rule file
pub fn stage_tag(explicit: Option<&Path>) -> Result<String, PatchError> {
    match explicit {
        Some(path) => Ok(format!("{}+{}", STAGE_TAG, short_file_hash(path)?)),
        None => Ok(STAGE_TAG.to_string()),
    }
}

/// Derive the output reference, or `None` when there is nothing to apply
/// and the input should pass through unchanged.
pub fn resolve_output(
    base: &ArtifactRef,
    sources: &[RuleSource],
    explicit: Option<&Path>,
) -> Result<Option<ArtifactRef>, PatchError> {
    if sources.is_empty() && explicit.is_none() {
        return Ok(None);
    }
    let tag = stage_tag(explicit)?;
    Ok(Some(base.with_stage_tag(tag)))
}

pub fn needs_regeneration(output: &ArtifactRef, force_reload: bool) -> bool {
    if force_reload {
        debug!("Forced regeneration of {}", output);
        return true;
    }
    !output.path().exists()
}
