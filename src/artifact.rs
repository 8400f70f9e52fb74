//! Artifact references - versioned archives on disk
//!
//! A reference is never mutated. Each stage derives a new reference whose
//! file name carries the stage tag, e.g. `minecraft-1.20.1-at+1a2b3c4d.jar`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    dir: PathBuf,
    base_name: String,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    stage_tag: Option<String>,
}

impl ArtifactRef {
    pub fn new(
        dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            extension: Some(extension.into()),
            stage_tag: None,
        }
    }

    /// Build a reference for an existing archive path produced by a prior stage
    pub fn from_path(path: &Path) -> Result<Self, PatchError> {
        let base_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PatchError::Configuration(format!("Not an archive path: {}", path.display()))
            })?;
        let extension = path
            .extension()
            .map(|e| {
                e.to_str().map(str::to_string).ok_or_else(|| {
                    PatchError::Configuration(format!("Non UTF-8 extension: {}", path.display()))
                })
            })
            .transpose()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            dir,
            base_name: base_name.to_string(),
            extension,
            stage_tag: None,
        })
    }

    /// Derive the reference for the next stage. The base identity is kept,
    /// any previous stage tag is replaced.
    pub fn with_stage_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            stage_tag: Some(tag.into()),
            ..self.clone()
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn stage_tag(&self) -> Option<&str> {
        self.stage_tag.as_deref()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self) -> String {
        let stem = self.stem();
        match &self.extension {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// File stem of the on-disk archive, stage tag included
    pub fn stem(&self) -> String {
        match &self.stage_tag {
            Some(tag) => format!("{}-{}", self.base_name, tag),
            None => self.base_name.clone(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_path() {
        let jar = ArtifactRef::new("/cache", "minecraft-1.20.1-merged", "jar");
        assert_eq!(jar.path(), PathBuf::from("/cache/minecraft-1.20.1-merged.jar"));
        assert_eq!(jar.stage_tag(), None);
    }

    #[test]
    fn test_stage_tag_derives_new_reference() {
        let base = ArtifactRef::new("/cache", "minecraft-1.20.1", "jar");
        let tagged = base.with_stage_tag("at+abcd1234");

        assert_eq!(tagged.path(), PathBuf::from("/cache/minecraft-1.20.1-at+abcd1234.jar"));
        assert_eq!(tagged.base_name(), base.base_name());
        // the input reference is untouched
        assert_eq!(base.path(), PathBuf::from("/cache/minecraft-1.20.1.jar"));
    }

    #[test]
    fn test_retag_replaces_previous_tag() {
        let base = ArtifactRef::new("/cache", "mc", "jar").with_stage_tag("at");
        let retagged = base.with_stage_tag("at+00000000");
        assert_eq!(retagged.file_name(), "mc-at+00000000.jar");
    }

    #[test]
    fn test_from_path() {
        let jar = ArtifactRef::from_path(Path::new("/work/minecraft-client.jar")).unwrap();
        assert_eq!(jar.base_name(), "minecraft-client");
        assert_eq!(jar.dir(), Path::new("/work"));
        assert_eq!(jar.path(), PathBuf::from("/work/minecraft-client.jar"));

        let relative = ArtifactRef::from_path(Path::new("client.jar")).unwrap();
        assert_eq!(relative.dir(), Path::new("."));
    }

    #[test]
    fn test_from_path_without_extension_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("minecraft");
        std::fs::write(&input, b"PK").unwrap();

        let jar = ArtifactRef::from_path(&input).unwrap();
        assert_eq!(jar.path(), input);
        assert!(jar.path().exists());
        assert_eq!(jar.with_stage_tag("at").file_name(), "minecraft-at");
    }
}
