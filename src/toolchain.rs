//! Runtime and tool lookup for launching the rule processor.
//!
//! Downloading tools is not done here. The tool jar must already be present
//! in a local maven-layout repository.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::{RuntimeEntry, ToolDistribution};
use crate::error::TransformFailure;

/// Java executables keyed by major version
#[derive(Debug, Clone, Default)]
pub struct JavaRuntimes {
    by_version: BTreeMap<u32, PathBuf>,
    fallback: Option<PathBuf>,
}

impl JavaRuntimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to `$JAVA_HOME/bin/java`, else `java` from PATH
    pub fn from_env() -> Self {
        let fallback = env::var_os("JAVA_HOME")
            .map(|home| PathBuf::from(home).join("bin").join(java_binary()))
            .unwrap_or_else(|| PathBuf::from(java_binary()));
        Self {
            by_version: BTreeMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn with_runtime(mut self, version: u32, executable: impl Into<PathBuf>) -> Self {
        self.by_version.insert(version, executable.into());
        self
    }

    pub fn with_entries(self, entries: &[RuntimeEntry]) -> Self {
        entries
            .iter()
            .fold(self, |runtimes, entry| runtimes.with_runtime(entry.version, entry.path.clone()))
    }

    pub fn resolve(&self, version: u32) -> Result<PathBuf, TransformFailure> {
        if let Some(java) = self.by_version.get(&version) {
            debug!("Using Java {} runtime {}", version, java.display());
            return Ok(java.clone());
        }
        match &self.fallback {
            Some(java) => {
                warn!(
                    "No Java {} runtime configured, falling back to {} of unknown version",
                    version,
                    java.display()
                );
                Ok(java.clone())
            }
            None => Err(TransformFailure::Runtime(version)),
        }
    }
}

fn java_binary() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Turns a tool coordinate into a classpath
pub trait ToolResolver {
    fn classpath(&self, distribution: &ToolDistribution) -> Result<Vec<PathBuf>, TransformFailure>;
}

/// Local repository in maven layout
#[derive(Debug, Clone)]
pub struct MavenRepository {
    root: PathBuf,
}

impl MavenRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.m2/repository`
    pub fn user_default() -> Self {
        let home = env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_default();
        Self::new(home.join(".m2").join("repository"))
    }

    pub fn artifact_path(&self, distribution: &ToolDistribution) -> PathBuf {
        let version = distribution.version.to_string();
        let mut path = self.root.clone();
        for segment in distribution.group.split('.') {
            path.push(segment);
        }
        path.push(&distribution.artifact);
        path.push(&version);
        path.push(format!("{}-{}.jar", distribution.artifact, version));
        path
    }
}

impl ToolResolver for MavenRepository {
    fn classpath(&self, distribution: &ToolDistribution) -> Result<Vec<PathBuf>, TransformFailure> {
        let jar = self.artifact_path(distribution);
        if jar.is_file() {
            Ok(vec![jar])
        } else {
            Err(TransformFailure::Classpath {
                coordinate: distribution.to_string(),
                reason: format!("{} not found", jar.display()),
            })
        }
    }
}
