//! Stage configuration - build, then freeze
//!
//! `PatchSettings` collects values from the surrounding build. The first call
//! to `finalize` freezes it: later setters fail with a configuration error and
//! every reader sees the same `PatchConfig`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// Maven-style coordinate of the external rule processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDistribution {
    pub group: String,
    pub artifact: String,
    pub version: semver::Version,
}

impl FromStr for ToolDistribution {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [group, artifact, version] = parts.as_slice() else {
            return Err(PatchError::Configuration(format!(
                "Tool dependency must be group:artifact:version, got {:?}",
                s
            )));
        };
        if group.is_empty() || artifact.is_empty() {
            return Err(PatchError::Configuration(format!(
                "Tool dependency has an empty group or artifact: {:?}",
                s
            )));
        }
        let version = semver::Version::parse(version).map_err(|e| {
            PatchError::Configuration(format!("Invalid tool version {:?}: {}", version, e))
        })?;
        Ok(Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version,
        })
    }
}

impl fmt::Display for ToolDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Distribution and entry point for one range of target Java versions
#[derive(Debug, Clone, Copy)]
pub struct ToolTableEntry {
    pub min_java_version: u32,
    pub dependency: &'static str,
    pub main_class: &'static str,
}

/// Ordered from the newest runtime threshold down
pub const TOOL_TABLE: &[ToolTableEntry] = &[
    ToolTableEntry {
        min_java_version: 21,
        dependency: "net.neoforged.accesstransformers:at-cli:11.0.2",
        main_class: "net.neoforged.accesstransformer.cli.TransformerProcessor",
    },
    ToolTableEntry {
        min_java_version: 0,
        dependency: "net.neoforged:accesstransformers:9.0.3",
        main_class: "net.neoforged.accesstransformer.TransformerProcessor",
    },
];

/// Pick the default tool for a target Java version
pub fn default_tool(java_version: u32) -> &'static ToolTableEntry {
    TOOL_TABLE
        .iter()
        .find(|entry| java_version >= entry.min_java_version)
        .unwrap_or(&TOOL_TABLE[TOOL_TABLE.len() - 1])
}

/// Tool identity the stage launches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub distribution: ToolDistribution,
    pub main_class: String,
}

/// Frozen configuration, read-only for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    /// User supplied rule file; must exist when set
    pub access_transformer: Option<PathBuf>,
    /// Rule entries looked up inside the input archive, in order
    pub access_transformer_paths: Vec<String>,
    pub legacy_format: bool,
    pub tool: ToolSpec,
    /// Language runtime version the target archive declares
    pub target_java_version: u32,
    pub force_reload: bool,
}

#[derive(Debug, Clone, Default)]
struct SettingsFields {
    access_transformer: Option<PathBuf>,
    access_transformer_paths: Vec<String>,
    legacy_format: bool,
    tool_dependency: Option<String>,
    tool_main_class: Option<String>,
    force_reload: bool,
}

#[derive(Debug, Clone)]
pub struct PatchSettings {
    target_java_version: u32,
    fields: SettingsFields,
    frozen: Option<PatchConfig>,
}

impl PatchSettings {
    pub fn new(target_java_version: u32) -> Self {
        Self {
            target_java_version,
            fields: SettingsFields::default(),
            frozen: None,
        }
    }

    fn fields_mut(&mut self, name: &str) -> Result<&mut SettingsFields, PatchError> {
        if self.frozen.is_some() {
            return Err(PatchError::Configuration(format!(
                "Cannot set {} after the configuration has been finalized",
                name
            )));
        }
        Ok(&mut self.fields)
    }

    pub fn access_transformer(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, PatchError> {
        self.fields_mut("access_transformer")?.access_transformer = Some(path.into());
        Ok(self)
    }

    pub fn access_transformer_paths<I, S>(&mut self, paths: I) -> Result<&mut Self, PatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_mut("access_transformer_paths")?.access_transformer_paths =
            paths.into_iter().map(Into::into).collect();
        Ok(self)
    }

    pub fn legacy_format(&mut self, legacy: bool) -> Result<&mut Self, PatchError> {
        self.fields_mut("legacy_format")?.legacy_format = legacy;
        Ok(self)
    }

    pub fn tool_dependency(&mut self, coordinate: impl Into<String>) -> Result<&mut Self, PatchError> {
        self.fields_mut("tool_dependency")?.tool_dependency = Some(coordinate.into());
        Ok(self)
    }

    pub fn tool_main_class(&mut self, main_class: impl Into<String>) -> Result<&mut Self, PatchError> {
        self.fields_mut("tool_main_class")?.tool_main_class = Some(main_class.into());
        Ok(self)
    }

    pub fn force_reload(&mut self, force: bool) -> Result<&mut Self, PatchError> {
        self.fields_mut("force_reload")?.force_reload = force;
        Ok(self)
    }

    /// Freeze the settings. Repeated calls return the same configuration.
    pub fn finalize(&mut self) -> Result<PatchConfig, PatchError> {
        if let Some(config) = &self.frozen {
            return Ok(config.clone());
        }

        let defaults = default_tool(self.target_java_version);
        let dependency = self
            .fields
            .tool_dependency
            .as_deref()
            .unwrap_or(defaults.dependency);
        let main_class = self
            .fields
            .tool_main_class
            .clone()
            .unwrap_or_else(|| defaults.main_class.to_string());
        if main_class.trim().is_empty() {
            return Err(PatchError::Configuration("Tool main class is empty".into()));
        }

        let config = PatchConfig {
            access_transformer: self.fields.access_transformer.clone(),
            access_transformer_paths: self.fields.access_transformer_paths.clone(),
            legacy_format: self.fields.legacy_format,
            tool: ToolSpec {
                distribution: dependency.parse()?,
                main_class,
            },
            target_java_version: self.target_java_version,
            force_reload: self.fields.force_reload,
        };
        self.frozen = Some(config.clone());
        Ok(config)
    }
}

/// A Java runtime available to launch the tool with
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeEntry {
    pub version: u32,
    pub path: PathBuf,
}

/// On-disk settings, TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    #[serde(default)]
    pub access_transformer: Option<PathBuf>,
    #[serde(default)]
    pub access_transformer_paths: Vec<String>,
    #[serde(default)]
    pub legacy_format: bool,
    #[serde(default)]
    pub target_java_version: Option<u32>,
    #[serde(default)]
    pub force_reload: bool,
    #[serde(default)]
    pub tool: ToolOverrides,
    #[serde(default)]
    pub runtime: Vec<RuntimeEntry>,
    #[serde(default)]
    pub maven_repository: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolOverrides {
    pub dependency: Option<String>,
    pub main_class: Option<String>,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self, PatchError> {
        let content = fs::read_to_string(path).map_err(|e| PatchError::io(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PatchError> {
        Ok(toml::from_str(content)?)
    }

    /// Copy file values onto unfrozen settings. Relative rule file paths
    /// resolve against `base_dir`.
    pub fn apply_to(&self, settings: &mut PatchSettings, base_dir: &Path) -> Result<(), PatchError> {
        if let Some(at) = &self.access_transformer {
            settings.access_transformer(base_dir.join(at))?;
        }
        settings
            .access_transformer_paths(self.access_transformer_paths.iter().cloned())?
            .legacy_format(self.legacy_format)?
            .force_reload(self.force_reload)?;
        if let Some(dep) = &self.tool.dependency {
            settings.tool_dependency(dep.clone())?;
        }
        if let Some(main) = &self.tool.main_class {
            settings.tool_main_class(main.clone())?;
        }
        Ok(())
    }
}
