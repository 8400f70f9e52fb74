//! Access transformer stage - single entry point
//!
//! collect sources -> resolve cache -> merge -> invoke. Nothing is retained
//! between runs; every call walks the whole sequence again.

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::ArtifactRef;
use crate::cache::{needs_regeneration, resolve_output};
use crate::config::PatchConfig;
use crate::convert::{LegacyRuleConverter, RuleConverter};
use crate::error::{PatchError, RuleFormatError};
use crate::invoke::{invoke, remove_if_exists, ToolInvocation, ToolLauncher};
use crate::merge::{merge_rules, merged_rules_path};
use crate::sources::{collect_sources, RuleSource};

/// A pipeline stage that runs after remapping
pub trait Patcher {
    fn after_remap(&self, base: &ArtifactRef) -> Result<PatchOutcome, PatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "artifact", rename_all = "snake_case")]
pub enum PatchOutcome {
    /// No rule sources; the input passes through
    Unchanged(ArtifactRef),
    /// A previously produced archive was found at the derived path
    Reused(ArtifactRef),
    /// The processor ran and wrote a new archive
    Regenerated(ArtifactRef),
}

impl PatchOutcome {
    pub fn artifact(&self) -> &ArtifactRef {
        match self {
            Self::Unchanged(a) | Self::Reused(a) | Self::Regenerated(a) => a,
        }
    }

    pub fn into_artifact(self) -> ArtifactRef {
        match self {
            Self::Unchanged(a) | Self::Reused(a) | Self::Regenerated(a) => a,
        }
    }
}

/// What a run would do, computed without side effects
#[derive(Debug, Clone, Serialize)]
pub struct PatchPlan {
    pub input: ArtifactRef,
    pub sources: Vec<RuleSource>,
    pub output: Option<ArtifactRef>,
    pub needs_regeneration: bool,
}

/// Applies access transformer rule sets to an archive.
///
/// Holds the rule converter and the process launcher as separate fields and
/// exposes both roles explicitly.
pub struct AccessTransformer<L: ToolLauncher> {
    config: PatchConfig,
    converter: LegacyRuleConverter,
    launcher: L,
}

impl<L: ToolLauncher> AccessTransformer<L> {
    pub fn new(config: PatchConfig, launcher: L) -> Self {
        Self {
            config,
            converter: LegacyRuleConverter::new(),
            launcher,
        }
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    pub fn plan(&self, base: &ArtifactRef) -> Result<PatchPlan, PatchError> {
        let explicit = self.config.access_transformer.as_deref();
        let sources = collect_sources(&base.path(), &self.config.access_transformer_paths, explicit)?;
        let output = resolve_output(base, &sources, explicit)?;
        let needs_regeneration = output
            .as_ref()
            .map(|out| needs_regeneration(out, self.config.force_reload))
            .unwrap_or(false);
        Ok(PatchPlan {
            input: base.clone(),
            sources,
            output,
            needs_regeneration,
        })
    }
}

impl<L: ToolLauncher> Patcher for AccessTransformer<L> {
    fn after_remap(&self, base: &ArtifactRef) -> Result<PatchOutcome, PatchError> {
        let plan = self.plan(base)?;
        let Some(output) = plan.output else {
            debug!("No access transformers for {}", base);
            return Ok(PatchOutcome::Unchanged(base.clone()));
        };

        let labels: Vec<String> = plan.sources.iter().map(RuleSource::label).collect();
        info!("Applying ATs {:?}", labels);
        if let Some(user) = &self.config.access_transformer {
            info!("Using user access transformer {}", user.display());
        }

        if !plan.needs_regeneration {
            info!("Reusing {}", output);
            return Ok(PatchOutcome::Reused(output));
        }

        // an old archive must not survive a failed regeneration
        let output_path = output.path();
        if remove_if_exists(&output_path).map_err(|e| PatchError::io(&output_path, e))? {
            debug!("Deleted stale output {}", output);
        }

        let input = base.path();
        let rules = merge_rules(
            &plan.sources,
            &input,
            &merged_rules_path(base, &output),
            self.config.legacy_format,
            &self.converter,
        )?;

        let invocation = ToolInvocation {
            runtime_version: self.config.target_java_version,
            tool: self.config.tool.clone(),
            input,
            output: output_path,
            rules,
        };
        invoke(&self.launcher, &invocation, plan.sources.len())?;

        info!("Wrote {}", output);
        Ok(PatchOutcome::Regenerated(output))
    }
}

impl<L: ToolLauncher> RuleConverter for AccessTransformer<L> {
    fn to_modern(&self, origin: &str, text: &str) -> Result<String, RuleFormatError> {
        self.converter.to_modern(origin, text)
    }

    fn to_legacy(&self, origin: &str, text: &str) -> Result<String, RuleFormatError> {
        self.converter.to_legacy(origin, text)
    }
}
