//! ATPatch Core - Access Transformer Stage
//!
//! # The Rules of the Stage
//! 1. Rules Are Text, The Processor Owns Semantics
//! 2. Source Order Is Identity
//! 3. Content Addresses The Cache, Not Paths
//! 4. A Present Output Is A Valid Output
//! 5. Failure Leaves No Partial Output
//! 6. Configuration Freezes On First Read

pub mod error;
pub mod hashing;
pub mod artifact;
pub mod config;
pub mod archive;
pub mod convert;
pub mod sources;
pub mod merge;
pub mod cache;
pub mod toolchain;
pub mod invoke;
pub mod pipeline;

pub use error::{PatchError, RuleFormatError, TransformFailure};
pub use artifact::ArtifactRef;
pub use config::{PatchConfig, PatchSettings, SettingsFile, ToolDistribution, ToolSpec};
pub use convert::{LegacyRuleConverter, RuleConverter};
pub use sources::RuleSource;
pub use invoke::{JavaProcessLauncher, ToolInvocation, ToolLauncher};
pub use toolchain::{JavaRuntimes, MavenRepository, ToolResolver};
pub use pipeline::{AccessTransformer, PatchOutcome, PatchPlan, Patcher};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
