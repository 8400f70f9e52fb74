//! ATPatch CLI - Bridge interface for build pipelines
//!
//! Commands: apply, resolve, convert
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when the rule processor fails, 1 on any other error

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use atpatch_core::{
    AccessTransformer, ArtifactRef, JavaProcessLauncher, JavaRuntimes, LegacyRuleConverter,
    MavenRepository, PatchError, PatchSettings, Patcher, RuleConverter, SettingsFile,
    ENGINE_VERSION,
};

const DEFAULT_JAVA_VERSION: u32 = 17;

#[derive(Parser)]
#[command(name = "atpatch-cli")]
#[command(about = "ATPatch CLI - apply access transformers to an archive")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output, including the processor's own output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply access transformers, reusing a cached archive when present
    Apply(StageArgs),

    /// Show the sources and derived output without running anything
    Resolve(StageArgs),

    /// Convert a rule file between legacy and modern syntax
    Convert {
        /// Rule file to convert
        file: PathBuf,

        /// Convert modern rules to the legacy syntax instead
        #[arg(long)]
        to_legacy: bool,
    },
}

#[derive(Args)]
struct StageArgs {
    /// Input archive produced by the previous stage
    #[arg(short, long)]
    input: PathBuf,

    /// TOML settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// User access transformer file
    #[arg(long = "at")]
    access_transformer: Option<PathBuf>,

    /// Rule entry inside the input archive (repeatable)
    #[arg(long = "archive-at")]
    archive_paths: Vec<String>,

    /// Rule files use the legacy syntax
    #[arg(long)]
    legacy: bool,

    /// Java version the target archive declares
    #[arg(long)]
    java: Option<u32>,

    /// Regenerate even if a cached archive exists
    #[arg(long)]
    force: bool,

    /// Override the processor coordinate (group:artifact:version)
    #[arg(long)]
    tool: Option<String>,

    /// Override the processor entry point
    #[arg(long)]
    main_class: Option<String>,

    /// Local maven repository holding the processor jar
    #[arg(long)]
    maven_repo: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn build_stage(
    args: &StageArgs,
) -> Result<AccessTransformer<JavaProcessLauncher<MavenRepository>>, PatchError> {
    let file = match &args.settings {
        Some(path) => SettingsFile::load(path)?,
        None => SettingsFile::default(),
    };
    let base_dir = args
        .settings
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));

    let java = args
        .java
        .or(file.target_java_version)
        .unwrap_or(DEFAULT_JAVA_VERSION);
    let mut settings = PatchSettings::new(java);
    file.apply_to(&mut settings, base_dir)?;

    if let Some(at) = &args.access_transformer {
        settings.access_transformer(at.clone())?;
    }
    if !args.archive_paths.is_empty() {
        settings.access_transformer_paths(args.archive_paths.iter().cloned())?;
    }
    if args.legacy {
        settings.legacy_format(true)?;
    }
    if args.force {
        settings.force_reload(true)?;
    }
    if let Some(tool) = &args.tool {
        settings.tool_dependency(tool.clone())?;
    }
    if let Some(main) = &args.main_class {
        settings.tool_main_class(main.clone())?;
    }
    let config = settings.finalize()?;

    let runtimes = JavaRuntimes::from_env().with_entries(&file.runtime);
    let repo = args
        .maven_repo
        .clone()
        .or(file.maven_repository)
        .map(MavenRepository::new)
        .unwrap_or_else(MavenRepository::user_default);

    Ok(AccessTransformer::new(config, JavaProcessLauncher::new(runtimes, repo)))
}

fn print_error(e: &PatchError) -> ExitCode {
    let output = serde_json::json!({
        "success": false,
        "error": e.to_string(),
    });
    println!("{}", output);
    if e.is_transform_failure() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn run_apply(args: &StageArgs) -> Result<serde_json::Value, PatchError> {
    let stage = build_stage(args)?;
    let input = ArtifactRef::from_path(&args.input)?;
    let outcome = stage.after_remap(&input)?;
    Ok(serde_json::json!({
        "success": true,
        "engine_version": ENGINE_VERSION,
        "path": outcome.artifact().path(),
        "result": outcome,
        "generated_at": chrono::Utc::now(),
    }))
}

fn run_resolve(args: &StageArgs) -> Result<serde_json::Value, PatchError> {
    let stage = build_stage(args)?;
    let input = ArtifactRef::from_path(&args.input)?;
    let plan = stage.plan(&input)?;
    Ok(serde_json::json!({
        "success": true,
        "engine_version": ENGINE_VERSION,
        "config": stage.config(),
        "plan": plan,
        "generated_at": chrono::Utc::now(),
    }))
}

fn run_convert(file: &Path, to_legacy: bool) -> Result<String, PatchError> {
    let text = fs::read_to_string(file).map_err(|e| PatchError::io(file, e))?;
    let origin = file.display().to_string();
    let converted = if to_legacy {
        LegacyRuleConverter.to_legacy(&origin, &text)?
    } else {
        LegacyRuleConverter.to_modern(&origin, &text)?
    };
    Ok(converted)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply(args) => match run_apply(&args) {
            Ok(output) => {
                println!("{}", output);
                ExitCode::SUCCESS
            }
            Err(e) => print_error(&e),
        },

        Commands::Resolve(args) => match run_resolve(&args) {
            Ok(output) => {
                println!("{:#}", output);
                ExitCode::SUCCESS
            }
            Err(e) => print_error(&e),
        },

        // raw rule text, not JSON, so it can be redirected into a file
        Commands::Convert { file, to_legacy } => match run_convert(&file, to_legacy) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => print_error(&e),
        },
    }
}
