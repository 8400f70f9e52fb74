//! External rule processor invocation
//!
//! The processor runs as a child process and is always waited on. Whatever
//! happens, a failed run leaves no file at the output path.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::ToolSpec;
use crate::error::{PatchError, TransformFailure};
use crate::toolchain::{JavaRuntimes, ToolResolver};

/// Lines of tool stderr kept for the error message
const STDERR_TAIL_LINES: usize = 5;

/// One launch of the rule processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Major Java version the runtime is requested for
    pub runtime_version: u32,
    pub tool: ToolSpec,
    pub input: PathBuf,
    pub output: PathBuf,
    pub rules: PathBuf,
}

impl ToolInvocation {
    /// Positional flag pairs the processor expects
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--inJar".into(),
            absolute(&self.input).into_os_string(),
            "--outJar".into(),
            absolute(&self.output).into_os_string(),
            "--atFile".into(),
            absolute(&self.rules).into_os_string(),
        ]
    }

    pub fn tool_name(&self) -> String {
        self.tool.distribution.to_string()
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Runs the processor to completion
pub trait ToolLauncher {
    fn launch(&self, invocation: &ToolInvocation) -> Result<(), TransformFailure>;
}

impl<F> ToolLauncher for F
where
    F: Fn(&ToolInvocation) -> Result<(), TransformFailure>,
{
    fn launch(&self, invocation: &ToolInvocation) -> Result<(), TransformFailure> {
        self(invocation)
    }
}

/// Launches `java -cp <tool> <main> <args>` as a child process
pub struct JavaProcessLauncher<R: ToolResolver> {
    runtimes: JavaRuntimes,
    resolver: R,
}

impl<R: ToolResolver> JavaProcessLauncher<R> {
    pub fn new(runtimes: JavaRuntimes, resolver: R) -> Self {
        Self { runtimes, resolver }
    }

    fn command(&self, invocation: &ToolInvocation) -> Result<Command, TransformFailure> {
        let java = self.runtimes.resolve(invocation.runtime_version)?;
        let classpath = self.resolver.classpath(&invocation.tool.distribution)?;
        let classpath = std::env::join_paths(&classpath).map_err(|e| TransformFailure::Classpath {
            coordinate: invocation.tool_name(),
            reason: e.to_string(),
        })?;

        let mut cmd = Command::new(java);
        cmd.arg("-cp")
            .arg(classpath)
            .arg(&invocation.tool.main_class)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }
}

impl<R: ToolResolver> ToolLauncher for JavaProcessLauncher<R> {
    fn launch(&self, invocation: &ToolInvocation) -> Result<(), TransformFailure> {
        let tool = invocation.tool_name();
        let mut cmd = self.command(invocation)?;
        debug!("Launching {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|source| TransformFailure::Launch { tool: tool.clone(), source })?;

        // tool chatter stays below the default verbosity
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!(target: "atpatch::tool", "{}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            Err(TransformFailure::Exit {
                tool,
                code: output.status.code(),
                stderr_tail: tail,
            })
        }
    }
}

/// Delete a file, reporting whether one was there
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Produce `invocation.output` from the input archive and merged rules.
///
/// A file already at the output path is deleted first. If the launch fails,
/// or exits cleanly without writing output, any partial output is deleted
/// before the failure propagates.
pub fn invoke(
    launcher: &dyn ToolLauncher,
    invocation: &ToolInvocation,
    rule_count: usize,
) -> Result<(), PatchError> {
    if rule_count == 0 {
        debug!("No rule sources, skipping {}", invocation.tool_name());
        return Ok(());
    }

    let output = &invocation.output;
    if remove_if_exists(output).map_err(|e| PatchError::io(output, e))? {
        debug!("Deleted stale output {}", output.display());
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
    }

    info!("Running {} on {}", invocation.tool_name(), invocation.input.display());
    let result = launcher.launch(invocation).and_then(|()| {
        if output.is_file() {
            Ok(())
        } else {
            Err(TransformFailure::MissingOutput {
                tool: invocation.tool_name(),
                output: output.clone(),
            })
        }
    });

    if let Err(failure) = result {
        if let Err(e) = remove_if_exists(output) {
            warn!("Could not delete partial output {}: {}", output.display(), e);
        }
        return Err(failure.into());
    }
    Ok(())
}
