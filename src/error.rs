//! Error taxonomy for the access transformer stage.
//!
//! Every failure surfaces to the caller. The only local compensation anywhere
//! in the crate is deleting stale or partial output before an error propagates.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    RuleFormat(#[from] RuleFormatError),

    #[error(transparent)]
    Transform(#[from] TransformFailure),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Settings file error: {0}")]
    SettingsParse(#[from] toml::de::Error),
}

impl PatchError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_transform_failure(&self) -> bool {
        matches!(self, Self::Transform(_))
    }
}

/// A rule line that could not be rewritten into the modern syntax.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rule format error in {origin} at line {line}: {message}")]
pub struct RuleFormatError {
    /// Which rule source the line came from
    pub origin: String,
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl RuleFormatError {
    pub fn new(origin: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            line,
            message: message.into(),
        }
    }
}

/// The external rule processor did not produce an output archive.
#[derive(Debug, Error)]
pub enum TransformFailure {
    #[error("Transform failed: could not launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Transform failed: {tool} exited with {}{}", exit_label(.code), stderr_suffix(.stderr_tail))]
    Exit {
        tool: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Transform failed: {tool} exited successfully but wrote no output at {}", .output.display())]
    MissingOutput { tool: String, output: PathBuf },

    #[error("Transform failed: no Java runtime available for version {0}")]
    Runtime(u32),

    #[error("Transform failed: cannot resolve tool distribution {coordinate}: {reason}")]
    Classpath { coordinate: String, reason: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn stderr_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail)
    }
}
