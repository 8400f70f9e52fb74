//! Rule merging
//!
//! All active sources are written, in order, into one plain file that the
//! external processor can read. Sources inside the archive are copied out.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::JarReader;
use crate::artifact::ArtifactRef;
use crate::convert::RuleConverter;
use crate::error::PatchError;
use crate::sources::RuleSource;

/// Merged rules live next to the output, named after the input archive
pub fn merged_rules_path(input: &ArtifactRef, output: &ArtifactRef) -> PathBuf {
    output
        .dir()
        .join(format!("{}-mergedATs.cfg", input.stem()))
}

fn read_source(
    source: &RuleSource,
    archive: &Path,
    jar: &mut Option<JarReader>,
) -> Result<String, PatchError> {
    match source {
        RuleSource::File(path) => fs::read_to_string(path).map_err(|e| PatchError::io(path, e)),
        RuleSource::Archive(entry) => {
            let reader = match jar {
                Some(reader) => reader,
                None => jar.insert(JarReader::open(archive)?),
            };
            reader.read_to_string(entry)
        }
    }
}

/// Write every source into `dest`, each followed by a newline.
///
/// A stale file at `dest` is removed first and the result is flushed before
/// returning, so the caller only ever hands over a complete file.
pub fn merge_rules(
    sources: &[RuleSource],
    archive: &Path,
    dest: &Path,
    legacy_format: bool,
    converter: &dyn RuleConverter,
) -> Result<PathBuf, PatchError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| PatchError::io(parent, e))?;
    }
    match fs::remove_file(dest) {
        Ok(()) => debug!("Removed stale merged rules {}", dest.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(PatchError::io(dest, e)),
    }

    let file = File::create(dest).map_err(|e| PatchError::io(dest, e))?;
    let mut writer = BufWriter::new(file);
    // opened lazily, dropped when the merge finishes
    let mut jar: Option<JarReader> = None;

    for source in sources {
        let text = read_source(source, archive, &mut jar)?;
        let text = if legacy_format {
            converter.to_modern(&source.label(), &text)?
        } else {
            text
        };
        writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| PatchError::io(dest, e))?;
        debug!("Merged rules from {}", source);
    }

    writer.flush().map_err(|e| PatchError::io(dest, e))?;
    Ok(dest.to_path_buf())
}
