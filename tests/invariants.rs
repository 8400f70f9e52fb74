//! Contract Invariant Tests
//!
//! These tests verify the stage's guarantees end to end, with a closure
//! standing in for the external rule processor.

use std::cell::{Cell, RefCell};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use atpatch_core::{
    AccessTransformer, ArtifactRef, PatchError, PatchOutcome, PatchSettings, Patcher,
    ToolInvocation, TransformFailure,
};
use zip::write::FileOptions;
use zip::ZipWriter;

const AT_ENTRY: &str = "META-INF/accesstransformer.cfg";

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file("net/minecraft/Foo.class", FileOptions::default()).unwrap();
    zip.write_all(&[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
    for (name, body) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn base_jar(dir: &Path, entries: &[(&str, &str)]) -> ArtifactRef {
    let base = ArtifactRef::new(dir, "minecraft-1.20.1", "jar");
    write_jar(&base.path(), entries);
    base
}

/// Records launches and the merged rules they were given, then copies the
/// input archive to the output path like a processor with no-op rules would.
struct RecordingProcessor {
    launches: Cell<usize>,
    merged: RefCell<Vec<String>>,
    invocations: RefCell<Vec<ToolInvocation>>,
}

impl RecordingProcessor {
    fn new() -> Self {
        Self {
            launches: Cell::new(0),
            merged: RefCell::new(Vec::new()),
            invocations: RefCell::new(Vec::new()),
        }
    }

    fn launcher(&self) -> impl Fn(&ToolInvocation) -> Result<(), TransformFailure> + '_ {
        move |inv: &ToolInvocation| -> Result<(), TransformFailure> {
            self.launches.set(self.launches.get() + 1);
            self.merged
                .borrow_mut()
                .push(fs::read_to_string(&inv.rules).unwrap());
            self.invocations.borrow_mut().push(inv.clone());
            fs::copy(&inv.input, &inv.output).unwrap();
            Ok(())
        }
    }
}

fn settings(configure: impl FnOnce(&mut PatchSettings)) -> atpatch_core::PatchConfig {
    let mut settings = PatchSettings::new(17);
    configure(&mut settings);
    settings.finalize().unwrap()
}

#[test]
fn invariant_no_sources_returns_input_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[]);
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let outcome = stage.after_remap(&base).unwrap();

    assert_eq!(outcome, PatchOutcome::Unchanged(base.clone()));
    assert_eq!(processor.launches.get(), 0);
    // no new file next to the input
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn invariant_archive_rules_produce_at_tag() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo")]);
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([format!("/{}", AT_ENTRY)]).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let outcome = stage.after_remap(&base).unwrap();

    let expected = dir.path().join("minecraft-1.20.1-at.jar");
    assert!(matches!(outcome, PatchOutcome::Regenerated(_)));
    assert_eq!(outcome.artifact().path(), expected);
    assert!(expected.exists());
    assert_eq!(processor.launches.get(), 1);
    assert_eq!(processor.merged.borrow()[0], "public net.minecraft.Foo\n");

    let inv = &processor.invocations.borrow()[0];
    assert_eq!(inv.runtime_version, 17);
    assert_eq!(inv.rules, dir.path().join("minecraft-1.20.1-mergedATs.cfg"));
    assert_eq!(inv.tool.main_class, "net.neoforged.accesstransformer.TransformerProcessor");
}

#[test]
fn invariant_explicit_file_is_content_addressed() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[]);
    let a = dir.path().join("custom.cfg");
    let b = dir.path().join("elsewhere").join("renamed.cfg");
    let c = dir.path().join("different.cfg");
    fs::create_dir_all(b.parent().unwrap()).unwrap();
    fs::write(&a, "public net.minecraft.Foo\n").unwrap();
    fs::write(&b, "public net.minecraft.Foo\n").unwrap();
    fs::write(&c, "public net.minecraft.Bar\n").unwrap();

    let plan_for = |file: &PathBuf| {
        let config = settings(|s| {
            s.access_transformer(file.clone()).unwrap();
        });
        let stage = AccessTransformer::new(config, |_: &ToolInvocation| -> Result<(), TransformFailure> { Ok(()) });
        stage.plan(&base).unwrap().output.unwrap()
    };

    let out_a = plan_for(&a);
    let out_b = plan_for(&b);
    let out_c = plan_for(&c);

    assert_eq!(out_a.path(), out_b.path());
    assert_ne!(out_a.path(), out_c.path());
    let tag = out_a.stage_tag().unwrap();
    assert!(tag.starts_with("at+"));
    assert_eq!(tag.len(), 11);
    assert!(tag[3..].chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn invariant_explicit_file_merged_last_and_once() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo\n")]);
    let user = dir.path().join("custom.cfg");
    fs::write(&user, "public net.minecraft.Bar baz\n").unwrap();
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.access_transformer(user.clone()).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    stage.after_remap(&base).unwrap();

    assert_eq!(
        processor.merged.borrow()[0],
        "public net.minecraft.Foo\n\npublic net.minecraft.Bar baz\n\n"
    );
}

#[test]
fn invariant_missing_explicit_file_fails_before_work() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo\n")]);
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.access_transformer(dir.path().join("custom.cfg")).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let err = stage.after_remap(&base).unwrap_err();

    assert!(matches!(err, PatchError::Configuration(_)));
    assert_eq!(processor.launches.get(), 0);
    assert!(!dir.path().join("minecraft-1.20.1-mergedATs.cfg").exists());
}

#[test]
fn invariant_cache_hit_never_launches() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo\n")]);
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let first = stage.after_remap(&base).unwrap();
    let second = stage.after_remap(&base).unwrap();

    assert!(matches!(first, PatchOutcome::Regenerated(_)));
    assert_eq!(second, PatchOutcome::Reused(first.into_artifact()));
    assert_eq!(processor.launches.get(), 1);
}

#[test]
fn invariant_force_reload_regenerates() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo\n")]);
    fs::write(dir.path().join("minecraft-1.20.1-at.jar"), b"old").unwrap();
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.force_reload(true).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let outcome = stage.after_remap(&base).unwrap();

    assert!(matches!(outcome, PatchOutcome::Regenerated(_)));
    assert_eq!(processor.launches.get(), 1);
    assert_ne!(fs::read(outcome.artifact().path()).unwrap(), b"old");
}

#[test]
fn invariant_failed_transform_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "public net.minecraft.Foo\n")]);
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
    });
    let failing = |inv: &ToolInvocation| -> Result<(), TransformFailure> {
        fs::write(&inv.output, b"truncated").unwrap();
        Err(TransformFailure::Exit {
            tool: inv.tool_name(),
            code: Some(1),
            stderr_tail: "Exception in thread \"main\"".into(),
        })
    };
    let stage = AccessTransformer::new(config.clone(), failing);

    let err = stage.after_remap(&base).unwrap_err();
    assert!(err.is_transform_failure());
    assert!(!dir.path().join("minecraft-1.20.1-at.jar").exists());

    // a retry from clean state succeeds
    let processor = RecordingProcessor::new();
    let retry = AccessTransformer::new(config, processor.launcher());
    assert!(matches!(retry.after_remap(&base).unwrap(), PatchOutcome::Regenerated(_)));
}

#[test]
fn invariant_legacy_rules_are_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(
        dir.path(),
        &[(AT_ENTRY, "public net/minecraft/Foo.bar(I)V # widen\n")],
    );
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.legacy_format(true).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    stage.after_remap(&base).unwrap();

    assert_eq!(processor.merged.borrow()[0], "public net.minecraft.Foo bar(I)V # widen\n\n");
}

#[test]
fn invariant_malformed_legacy_rule_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "widen net/minecraft/Foo.bar\n")]);
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.legacy_format(true).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let err = stage.after_remap(&base).unwrap_err();
    match err {
        PatchError::RuleFormat(e) => assert!(e.origin.contains(AT_ENTRY)),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(processor.launches.get(), 0);
}

#[test]
fn invariant_java21_selects_cli_distribution() {
    let mut settings = PatchSettings::new(21);
    let config = settings.finalize().unwrap();
    assert_eq!(
        config.tool.distribution.to_string(),
        "net.neoforged.accesstransformers:at-cli:11.0.2"
    );
    assert!(settings.force_reload(true).is_err());
}

#[test]
fn invariant_failed_forced_merge_drops_old_output() {
    let dir = tempfile::tempdir().unwrap();
    let base = base_jar(dir.path(), &[(AT_ENTRY, "widen net/minecraft/Foo.bar\n")]);
    let stale = dir.path().join("minecraft-1.20.1-at.jar");
    fs::write(&stale, b"built from older rules").unwrap();
    let processor = RecordingProcessor::new();
    let config = settings(|s| {
        s.access_transformer_paths([AT_ENTRY]).unwrap();
        s.legacy_format(true).unwrap();
        s.force_reload(true).unwrap();
    });
    let stage = AccessTransformer::new(config, processor.launcher());

    let err = stage.after_remap(&base).unwrap_err();

    assert!(matches!(err, PatchError::RuleFormat(_)));
    assert_eq!(processor.launches.get(), 0);
    // a later unforced run must not pick the old archive up as a cache hit
    assert!(!stale.exists());
}
