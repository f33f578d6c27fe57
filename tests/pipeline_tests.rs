//! End-to-end runs of the conversion pipeline over temporary directory trees.
//!
//! Rendering is stubbed so the tests do not depend on fonts being installed.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use txt2pdf_batch::converter::{TextBlock, TextRenderer};
use txt2pdf_batch::error::{ConfigError, ConversionError, PipelineError};
use txt2pdf_batch::notify::Notifier;
use txt2pdf_batch::pool::ConversionResult;
use txt2pdf_batch::progress::RunSummary;
use txt2pdf_batch::{Pipeline, RunConfig, RunOutcome, Settings};

/// Test utilities and helper functions
mod test_utils {
    use super::*;

    /// Writes a small fake document listing the rendered blocks.
    /// Files whose name starts with `boom` panic, `reject` returns an error.
    pub struct StubRenderer;

    impl TextRenderer for StubRenderer {
        fn render(
            &self,
            title: &str,
            blocks: &[TextBlock],
            out: &mut dyn Write,
        ) -> Result<(), ConversionError> {
            if title.starts_with("boom") {
                panic!("stub renderer cannot draw {title}");
            }
            if title.starts_with("reject") {
                return Err(ConversionError::Render {
                    reason: format!("refused {title}"),
                });
            }

            let render_err = |e: std::io::Error| ConversionError::Render {
                reason: e.to_string(),
            };
            writeln!(out, "%PDF-stub {title}").map_err(render_err)?;
            for block in blocks {
                writeln!(out, "{}", block.lines.join("\n")).map_err(render_err)?;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct CountingNotifier(pub AtomicUsize);

    impl Notifier for CountingNotifier {
        fn task_completed(&self, _: &ConversionResult) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Create `files` (relative path, content) under a fresh source root
    pub fn source_tree(files: &[(&str, &[u8])]) -> TempDir {
        let root = TempDir::new().unwrap();
        for (relative, content) in files {
            let path = root.path().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        root
    }

    /// Every file under `root`, relative and sorted
    pub fn tree_files(root: &Path) -> BTreeSet<PathBuf> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    pub fn pipeline(src: &Path, dst: &Path, concurrency: usize) -> Pipeline {
        let config = RunConfig::validated(src, dst, concurrency, 16).unwrap();
        Pipeline::new(config, Settings::default()).with_renderer(Arc::new(StubRenderer))
    }

    pub async fn completed(pipeline: Pipeline) -> RunSummary {
        match assert_ok!(pipeline.run().await) {
            RunOutcome::Completed(summary) => summary,
            RunOutcome::NoFiles => panic!("expected a completed run"),
        }
    }

    pub fn paths(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }
}

use test_utils::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mirrors_eligible_files_only() {
    let src = source_tree(&[
        ("a.txt", b"hello"),
        ("sub/b.py", b"print('hi')\n"),
        ("c.jpg", &[0xFF, 0xD8, 0xFF]),
    ]);
    let dst = TempDir::new().unwrap();

    let summary = completed(pipeline(src.path(), dst.path(), 2)).await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert!(!summary.has_failures());
    assert_eq!(tree_files(dst.path()), paths(&["a.pdf", "sub/b.pdf"]));

    let a = std::fs::read_to_string(dst.path().join("a.pdf")).unwrap();
    assert_eq!(a, "%PDF-stub a.txt\nhello\n");
}

#[tokio::test]
async fn test_empty_tree_reports_no_files() {
    let src = source_tree(&[("image.png", b"\x89PNG"), ("notes.docx", b"PK")]);
    let dst = TempDir::new().unwrap();
    let out = dst.path().join("pdfs");

    let outcome = assert_ok!(pipeline(src.path(), &out, 1).run().await);

    assert!(matches!(outcome, RunOutcome::NoFiles));
    assert!(out.is_dir());
    assert!(tree_files(&out).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_output_is_independent_of_concurrency() {
    let files: Vec<(String, Vec<u8>)> = (0..30)
        .map(|i| {
            (
                format!("level{}/inner{}/file{i}.md", i % 3, i % 2),
                format!("# heading {i}\n\nbody {i}\n").into_bytes(),
            )
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(name, content)| (name.as_str(), content.as_slice()))
        .collect();
    let src = source_tree(&borrowed);

    let serial = TempDir::new().unwrap();
    let parallel = TempDir::new().unwrap();
    completed(pipeline(src.path(), serial.path(), 1)).await;
    let summary = completed(pipeline(src.path(), parallel.path(), 4)).await;

    assert_eq!(summary.completed, 30);
    assert_eq!(summary.concurrency, 4);

    let serial_files = tree_files(serial.path());
    assert_eq!(serial_files.len(), 30);
    assert_eq!(serial_files, tree_files(parallel.path()));
    for relative in &serial_files {
        assert_eq!(
            std::fs::read(serial.path().join(relative)).unwrap(),
            std::fs::read(parallel.path().join(relative)).unwrap()
        );
    }
}

#[tokio::test]
async fn test_invalid_utf8_still_converts() {
    let src = source_tree(&[("legacy.log", &[b'o', b'k', b' ', 0xE9, 0xFF, b'\n'])]);
    let dst = TempDir::new().unwrap();

    let summary = completed(pipeline(src.path(), dst.path(), 1)).await;

    assert_eq!(summary.succeeded, 1);
    let pdf = std::fs::read_to_string(dst.path().join("legacy.pdf")).unwrap();
    assert!(pdf.contains("ok \u{e9}\u{ff}"));
}

#[tokio::test]
async fn test_rerun_overwrites_in_place() {
    let src = source_tree(&[("a.txt", b"first"), ("deep/er/b.csv", b"1,2,3")]);
    let dst = TempDir::new().unwrap();

    completed(pipeline(src.path(), dst.path(), 1)).await;
    std::fs::write(src.path().join("a.txt"), b"second").unwrap();
    let summary = completed(pipeline(src.path(), dst.path(), 2)).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(tree_files(dst.path()), paths(&["a.pdf", "deep/er/b.pdf"]));
    let a = std::fs::read_to_string(dst.path().join("a.pdf")).unwrap();
    assert!(a.contains("second"));
    assert!(!a.contains("first"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failures_are_isolated() {
    let src = source_tree(&[
        ("boom.txt", b"panics"),
        ("reject.txt", b"errors"),
        ("fine.txt", b"works"),
        ("also/fine.sh", b"echo ok"),
    ]);
    let dst = TempDir::new().unwrap();
    let notifier = Arc::new(CountingNotifier::default());

    let run = pipeline(src.path(), dst.path(), 2).with_notifier(notifier.clone());
    let summary = completed(run).await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(notifier.0.load(Ordering::SeqCst), 4);

    let kinds: BTreeSet<_> = summary.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, ["panic", "render"].into_iter().collect());

    // no partial or failed documents are left behind
    assert_eq!(tree_files(dst.path()), paths(&["also/fine.pdf", "fine.pdf"]));
}

#[tokio::test]
async fn test_missing_source_root_is_rejected() {
    let dst = TempDir::new().unwrap();
    let err = assert_err!(RunConfig::validated(
        dst.path().join("does-not-exist"),
        dst.path(),
        1,
        4
    ));
    assert!(matches!(err, ConfigError::SourceMissing { .. }));
}

#[tokio::test]
async fn test_invalid_settings_abort_before_work() {
    let src = source_tree(&[("a.txt", b"x")]);
    let dst = TempDir::new().unwrap();
    let out = dst.path().join("never");

    let mut settings = Settings::default();
    settings.render.wrap_width = 0;
    let config = RunConfig::validated(src.path(), &out, 1, 4).unwrap();

    let result = Pipeline::new(config, settings)
        .with_renderer(Arc::new(StubRenderer))
        .run()
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, PipelineError::Config(_)));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_summary_serializes_to_json() {
    let src = source_tree(&[("a.txt", b"x"), ("reject.txt", b"y")]);
    let dst = TempDir::new().unwrap();

    let summary = completed(pipeline(src.path(), dst.path(), 1)).await;
    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["total"], 2);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["failures"][0]["kind"], "render");
    assert!(json["started_at"].is_string());
}

#[tokio::test]
async fn test_injected_allowlist_replaces_defaults() {
    use txt2pdf_batch::discovery::ExtensionAllowlist;

    let src = source_tree(&[("keep.rs", b"fn main() {}"), ("skip.txt", b"text")]);
    let dst = TempDir::new().unwrap();

    let allowlist = ExtensionAllowlist::new(["RS"]);
    let summary = completed(pipeline(src.path(), dst.path(), 1).with_allowlist(allowlist)).await;

    assert_eq!(summary.total, 1);
    assert_eq!(tree_files(dst.path()), paths(&["keep.pdf"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 3)]
async fn test_sources_sharing_a_destination_are_reported() {
    let src = source_tree(&[("a.txt", b"from txt"), ("a.md", b"from md"), ("a.py", b"from py")]);
    let serial = TempDir::new().unwrap();
    let parallel = TempDir::new().unwrap();

    completed(pipeline(src.path(), serial.path(), 1)).await;
    let summary = completed(pipeline(src.path(), parallel.path(), 3)).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    assert!(summary.failures.iter().all(|f| f.kind == "conflict"));

    // the first source in name order wins, whatever the worker count
    for root in [serial.path(), parallel.path()] {
        assert_eq!(tree_files(root), paths(&["a.pdf"]));
        let pdf = std::fs::read_to_string(root.join("a.pdf")).unwrap();
        assert!(pdf.contains("from md"));
    }
}

#[tokio::test]
async fn test_stale_partial_files_are_swept() {
    let src = source_tree(&[("a.txt", b"x")]);
    let dst = TempDir::new().unwrap();
    std::fs::create_dir_all(dst.path().join("old")).unwrap();
    std::fs::write(dst.path().join("old/.txt2pdf-k1LLed.partial"), b"%PDF-tru").unwrap();

    completed(pipeline(src.path(), dst.path(), 1)).await;

    assert_eq!(tree_files(dst.path()), paths(&["a.pdf"]));
}

#[tokio::test]
async fn test_dotfile_with_allowed_name_is_converted() {
    let src = source_tree(&[("cfg/.txt", b"hidden"), ("cfg/.profile", b"skip")]);
    let dst = TempDir::new().unwrap();

    let summary = completed(pipeline(src.path(), dst.path(), 1)).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(tree_files(dst.path()), paths(&["cfg/.txt.pdf"]));
}
