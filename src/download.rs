use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{MirrorError, Result};
use crate::source::ContentSource;

pub const DEFAULT_OUTPUT_DIR: &str = "download";

/// What to do with a path whose content could not be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Write an empty file in its place.
    #[default]
    WriteEmpty,
    /// Leave the output untouched.
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    /// Files written with the content the source returned.
    pub downloaded: usize,
    /// Files written empty because their fetch failed.
    pub empty_fallbacks: Vec<String>,
    pub fetch_failures: Vec<String>,
    pub write_failures: Vec<String>,
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.fetch_failures.is_empty() || !self.write_failures.is_empty()
    }
}

/// Line-oriented progress output. The first write error is logged, later
/// ones are dropped so a closed stdout cannot stop the run.
struct LogStream<'w, W: Write> {
    out: &'w mut W,
    broken: bool,
}

impl<'w, W: Write> LogStream<'w, W> {
    fn new(out: &'w mut W) -> Self {
        Self { out, broken: false }
    }

    fn emit(&mut self, level: log::Level, line: &str) {
        log::log!(level, "{}", line);

        if let Err(e) = writeln!(self.out, "{}", line) {
            if !self.broken {
                log::warn!("Failed to write to output stream: {}", e);
                self.broken = true;
            }
        }
    }
}

/// Mirrors files from a [`ContentSource`] into a local output root.
pub struct Downloader<'a> {
    source: &'a dyn ContentSource,
    output_root: PathBuf,
    policy: FetchFailurePolicy,
    dry_run: bool,
}

impl<'a> Downloader<'a> {
    pub fn new(source: &'a dyn ContentSource, output_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_root: output_root.into(),
            policy: FetchFailurePolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Processes every path in order. Per-path failures are reported on `out`
    /// and in the returned summary; they never stop the run.
    pub fn run<S: AsRef<str>, W: Write>(&self, paths: &[S], out: &mut W) -> RunSummary {
        log::info!(
            "Mirroring {} files into {:?}",
            paths.len(),
            self.output_root
        );

        let mut out = LogStream::new(out);
        let mut summary = RunSummary::default();

        if self.dry_run {
            for path in paths {
                self.plan_one(path.as_ref(), &mut out, &mut summary);
            }

            out.emit(
                log::Level::Info,
                &format!(
                    "Dry run: {} files would be downloaded, {} write errors",
                    summary.processed - summary.write_failures.len(),
                    summary.write_failures.len()
                ),
            );
            return summary;
        }

        if let Err(e) = fs::create_dir_all(&self.output_root) {
            log::warn!(
                "Failed to create output directory {:?}: {}",
                self.output_root,
                e
            );
        }

        for path in paths {
            self.download_one(path.as_ref(), &mut out, &mut summary);
        }

        out.emit(
            log::Level::Info,
            &format!(
                "Finished: {} downloaded, {} written empty, {} read errors, {} write errors",
                summary.downloaded,
                summary.empty_fallbacks.len(),
                summary.fetch_failures.len(),
                summary.write_failures.len()
            ),
        );

        summary
    }

    fn download_one<W: Write>(
        &self,
        path: &str,
        out: &mut LogStream<'_, W>,
        summary: &mut RunSummary,
    ) {
        summary.processed += 1;

        let (content, fetched) = match self.source.fetch(path) {
            Ok(content) => (content, true),
            Err(e) => {
                out.emit(log::Level::Error, &format!("Error reading {path}: {e}"));
                summary.fetch_failures.push(path.to_string());

                match self.policy {
                    FetchFailurePolicy::WriteEmpty => (String::new(), false),
                    FetchFailurePolicy::Skip => {
                        summary.skipped.push(path.to_string());
                        return;
                    }
                }
            }
        };

        match self.write_mirrored(path, &content) {
            Ok(output_path) => {
                out.emit(
                    log::Level::Info,
                    &format!("Downloaded: {} -> {}", path, output_path.display()),
                );
                if fetched {
                    summary.downloaded += 1;
                } else {
                    summary.empty_fallbacks.push(path.to_string());
                }
            }
            Err(e) => {
                out.emit(
                    log::Level::Error,
                    &format!("Error downloading {path}: {e}"),
                );
                summary.write_failures.push(path.to_string());
            }
        }
    }

    fn plan_one<W: Write>(&self, path: &str, out: &mut LogStream<'_, W>, summary: &mut RunSummary) {
        summary.processed += 1;

        match resolve_output_path(&self.output_root, path) {
            Ok(output_path) => out.emit(
                log::Level::Info,
                &format!("Would download: {} -> {}", path, output_path.display()),
            ),
            Err(e) => {
                out.emit(
                    log::Level::Error,
                    &format!("Error downloading {path}: {e}"),
                );
                summary.write_failures.push(path.to_string());
            }
        }
    }

    fn write_mirrored(&self, path: &str, content: &str) -> Result<PathBuf> {
        let output_path = resolve_output_path(&self.output_root, path)?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&output_path, content.as_bytes())?;
        log::debug!("Wrote {} bytes to {:?}", content.len(), output_path);

        Ok(output_path)
    }
}

/// Joins `path` onto `root`, refusing anything that would land outside it.
pub fn resolve_output_path(root: &Path, path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(MirrorError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty",
        });
    }

    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(MirrorError::InvalidPath {
                    path: path.to_string(),
                    reason: "path escapes the output directory",
                })
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(MirrorError::InvalidPath {
                    path: path.to_string(),
                    reason: "path must be relative",
                })
            }
        }
    }

    Ok(root.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn map_source(files: &[(&str, &str)]) -> impl Fn(&str) -> Result<String> {
        let files: HashMap<String, String> = files
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |path: &str| {
            files
                .get(path)
                .cloned()
                .ok_or_else(|| MirrorError::source_error(format!("{path} not found")))
        }
    }

    fn lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out).lines().map(String::from).collect()
    }

    #[test]
    fn test_round_trip_hello_world() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[("a/b/c.txt", "hello world")]);

        let mut out = Vec::new();
        let summary = Downloader::new(&source, &root).run(&["a/b/c.txt"], &mut out);

        assert_eq!(
            fs::read_to_string(root.join("a/b/c.txt")).unwrap(),
            "hello world"
        );
        assert_eq!(summary.downloaded, 1);
        assert!(!summary.has_failures());
        assert_eq!(
            lines(&out)[0],
            format!("Downloaded: a/b/c.txt -> {}", root.join("a/b/c.txt").display())
        );
    }

    #[test]
    fn test_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[("x/y/z/file.txt", "deep")]);

        Downloader::new(&source, &root).run(&["x/y/z/file.txt"], &mut Vec::new());

        assert!(root.join("x").is_dir());
        assert!(root.join("x/y").is_dir());
        assert!(root.join("x/y/z").is_dir());
        assert_eq!(fs::read_to_string(root.join("x/y/z/file.txt")).unwrap(), "deep");
    }

    #[test]
    fn test_running_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[("src/app/page.tsx", "page"), ("src/app/layout.tsx", "layout")]);
        let paths = ["src/app/page.tsx", "src/app/layout.tsx"];
        let downloader = Downloader::new(&source, &root);

        let first = downloader.run(&paths, &mut Vec::new());
        let second = downloader.run(&paths, &mut Vec::new());

        assert_eq!(first, second);
        assert_eq!(second.downloaded, 2);
        assert!(!second.has_failures());
    }

    #[test]
    fn test_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("README.md"), "stale content that is longer").unwrap();

        let source = map_source(&[("README.md", "fresh")]);
        Downloader::new(&source, &root).run(&["README.md"], &mut Vec::new());

        assert_eq!(fs::read_to_string(root.join("README.md")).unwrap(), "fresh");
    }

    #[test]
    fn test_failure_in_middle_does_not_stop_later_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[("first.txt", "1"), ("third.txt", "3")]);

        let mut out = Vec::new();
        let summary = Downloader::new(&source, &root)
            .with_policy(FetchFailurePolicy::Skip)
            .run(&["first.txt", "missing.txt", "third.txt"], &mut out);

        let out = lines(&out);
        assert!(out[0].starts_with("Downloaded: first.txt -> "));
        assert_eq!(out[1], "Error reading missing.txt: missing.txt not found");
        assert!(out[2].starts_with("Downloaded: third.txt -> "));

        assert_eq!(fs::read_to_string(root.join("third.txt")).unwrap(), "3");
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.fetch_failures, vec!["missing.txt"]);
    }

    #[test]
    fn test_fetch_failure_writes_empty_file_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[]);

        let mut out = Vec::new();
        let summary = Downloader::new(&source, &root).run(&["docs/blueprint.md"], &mut out);

        let out = lines(&out);
        assert_eq!(out[0], "Error reading docs/blueprint.md: docs/blueprint.md not found");
        assert!(out[1].starts_with("Downloaded: docs/blueprint.md -> "));
        assert_eq!(fs::read_to_string(root.join("docs/blueprint.md")).unwrap(), "");
        assert_eq!(summary.fetch_failures, vec!["docs/blueprint.md"]);
        assert_eq!(summary.empty_fallbacks, vec!["docs/blueprint.md"]);
        assert_eq!(summary.downloaded, 0);
        assert!(summary.skipped.is_empty());
        assert_eq!(
            out[2],
            "Finished: 0 downloaded, 1 written empty, 1 read errors, 0 write errors"
        );
    }

    #[test]
    fn test_skip_policy_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[]);

        let summary = Downloader::new(&source, &root)
            .with_policy(FetchFailurePolicy::Skip)
            .run(&["docs/blueprint.md"], &mut Vec::new());

        assert!(!root.join("docs/blueprint.md").exists());
        assert_eq!(summary.skipped, vec!["docs/blueprint.md"]);
        assert_eq!(summary.downloaded, 0);
    }

    #[test]
    fn test_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[]);

        let mut out = Vec::new();
        let paths: [&str; 0] = [];
        let summary = Downloader::new(&source, &root).run(&paths, &mut out);

        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
        assert_eq!(summary, RunSummary::default());
        assert_eq!(
            lines(&out),
            vec!["Finished: 0 downloaded, 0 written empty, 0 read errors, 0 write errors"]
        );
    }

    #[test]
    fn test_write_failure_is_logged_and_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        // A file where a directory is needed makes directory creation fail.
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("src"), "not a directory").unwrap();

        let source = map_source(&[("src/lib/utils.ts", "utils"), ("package.json", "{}")]);
        let mut out = Vec::new();
        let summary =
            Downloader::new(&source, &root).run(&["src/lib/utils.ts", "package.json"], &mut out);

        let out = lines(&out);
        assert!(out[0].starts_with("Error downloading src/lib/utils.ts: "));
        assert!(out[1].starts_with("Downloaded: package.json -> "));
        assert_eq!(summary.write_failures, vec!["src/lib/utils.ts"]);
        assert_eq!(fs::read_to_string(root.join("package.json")).unwrap(), "{}");
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = |_: &str| -> Result<String> { Ok("x".to_string()) };

        let mut out = Vec::new();
        let summary = Downloader::new(&source, &root).run(&["../escape.txt", ""], &mut out);

        let out = lines(&out);
        assert_eq!(
            out[0],
            "Error downloading ../escape.txt: invalid path '../escape.txt': path escapes the output directory"
        );
        assert_eq!(
            out[1],
            "Error downloading : invalid path '': path is empty"
        );
        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(summary.write_failures.len(), 2);
    }

    #[test]
    fn test_duplicate_paths_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let calls = std::cell::Cell::new(0);
        let source = |_: &str| -> Result<String> {
            calls.set(calls.get() + 1);
            Ok(format!("call {}", calls.get()))
        };

        let summary = Downloader::new(&source, &root).run(&["a.txt", "a.txt"], &mut Vec::new());

        assert_eq!(summary.downloaded, 2);
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "call 2");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = |_: &str| -> Result<String> { panic!("dry run must not fetch") };

        let mut out = Vec::new();
        let summary = Downloader::new(&source, &root)
            .with_dry_run(true)
            .run(&["a/b.txt", "../outside.txt"], &mut out);

        assert!(!root.exists());
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.write_failures, vec!["../outside.txt"]);

        let out = lines(&out);
        assert_eq!(
            out[0],
            format!("Would download: a/b.txt -> {}", root.join("a/b.txt").display())
        );
        assert_eq!(out[2], "Dry run: 1 files would be downloaded, 1 write errors");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_closed_output_stream_does_not_stop_run() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("download");
        let source = map_source(&[("a.txt", "a"), ("b/c.txt", "c")]);

        let summary = Downloader::new(&source, &root).run(&["a.txt", "b/c.txt"], &mut ClosedPipe);

        assert_eq!(summary.downloaded, 2);
        assert_eq!(fs::read_to_string(root.join("b/c.txt")).unwrap(), "c");
    }

    #[test]
    fn test_resolve_output_path() {
        let root = Path::new("download");
        assert_eq!(
            resolve_output_path(root, "src/app/page.tsx").unwrap(),
            PathBuf::from("download/src/app/page.tsx")
        );
        assert_eq!(
            resolve_output_path(root, ".vscode/settings.json").unwrap(),
            PathBuf::from("download/.vscode/settings.json")
        );
        assert!(resolve_output_path(root, "/etc/passwd").is_err());
        assert!(resolve_output_path(root, "a/../../b").is_err());
        assert!(resolve_output_path(root, "   ").is_err());
    }
}
