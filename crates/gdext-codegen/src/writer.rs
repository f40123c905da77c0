//! Output Writer: persists generated artifacts under the output directory.
//!
//! Every changed file is staged as a temporary sibling, then renamed over
//! its target once the whole run is staged, so a reader never sees a
//! half-written file. Byte-identical files are left
//! alone, which keeps timestamps stable for build tools watching the output.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::WriteError;
use crate::generator::GeneratedArtifact;

/// What a write (or check) did to each artifact path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Paths written, or in check mode, paths that would be written.
    pub written: Vec<PathBuf>,
    /// Paths whose content already matched.
    pub unchanged: Vec<PathBuf>,
}

impl WriteReport {
    /// Whether every artifact already matched what is on disk.
    pub fn is_up_to_date(&self) -> bool {
        self.written.is_empty()
    }

    pub fn len(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes artifacts relative to an output directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
    check: bool,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            check: false,
        }
    }

    /// In check mode nothing is written; the report lists what would change.
    pub fn set_check(&mut self, check: bool) -> &mut Self {
        self.check = check;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write every artifact. Changed files are first staged as temporary
    /// siblings; targets are only replaced once every file is staged, so an
    /// I/O failure while staging leaves the previous output untouched. Files
    /// from earlier runs that no artifact names are left in place.
    pub fn write(&self, artifacts: &[GeneratedArtifact]) -> Result<WriteReport, WriteError> {
        let mut report = WriteReport::default();
        let mut pending = Vec::new();
        for artifact in artifacts {
            let target = self.root.join(&artifact.path);
            if is_unchanged(&target, artifact.content.as_bytes())? {
                debug!(path = %target.display(), "unchanged");
                report.unchanged.push(target);
                continue;
            }
            pending.push((target, artifact.content.as_bytes()));
        }

        if !self.check {
            let mut staging = Staging::default();
            for (target, content) in &pending {
                if let Err(err) = staging.stage(target, content) {
                    staging.abort();
                    return Err(err);
                }
            }
            staging.commit()?;
        }

        report.written = pending.into_iter().map(|(target, _)| target).collect();
        info!(
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            check = self.check,
            "output complete"
        );
        Ok(report)
    }
}

/// Temporary files waiting to be renamed over their targets, plus the
/// directories created to hold them.
#[derive(Default)]
struct Staging {
    files: Vec<(PathBuf, NamedTempFile)>,
    created_dirs: Vec<PathBuf>,
}

impl Staging {
    fn stage(&mut self, target: &Path, content: &[u8]) -> Result<(), WriteError> {
        let err = |source: io::Error| WriteError {
            path: target.to_path_buf(),
            source,
        };
        let dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if let Some(missing) = topmost_missing(dir) {
            fs::create_dir_all(dir).map_err(err)?;
            self.created_dirs.push(missing);
        }
        let mut file = NamedTempFile::new_in(dir).map_err(err)?;
        file.write_all(content).map_err(err)?;
        self.files.push((target.to_path_buf(), file));
        Ok(())
    }

    fn commit(self) -> Result<(), WriteError> {
        for (target, file) in self.files {
            file.persist(&target).map_err(|e| WriteError {
                path: target.clone(),
                source: e.error,
            })?;
            debug!(path = %target.display(), "wrote artifact");
        }
        Ok(())
    }

    /// Drop staged files and remove directories this run created.
    fn abort(self) {
        drop(self.files);
        for dir in self.created_dirs.iter().rev() {
            if let Err(err) = fs::remove_dir_all(dir) {
                debug!(path = %dir.display(), %err, "could not remove staging directory");
            }
        }
    }
}

/// The outermost ancestor of `dir` that does not exist yet, if any.
fn topmost_missing(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor.exists() {
            break;
        }
        missing = Some(ancestor.to_path_buf());
    }
    missing
}

fn is_unchanged(target: &Path, content: &[u8]) -> Result<bool, WriteError> {
    match fs::read(target) {
        Ok(existing) => Ok(existing == content),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(WriteError {
            path: target.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::OutputUnit;

    fn artifact(path: &str, content: &str) -> GeneratedArtifact {
        GeneratedArtifact {
            unit: OutputUnit::Enums,
            path: PathBuf::from(path),
            template: "enums",
            content: content.to_string(),
        }
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let report = writer
            .write(&[artifact("pkg/constant/classes.enums.gen.go", "package constant\n")])
            .unwrap();

        assert_eq!(report.written.len(), 1);
        let text = fs::read_to_string(dir.path().join("pkg/constant/classes.enums.gen.go")).unwrap();
        assert_eq!(text, "package constant\n");
    }

    #[test]
    fn test_unchanged_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let artifacts = [artifact("a.go", "package a\n"), artifact("b.go", "package b\n")];
        writer.write(&artifacts).unwrap();

        let changed = [artifact("a.go", "package a\n"), artifact("b.go", "package b // v2\n")];
        let report = writer.write(&changed).unwrap();
        assert_eq!(report.unchanged, vec![dir.path().join("a.go")]);
        assert_eq!(report.written, vec![dir.path().join("b.go")]);
    }

    #[test]
    fn test_check_mode_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OutputWriter::new(dir.path());
        writer.set_check(true);
        let report = writer.write(&[artifact("pkg/ffi/ffi.gen.go", "package ffi\n")]).unwrap();

        assert!(!report.is_up_to_date());
        assert!(!dir.path().join("pkg/ffi/ffi.gen.go").exists());
    }

    #[test]
    fn test_stale_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.gen.go"), "package old\n").unwrap();
        OutputWriter::new(dir.path())
            .write(&[artifact("new.gen.go", "package new\n")])
            .unwrap();
        assert!(dir.path().join("old.gen.go").exists());
    }

    #[test]
    fn test_failure_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        // a file where a directory is needed
        fs::write(dir.path().join("pkg"), "").unwrap();
        let err = OutputWriter::new(dir.path())
            .write(&[artifact("pkg/ffi/ffi.gen.go", "package ffi\n")])
            .unwrap_err();
        assert_eq!(err.path, dir.path().join("pkg/ffi/ffi.gen.go"));
    }

    #[test]
    fn test_failed_run_leaves_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("first.gen.go"), "package old\n").unwrap();
        fs::write(dir.path().join("blocker"), "").unwrap();

        let err = OutputWriter::new(dir.path())
            .write(&[
                artifact("first.gen.go", "package new\n"),
                artifact("fresh/third.gen.go", "package fresh\n"),
                artifact("blocker/second.gen.go", "package second\n"),
            ])
            .unwrap_err();

        assert_eq!(err.path, dir.path().join("blocker/second.gen.go"));
        let first = fs::read_to_string(dir.path().join("first.gen.go")).unwrap();
        assert_eq!(first, "package old\n");
        assert!(!dir.path().join("fresh").exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(leftovers.len(), 2);
    }
}
