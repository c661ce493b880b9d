//! Deliverable archives.

use std::io::Write;

use camino::Utf8Path;
use shipwright_model::GeneratedProject;
use shipwright_utils::write_atomic_with;
use thiserror::Error;
use tracing::info;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    #[error("failed to write deliverable {path}: {reason}")]
    Write { path: String, reason: String },
}

/// Writes an accepted project to `dest`.
///
/// Implementations must leave either a complete artifact or nothing.
pub trait Packager: Send + Sync {
    fn package(&self, project: &GeneratedProject, dest: &Utf8Path) -> Result<(), PackageError>;
}

/// Deflated zip with fixed timestamps, so the same project always yields the
/// same bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPackager;

impl Packager for ZipPackager {
    fn package(&self, project: &GeneratedProject, dest: &Utf8Path) -> Result<(), PackageError> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        write_atomic_with(dest, |tmp| {
            let mut zip = zip::ZipWriter::new(tmp.as_file_mut());
            for (path, content) in project.files() {
                zip.start_file(path.as_str(), options)?;
                zip.write_all(content.as_bytes())?;
            }
            zip.finish()?;
            Ok(())
        })
        .map_err(|e| PackageError::Write {
            path: dest.to_string(),
            reason: format!("{e:#}"),
        })?;

        info!(path = %dest, files = project.len(), "deliverable written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSynthesizer;
    use camino::Utf8PathBuf;
    use shipwright_model::{FileClassifier, Requirement, SpecDocument};
    use std::io::Read;
    use std::sync::Arc;

    fn project() -> GeneratedProject {
        GeneratedProject::new(
            Arc::new(SpecDocument::complete(vec![Requirement::user("adder")])),
            1,
            ScriptedSynthesizer::python_adder(),
            &FileClassifier::default(),
        )
        .unwrap()
    }

    #[test]
    fn archive_holds_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = Utf8PathBuf::from_path_buf(dir.path().join("deliverable.zip")).unwrap();
        let project = project();

        ZipPackager.package(&project, &dest).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&dest).unwrap()).unwrap();
        assert_eq!(archive.len(), project.len());
        for (path, content) in project.files() {
            let mut entry = archive.by_name(path.as_str()).unwrap();
            let mut read = String::new();
            entry.read_to_string(&mut read).unwrap();
            assert_eq!(read, content);
        }
    }

    #[test]
    fn archives_are_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let a = Utf8PathBuf::from_path_buf(dir.path().join("a.zip")).unwrap();
        let b = Utf8PathBuf::from_path_buf(dir.path().join("b.zip")).unwrap();
        let project = project();

        ZipPackager.package(&project, &a).unwrap();
        ZipPackager.package(&project, &b).unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail.
        let dest = Utf8PathBuf::from_path_buf(dir.path().join("deliverable.zip")).unwrap();
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep"), "x").unwrap();

        let err = ZipPackager.package(&project(), &dest).unwrap_err();

        assert!(matches!(err, PackageError::Write { .. }));
        assert!(dest.is_dir());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
