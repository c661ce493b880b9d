use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use shipwright_model::GeneratedProject;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::SandboxSetupError;

/// Sandbox-private home and temp directories inside the working directory.
pub(crate) const HOME_DIR: &str = ".shipwright-home";
pub(crate) const TMP_DIR: &str = ".shipwright-tmp";
/// Install target for Python dependencies, also put on `PYTHONPATH`.
pub(crate) const DEPS_DIR: &str = ".shipwright-deps";

/// A fresh directory holding one attempt's files.
///
/// Removed by [`release`](Self::release) on the normal path and by the
/// `TempDir` drop guard on every other path (panic, dropped future).
#[derive(Debug)]
pub(crate) struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    pub(crate) fn create(root: Option<&Path>, attempt: u32) -> Result<Self, SandboxSetupError> {
        let prefix = format!("shipwright-attempt{attempt}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let parent = root.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = fs::create_dir_all(&parent)
            .and_then(|()| builder.tempdir_in(&parent))
            .map_err(|source| SandboxSetupError::CreateDir {
                root: parent.display().to_string(),
                source,
            })?;
        debug!(path = %dir.path().display(), "created sandbox working directory");
        Ok(Self { dir })
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn home(&self) -> PathBuf {
        self.path().join(HOME_DIR)
    }

    pub(crate) fn tmp(&self) -> PathBuf {
        self.path().join(TMP_DIR)
    }

    pub(crate) fn deps(&self) -> PathBuf {
        self.path().join(DEPS_DIR)
    }

    /// Write every project file plus the private home, tmp and deps directories.
    pub(crate) fn materialize(&self, project: &GeneratedProject) -> Result<(), SandboxSetupError> {
        for (path, content) in project.files() {
            let target = self.path().join(path.as_str());
            write_nested(&target, content).map_err(|source| SandboxSetupError::Materialize {
                path: path.to_string(),
                source,
            })?;
        }
        for private in [self.home(), self.tmp(), self.deps()] {
            fs::create_dir_all(&private).map_err(|source| SandboxSetupError::Materialize {
                path: private.display().to_string(),
                source,
            })?;
        }
        debug!(files = project.len(), "materialized project");
        Ok(())
    }

    /// Remove the directory now, logging rather than failing on error.
    ///
    /// Tests sometimes leave read-only directories behind; a failed first
    /// removal restores write permission and retries once.
    pub(crate) fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(first) = self.dir.close() {
            debug!(path = %path.display(), error = %first, "retrying sandbox removal");
            make_writable(&path);
            if let Err(e) = fs::remove_dir_all(&path)
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %path.display(), error = %e, "failed to remove sandbox working directory");
            }
        }
    }
}

fn write_nested(target: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, content)
}

#[cfg(unix)]
fn make_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = fs::symlink_metadata(path) else {
        return;
    };
    if !meta.is_dir() {
        return;
    }
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            make_writable(&entry.path());
        }
    }
}

#[cfg(not(unix))]
fn make_writable(path: &Path) {
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        let entry_path = entry.path();
        if let Ok(meta) = fs::symlink_metadata(&entry_path) {
            let mut perms = meta.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(&entry_path, perms);
            if meta.is_dir() {
                make_writable(&entry_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_model::{FileClassifier, SpecDocument};
    use std::sync::Arc;

    fn project() -> GeneratedProject {
        let spec = Arc::new(SpecDocument::complete(vec![
            shipwright_model::Requirement::user("adder"),
        ]));
        GeneratedProject::new(
            spec,
            1,
            [
                ("src/adder.py", "def add(a, b):\n    return a + b\n"),
                ("tests/test_adder.py", "from src.adder import add\n"),
            ],
            &FileClassifier::default(),
        )
        .unwrap()
    }

    #[test]
    fn materialize_writes_nested_files() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(Some(root.path()), 1).unwrap();
        work.materialize(&project()).unwrap();

        let written = fs::read_to_string(work.path().join("src/adder.py")).unwrap();
        assert!(written.contains("return a + b"));
        assert!(work.home().is_dir());
        assert!(work.tmp().is_dir());
        assert!(work.deps().is_dir());
    }

    #[test]
    fn release_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(Some(root.path()), 2).unwrap();
        let path = work.path().to_path_buf();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("shipwright-attempt2-"));

        work.release();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn release_handles_read_only_directories() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(Some(root.path()), 1).unwrap();
        let locked = work.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("f.txt"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        let path = work.path().to_path_buf();
        work.release();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let work = WorkDir::create(Some(root.path()), 3).unwrap();
            work.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
