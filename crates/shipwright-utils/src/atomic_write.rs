//! Atomic file writes: temp file in the target directory, fsync, rename.
//!
//! Readers either see the previous file or the complete new one. A failed
//! write leaves no partial file behind because the temp file is removed when
//! it is dropped without being persisted.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;

/// Atomically write UTF-8 text to `path`, normalising line endings to LF.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    let normalized = normalize_line_endings(content);
    write_atomic_with(path, |file| {
        file.write_all(normalized.as_bytes())
            .context("Failed to write content to temporary file")
    })
}

/// Atomically produce `path` by letting `fill` write into a temp file.
///
/// The temp file lives next to the target so the final rename never crosses
/// a filesystem. If `fill` fails the target is left untouched.
pub fn write_atomic_with<F>(path: &Utf8Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;

    fill(&mut temp_file)?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    temp_file
        .persist(path.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(())
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn writes_and_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir).join("SPEC.md");

        write_file_atomic(&path, "first").unwrap();
        write_file_atomic(&path, "second\r\nline").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\nline");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir).join("runs/abc/report.json");

        write_file_atomic(&path, "{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn failed_fill_leaves_no_target_and_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = utf8(&dir).join("deliverable.zip");

        let result = write_atomic_with(&path, |file| {
            file.write_all(b"partial")?;
            anyhow::bail!("archive step exploded")
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
