use std::fmt::Write as _;

use anyhow::{Context, Result};
use camino::Utf8Path;
use shipwright_model::SpecDocument;
use shipwright_utils::write_file_atomic;

#[must_use]
pub fn render_spec_markdown(spec: &SpecDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Project Specification\n");
    if let Some(request) = spec.initial_request() {
        let _ = writeln!(out, "> {}\n", request.replace('\n', "\n> "));
    }
    let _ = writeln!(out, "- Digest: `{}`", spec.digest());
    let _ = writeln!(out, "- Created: {}", spec.created_at().to_rfc3339());
    let _ = writeln!(
        out,
        "- Status: {}\n",
        if spec.is_complete() { "complete" } else { "incomplete" }
    );
    let _ = writeln!(out, "## Requirements\n");
    for (idx, statement) in spec.statements().iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {}", idx + 1, statement.source, statement.text);
    }
    out
}

/// Write `SPEC.md` atomically.
pub fn write_spec_artifact(path: &Utf8Path, spec: &SpecDocument) -> Result<()> {
    write_file_atomic(path, &render_spec_markdown(spec))
        .with_context(|| format!("Failed to write specification artifact: {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use shipwright_model::Requirement;

    #[test]
    fn lists_statements_with_sources() {
        let spec = SpecDocument::complete(vec![
            Requirement::user("add two numbers"),
            Requirement::agent("assume integers"),
        ]);
        let md = render_spec_markdown(&spec);

        assert!(md.starts_with("# Project Specification"));
        assert!(md.contains("> add two numbers"));
        assert!(md.contains("1. [user] add two numbers"));
        assert!(md.contains("2. [agent] assume integers"));
        assert!(md.contains(spec.digest()));
        assert!(md.contains("Status: complete"));
    }

    #[test]
    fn written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("SPEC.md")).unwrap();
        let spec = SpecDocument::incomplete(vec![Requirement::user("x")]);

        write_spec_artifact(&path, &spec).unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("Status: incomplete"));
    }
}
