//! A generated source tree tied to one spec and one attempt.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::spec::SpecDocument;

/// A validated, relative, `/`-separated path inside a project.
///
/// Rejects absolute paths, drive prefixes, `..` components and NUL bytes, so
/// joining one onto a sandbox root can never land outside it. `.` components
/// and backslashes are normalised away.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath(String);

impl ProjectPath {
    pub fn parse(raw: &str) -> Result<Self, ProjectError> {
        let invalid = |reason: &str| ProjectError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }
        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(invalid("absolute paths are not allowed"));
        }
        let bytes = unified.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            return Err(invalid("drive prefixes are not allowed"));
        }

        let mut parts = Vec::new();
        for part in unified.split('/') {
            match part {
                "" | "." => {}
                ".." => return Err(invalid("parent-directory components are not allowed")),
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            return Err(invalid("path is empty"));
        }
        Ok(Self(parts.join("/")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path components, outermost first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = ProjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectPath> for String {
    fn from(value: ProjectPath) -> Self {
        value.0
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a file is for, as far as acceptance is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileRole {
    Source,
    Test,
    Metadata,
}

/// Glob-based role assignment. Metadata patterns are checked first, then
/// test patterns; everything else is source.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    metadata: GlobSet,
    tests: GlobSet,
}

impl FileClassifier {
    pub const DEFAULT_TEST_PATTERNS: &'static [&'static str] = &[
        "tests/**",
        "test/**",
        "**/test_*",
        "**/*_test.*",
        "**/*.test.*",
        "**/*_spec.*",
        "**/conftest.py",
    ];

    pub const DEFAULT_METADATA_PATTERNS: &'static [&'static str] = &[
        "**/pyproject.toml",
        "**/setup.py",
        "**/setup.cfg",
        "**/requirements*.txt",
        "**/*.md",
        "**/.gitignore",
        "**/LICENSE*",
        "**/Cargo.toml",
        "**/package.json",
        "**/Makefile",
        "**/*.ini",
        "**/*.lock",
    ];

    pub fn new<S: AsRef<str>>(test_patterns: &[S], metadata_patterns: &[S]) -> Result<Self, ProjectError> {
        Ok(Self {
            metadata: build_set(metadata_patterns)?,
            tests: build_set(test_patterns)?,
        })
    }

    #[must_use]
    pub fn classify(&self, path: &ProjectPath) -> FileRole {
        if self.metadata.is_match(path.as_str()) {
            FileRole::Metadata
        } else if self.tests.is_match(path.as_str()) {
            FileRole::Test
        } else {
            FileRole::Source
        }
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEST_PATTERNS, Self::DEFAULT_METADATA_PATTERNS).unwrap_or_else(
            |_| Self {
                metadata: GlobSet::empty(),
                tests: GlobSet::empty(),
            },
        )
    }
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, ProjectError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ProjectError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ProjectError::Pattern {
        pattern: patterns
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", "),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProjectFile {
    content: String,
    role: FileRole,
}

/// Files produced by one generation attempt.
///
/// Construction enforces the acceptance floor: at least one file, at least
/// one test file, at least one source file, valid relative paths, and an
/// attempt number of 1 or more.
#[derive(Debug, Clone)]
pub struct GeneratedProject {
    files: BTreeMap<ProjectPath, ProjectFile>,
    attempt: u32,
    spec: Arc<SpecDocument>,
}

impl GeneratedProject {
    pub fn new<I, P, C>(
        spec: Arc<SpecDocument>,
        attempt: u32,
        files: I,
        classifier: &FileClassifier,
    ) -> Result<Self, ProjectError>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        if attempt == 0 {
            return Err(ProjectError::ZeroAttempt);
        }

        let mut map = BTreeMap::new();
        for (raw, content) in files {
            let path = ProjectPath::parse(raw.as_ref())?;
            let role = classifier.classify(&path);
            let file = ProjectFile {
                content: content.into(),
                role,
            };
            if map.insert(path.clone(), file).is_some() {
                return Err(ProjectError::DuplicatePath {
                    path: path.to_string(),
                });
            }
        }

        if map.is_empty() {
            return Err(ProjectError::Empty);
        }
        if !map.values().any(|f| f.role == FileRole::Test) {
            return Err(ProjectError::MissingTests);
        }
        if !map.values().any(|f| f.role == FileRole::Source) {
            return Err(ProjectError::MissingSource);
        }

        Ok(Self {
            files: map,
            attempt,
            spec,
        })
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn spec(&self) -> &Arc<SpecDocument> {
        &self.spec
    }

    #[must_use]
    pub fn spec_digest(&self) -> &str {
        self.spec.digest()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&ProjectPath, &str)> {
        self.files.iter().map(|(p, f)| (p, f.content.as_str()))
    }

    #[must_use]
    pub fn content(&self, path: &str) -> Option<&str> {
        let path = ProjectPath::parse(path).ok()?;
        self.files.get(&path).map(|f| f.content.as_str())
    }

    #[must_use]
    pub fn role(&self, path: &ProjectPath) -> Option<FileRole> {
        self.files.get(path).map(|f| f.role)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.content(path).is_some()
    }

    /// Number of files per role.
    #[must_use]
    pub fn role_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for file in self.files.values() {
            *counts.entry(file.role.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Indented tree rendering used in the validation report.
    #[must_use]
    pub fn tree(&self) -> String {
        let mut out = String::new();
        let mut open: Vec<&str> = Vec::new();
        for path in self.files.keys() {
            let parts: Vec<&str> = path.components().collect();
            let (dirs, name) = parts.split_at(parts.len() - 1);
            let shared = open
                .iter()
                .zip(dirs.iter())
                .take_while(|(a, b)| a == b)
                .count();
            open.truncate(shared);
            for &dir in &dirs[shared..] {
                out.push_str(&"  ".repeat(open.len()));
                out.push_str(dir);
                out.push_str("/\n");
                open.push(dir);
            }
            out.push_str(&"  ".repeat(open.len()));
            out.push_str(name[0]);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Requirement, SpecDocument};
    use proptest::prelude::*;

    fn spec() -> Arc<SpecDocument> {
        Arc::new(SpecDocument::complete(vec![Requirement::user("adder")]))
    }

    fn adder_files() -> Vec<(&'static str, &'static str)> {
        vec![
            ("adder/__init__.py", ""),
            ("adder/core.py", "def add(a, b):\n    return a + b\n"),
            ("tests/test_core.py", "from adder.core import add\n"),
            ("pyproject.toml", "[project]\nname = \"adder\"\n"),
        ]
    }

    #[test]
    fn path_normalisation() {
        assert_eq!(ProjectPath::parse("./src//main.py").unwrap().as_str(), "src/main.py");
        assert_eq!(ProjectPath::parse("pkg\\mod.py").unwrap().as_str(), "pkg/mod.py");
    }

    #[test]
    fn escaping_paths_are_rejected() {
        for bad in ["", "/etc/passwd", "../x.py", "a/../../b", "C:\\x.py", "a\0b", "./"] {
            assert!(ProjectPath::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn default_classifier_roles() {
        let c = FileClassifier::default();
        let role = |p: &str| c.classify(&ProjectPath::parse(p).unwrap());
        assert_eq!(role("tests/test_core.py"), FileRole::Test);
        assert_eq!(role("test_main.py"), FileRole::Test);
        assert_eq!(role("pkg/util_test.go"), FileRole::Test);
        assert_eq!(role("pyproject.toml"), FileRole::Metadata);
        assert_eq!(role("requirements-dev.txt"), FileRole::Metadata);
        assert_eq!(role("tests/README.md"), FileRole::Metadata);
        assert_eq!(role("adder/core.py"), FileRole::Source);
        assert_eq!(role("latest_news.py"), FileRole::Source);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = FileClassifier::new(&["tests/[", "x"], &["*.md"]).unwrap_err();
        assert!(matches!(err, ProjectError::Pattern { .. }));
    }

    #[test]
    fn valid_project_builds() {
        let project =
            GeneratedProject::new(spec(), 1, adder_files(), &FileClassifier::default()).unwrap();
        assert_eq!(project.attempt(), 1);
        assert_eq!(project.len(), 4);
        assert!(project.contains("./adder/core.py"));
        assert_eq!(project.role_counts().get("test"), Some(&1));
    }

    #[test]
    fn empty_project_is_rejected() {
        let files: Vec<(&str, &str)> = Vec::new();
        let err = GeneratedProject::new(spec(), 1, files, &FileClassifier::default()).unwrap_err();
        assert_eq!(err, ProjectError::Empty);
    }

    #[test]
    fn project_without_tests_is_rejected() {
        let err = GeneratedProject::new(
            spec(),
            1,
            [("main.py", "print(1)")],
            &FileClassifier::default(),
        )
        .unwrap_err();
        assert_eq!(err, ProjectError::MissingTests);
    }

    #[test]
    fn project_without_source_is_rejected() {
        let err = GeneratedProject::new(
            spec(),
            1,
            [("tests/test_x.py", ""), ("README.md", "")],
            &FileClassifier::default(),
        )
        .unwrap_err();
        assert_eq!(err, ProjectError::MissingSource);
    }

    #[test]
    fn duplicate_after_normalisation_is_rejected() {
        let err = GeneratedProject::new(
            spec(),
            1,
            [("a.py", "1"), ("./a.py", "2"), ("tests/test_a.py", "")],
            &FileClassifier::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::DuplicatePath { .. }));
    }

    #[test]
    fn attempt_zero_is_rejected() {
        let err =
            GeneratedProject::new(spec(), 0, adder_files(), &FileClassifier::default()).unwrap_err();
        assert_eq!(err, ProjectError::ZeroAttempt);
    }

    #[test]
    fn tree_groups_directories() {
        let project =
            GeneratedProject::new(spec(), 1, adder_files(), &FileClassifier::default()).unwrap();
        assert_eq!(
            project.tree(),
            "adder/\n  __init__.py\n  core.py\npyproject.toml\ntests/\n  test_core.py\n"
        );
    }

    proptest! {
        #[test]
        fn parsed_paths_never_escape(raw in "[a-z./\\\\]{0,24}") {
            if let Ok(path) = ProjectPath::parse(&raw) {
                prop_assert!(!path.as_str().starts_with('/'));
                prop_assert!(path.components().all(|c| c != ".." && c != "." && !c.is_empty()));
            }
        }
    }
}
