//! Gathered requirements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who contributed a requirement statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatementSource {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub text: String,
    pub source: StatementSource,
}

impl Requirement {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: StatementSource::User,
        }
    }

    #[must_use]
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: StatementSource::Agent,
        }
    }
}

/// Immutable record of what the requester asked for.
///
/// There are no setters. [`revised`](Self::revised) returns a new document
/// with a new digest, which is how a spec is "changed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDocument {
    statements: Vec<Requirement>,
    complete: bool,
    created_at: DateTime<Utc>,
    digest: String,
}

impl SpecDocument {
    #[must_use]
    pub fn new(statements: Vec<Requirement>, complete: bool, created_at: DateTime<Utc>) -> Self {
        let digest = digest_of(&statements, complete);
        Self {
            statements,
            complete,
            created_at,
            digest,
        }
    }

    /// A document the dialog concluded normally.
    #[must_use]
    pub fn complete(statements: Vec<Requirement>) -> Self {
        Self::new(statements, true, Utc::now())
    }

    /// Best-effort document from a dialog that ran out of turns.
    #[must_use]
    pub fn incomplete(statements: Vec<Requirement>) -> Self {
        Self::new(statements, false, Utc::now())
    }

    #[must_use]
    pub fn statements(&self) -> &[Requirement] {
        &self.statements
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Short BLAKE3 digest of the statements and completeness flag.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The first user statement, which the collector always seeds with the
    /// original request.
    #[must_use]
    pub fn initial_request(&self) -> Option<&str> {
        self.statements
            .iter()
            .find(|s| s.source == StatementSource::User)
            .map(|s| s.text.as_str())
    }

    /// A new document with `extra` appended.
    #[must_use]
    pub fn revised(&self, extra: impl IntoIterator<Item = Requirement>, complete: bool) -> Self {
        let mut statements = self.statements.clone();
        statements.extend(extra);
        Self::new(statements, complete, Utc::now())
    }
}

fn digest_of(statements: &[Requirement], complete: bool) -> String {
    let mut hasher = blake3::Hasher::new();
    for statement in statements {
        hasher.update(statement.source.to_string().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(statement.text.len() as u64).to_le_bytes());
        hasher.update(statement.text.as_bytes());
    }
    hasher.update(&[u8::from(complete)]);
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..16].to_string()
}
