//! Code synthesis seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use shipwright_model::{FailureRecord, Requirement, SpecDocument};
use shipwright_utils::CancellationToken;
use thiserror::Error;

/// What a synthesizer is asked to produce. Serialises to the JSON packet
/// external generators read.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SynthesisRequest<'a> {
    pub attempt: u32,
    pub spec_digest: &'a str,
    pub statements: &'a [Requirement],
    /// Empty on the first attempt; the failures to fix on a repair.
    pub prior_failures: &'a [FailureRecord],
}

impl<'a> SynthesisRequest<'a> {
    #[must_use]
    pub fn new(spec: &'a SpecDocument, attempt: u32, prior_failures: &'a [FailureRecord]) -> Self {
        Self {
            attempt,
            spec_digest: spec.digest(),
            statements: spec.statements(),
            prior_failures,
        }
    }

    #[must_use]
    pub const fn is_repair(&self) -> bool {
        !self.prior_failures.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The collaborator ran but its output could not be understood.
    #[error("malformed synthesizer output: {0}")]
    Malformed(String),

    /// The collaborator itself failed (crashed, timed out, unavailable).
    #[error("synthesizer failed: {0}")]
    Failed(String),

    #[error("synthesis cancelled")]
    Cancelled,
}

/// Produces a file map (relative path → content) for a request.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, SynthesisError>;
}
