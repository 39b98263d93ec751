//! Download-source resolution: collect candidates, then rank them.

use crate::cache::Cached;
use crate::collector::{collect_candidates, CollectOptions};
use crate::models::{MatchResult, QualityTier, ReferenceTrack};
use crate::ranker::select_best;
use crate::retry::{BackoffPolicy, Retrying};
use crate::source::{CandidateSource, SourceResult};

/// Resolves reference tracks against one candidate source.
pub struct TrackResolver<S> {
    source: S,
    options: CollectOptions,
}

impl<S: CandidateSource> TrackResolver<S> {
    pub fn new(source: S, options: CollectOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Best rendition of `reference` not better than `ceiling`.
    ///
    /// `Ok(None)` is an explicit no-match. Only a terminal rate-limit failure
    /// surfaces as `Err`.
    pub fn resolve(&self, reference: &ReferenceTrack, ceiling: QualityTier) -> SourceResult<Option<MatchResult>> {
        let batches = collect_candidates(&self.source, reference, &self.options)?;
        let total: usize = batches.iter().map(|b| b.candidates.len()).sum();

        let result = select_best(&batches, reference, ceiling);
        match &result {
            Some(found) => tracing::debug!(
                reference = %reference.id,
                candidates = total,
                candidate = %found.candidate.id,
                score = found.score,
                tier = %found.tier,
                via = found.kind.as_str(),
                short_circuit = found.short_circuit,
                "Resolved"
            ),
            None => tracing::debug!(reference = %reference.id, candidates = total, "No confident candidate"),
        }
        Ok(result)
    }
}

impl<C: CandidateSource> TrackResolver<Cached<Retrying<C>>> {
    /// Wrap a raw client as cache, then retry, then the client itself.
    pub fn layered(client: C, policy: BackoffPolicy, cache_capacity: usize, options: CollectOptions) -> Self {
        let source = Cached::new(Retrying::new(client, policy), cache_capacity);
        Self::new(source, options)
    }
}
