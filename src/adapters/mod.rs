/// Source adapters: one per external feed, each normalizing its provider
/// into a `SignalSample`.
///
/// - `precipitation` - hourly rain totals (archive window or 48 h forecast)
/// - `radar`         - SAR backscatter change against a baseline composite
/// - `soil`          - trailing-window mean of daily soil moisture
///
/// Adapters never fail. Each one does its provider work in a private
/// `collect` returning `Result<SignalSample, FetchError>` and `fetch`
/// folds any error into the sample status via `absorb`.

use std::time::Instant;

use crate::model::{AssessmentRequest, FetchError, SignalSample, SourceKind};

pub mod precipitation;
pub mod radar;
pub mod soil;

pub use precipitation::PrecipitationAdapter;
pub use radar::RadarChangeAdapter;
pub use soil::SoilMoistureAdapter;

/// Boundary between one external feed and the fusion core.
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Fetch and normalize the feed for `request`. Transport, parse and
    /// empty-window failures come back as non-OK samples, never as errors.
    fn fetch(&self, request: &AssessmentRequest) -> SignalSample;
}

/// Converts a collection result into a sample and logs the outcome.
pub(crate) fn absorb(source: SourceKind, started: Instant, result: Result<SignalSample, FetchError>) -> SignalSample {
    let sample = result.unwrap_or_else(SignalSample::from);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if sample.is_ok() {
        tracing::info!(source = ?source, elapsed_ms, value = ?sample.value(), "source fetched");
    } else {
        tracing::warn!(
            source = ?source,
            elapsed_ms,
            status = %sample.status(),
            detail = sample.metadata(),
            "source degraded"
        );
    }

    sample
}

// ---------------------------------------------------------------------------
// Test doubles shared by the adapter tests
// ---------------------------------------------------------------------------
