/// Forensic report orchestrator.
///
/// Composition root of the fusion engine. For one request it:
/// 1. Invokes every source adapter (sequentially, or on a thread pool with
///    a deadline)
/// 2. Builds the source -> sample mapping, one entry per known source
/// 3. Runs the rule set, then the classifier
/// 4. Returns an immutable `RiskAssessment`
///
/// There is no retry and no partial-assessment rejection. A failed source
/// degrades to `ERROR`/`NO_DATA` and the assessment proceeds with what is
/// left; when every source fails the result is `SAFE` with all inputs
/// degraded. Callers that render the result should check
/// `RiskAssessment::degraded_sources` before presenting `SAFE` as
/// confirmation.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use threadpool::ThreadPool;

use crate::adapters::{PrecipitationAdapter, RadarChangeAdapter, SoilMoistureAdapter, SourceAdapter};
use crate::classifier;
use crate::config::{Config, RuleThresholds};
use crate::ingest::imagery::ImageryService;
use crate::ingest::weather::WeatherClient;
use crate::model::{AssessmentRequest, RiskAssessment, SignalSample, SourceKind};
use crate::rules;

pub struct ForensicReport {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    thresholds: RuleThresholds,
}

impl ForensicReport {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, thresholds: RuleThresholds) -> Self {
        Self { adapters, thresholds }
    }

    /// Wires the three standard adapters to the given provider clients.
    pub fn from_clients(config: &Config, weather: Arc<dyn WeatherClient>, imagery: Arc<dyn ImageryService>) -> Self {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(PrecipitationAdapter::new(weather, config.weather.clone())),
            Arc::new(RadarChangeAdapter::new(imagery.clone(), config.radar.clone())),
            Arc::new(SoilMoistureAdapter::new(imagery, config.soil.clone())),
        ];
        Self::new(adapters, config.thresholds)
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Runs every adapter in turn and fuses the results.
    pub fn assess(&self, request: &AssessmentRequest) -> RiskAssessment {
        tracing::info!(
            lat = request.latitude,
            lon = request.longitude,
            date = %request.reference_date,
            mode = %request.mode,
            "starting assessment"
        );

        let samples = self
            .adapters
            .iter()
            .map(|adapter| (adapter.source(), adapter.fetch(request)))
            .collect();

        self.finish(request, samples)
    }

    /// Runs the adapters concurrently. Any adapter that has not answered
    /// within `timeout` is recorded as `ERROR`; its worker is abandoned.
    pub fn assess_parallel(&self, request: &AssessmentRequest, timeout: Duration) -> RiskAssessment {
        tracing::info!(
            lat = request.latitude,
            lon = request.longitude,
            date = %request.reference_date,
            mode = %request.mode,
            timeout_ms = timeout.as_millis() as u64,
            "starting parallel assessment"
        );

        let pool = ThreadPool::with_name("slidemon-source".to_string(), self.adapters.len().max(1));
        let (tx, rx) = mpsc::channel();

        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let tx = tx.clone();
            let request = *request;
            pool.execute(move || {
                let sample = adapter.fetch(&request);
                // Receiver is gone once the deadline passes.
                let _ = tx.send((adapter.source(), sample));
            });
        }
        drop(tx);

        // A deadline past what `Instant` can represent means wait for everyone.
        let deadline = Instant::now().checked_add(timeout);
        let mut samples = Vec::with_capacity(self.adapters.len());
        while samples.len() < self.adapters.len() {
            let received = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())).ok(),
                None => rx.recv().ok(),
            };
            match received {
                Some(entry) => samples.push(entry),
                None => break,
            }
        }

        // Whatever did not report: timed out, or its worker panicked.
        for adapter in &self.adapters {
            let source = adapter.source();
            if !samples.iter().any(|(s, _)| *s == source) {
                tracing::warn!(source = ?source, "source did not report before the deadline");
                samples.push((
                    source,
                    SignalSample::error(format!("No response within {} ms", timeout.as_millis())),
                ));
            }
        }

        self.finish(request, samples)
    }

    fn finish(&self, request: &AssessmentRequest, samples: Vec<(SourceKind, SignalSample)>) -> RiskAssessment {
        let mut inputs = BTreeMap::new();
        for (source, sample) in samples {
            if inputs.insert(source, sample).is_some() {
                tracing::warn!(source = ?source, "more than one adapter for source; keeping the last");
            }
        }

        let assessment = fuse(request, inputs, &self.thresholds);

        let degraded = assessment.degraded_sources();
        if degraded.len() == SourceKind::ALL.len() {
            tracing::warn!("every source degraded; SAFE reflects missing evidence");
        }
        tracing::info!(
            level = %assessment.level(),
            factors = assessment.factors().len(),
            degraded = degraded.len(),
            "assessment complete"
        );

        assessment
    }
}

/// Pure fusion step: rules then classifier over already-collected samples.
///
/// Sources absent from `inputs` are filled with a `NO_DATA` sample so the
/// assessment always carries exactly one sample per known source.
pub fn fuse(
    request: &AssessmentRequest,
    mut inputs: BTreeMap<SourceKind, SignalSample>,
    thresholds: &RuleThresholds,
) -> RiskAssessment {
    for source in SourceKind::ALL {
        inputs
            .entry(source)
            .or_insert_with(|| SignalSample::no_data("No adapter configured for this source"));
    }

    let factors = rules::evaluate(request.mode, &inputs, thresholds);
    let level = classifier::classify(&factors);

    RiskAssessment::new(*request, level, factors, inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssessmentMode, FactorCode, RiskLevel, SampleStatus};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        source: SourceKind,
        sample: SignalSample,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Fixed {
        fn new(source: SourceKind, sample: SignalSample) -> Arc<Self> {
            Arc::new(Self { source, sample, calls: AtomicUsize::new(0), delay: Duration::ZERO })
        }

        fn slow(source: SourceKind, sample: SignalSample, delay: Duration) -> Arc<Self> {
            Arc::new(Self { source, sample, calls: AtomicUsize::new(0), delay })
        }
    }

    impl SourceAdapter for Fixed {
        fn source(&self) -> SourceKind {
            self.source
        }

        fn fetch(&self, _request: &AssessmentRequest) -> SignalSample {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.sample.clone()
        }
    }

    fn request(mode: AssessmentMode) -> AssessmentRequest {
        let date = NaiveDate::from_ymd_opt(2024, 7, 30).unwrap();
        AssessmentRequest::new(11.54, 76.13, date, mode).unwrap()
    }

    #[test]
    fn test_invokes_each_adapter_once() {
        let precip = Fixed::new(SourceKind::Precipitation, SignalSample::ok(210.0, None, "rain"));
        let radar = Fixed::new(SourceKind::RadarChange, SignalSample::ok(0.5, None, "radar"));
        let soil = Fixed::new(SourceKind::SoilMoisture, SignalSample::ok(0.2, None, "soil"));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![precip.clone(), radar.clone(), soil.clone()];
        let report = ForensicReport::new(adapters, RuleThresholds::default());

        let assessment = report.assess(&request(AssessmentMode::Historical));

        assert_eq!(precip.calls.load(Ordering::SeqCst), 1);
        assert_eq!(radar.calls.load(Ordering::SeqCst), 1);
        assert_eq!(soil.calls.load(Ordering::SeqCst), 1);
        assert_eq!(assessment.factor_codes(), vec![FactorCode::ExtremeRainfall]);
        assert_eq!(assessment.level(), RiskLevel::Watch);
    }

    #[test]
    fn test_missing_adapter_fills_no_data() {
        let soil = Fixed::new(SourceKind::SoilMoisture, SignalSample::ok(0.6, None, "soil"));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![soil];
        let report = ForensicReport::new(adapters, RuleThresholds::default());

        let assessment = report.assess(&request(AssessmentMode::Historical));
        assert_eq!(assessment.inputs().len(), 3);
        assert_eq!(
            assessment.input(SourceKind::RadarChange).map(|s| s.status()),
            Some(SampleStatus::NoData)
        );
        assert_eq!(assessment.level(), RiskLevel::Watch);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Fixed::new(SourceKind::Precipitation, SignalSample::ok(50.0, None, "rain")),
            Fixed::new(SourceKind::RadarChange, SignalSample::ok(3.1, None, "radar")),
            Fixed::new(SourceKind::SoilMoisture, SignalSample::ok(0.55, None, "soil")),
        ];
        let report = ForensicReport::new(adapters, RuleThresholds::default());
        let req = request(AssessmentMode::Historical);

        let sequential = report.assess(&req);
        let parallel = report.assess_parallel(&req, Duration::from_secs(5));
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.level(), RiskLevel::Critical);
    }

    #[test]
    fn test_slow_adapter_degrades_to_error() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Fixed::new(SourceKind::Precipitation, SignalSample::ok(50.0, None, "rain")),
            Fixed::slow(SourceKind::RadarChange, SignalSample::ok(3.1, None, "radar"), Duration::from_secs(3)),
            Fixed::new(SourceKind::SoilMoisture, SignalSample::ok(0.55, None, "soil")),
        ];
        let report = ForensicReport::new(adapters, RuleThresholds::default());

        let assessment = report.assess_parallel(&request(AssessmentMode::Historical), Duration::from_millis(200));

        let radar = assessment.input(SourceKind::RadarChange).expect("radar entry must exist");
        assert_eq!(radar.status(), SampleStatus::Error);
        assert_eq!(radar.metadata(), "No response within 200 ms");
        assert_eq!(assessment.factor_codes(), vec![FactorCode::SoilSaturated]);
        assert_eq!(assessment.level(), RiskLevel::Watch);
    }

    #[test]
    fn test_unbounded_timeout_waits_for_every_adapter() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Fixed::new(SourceKind::Precipitation, SignalSample::ok(50.0, None, "rain")),
            Fixed::slow(SourceKind::RadarChange, SignalSample::ok(3.1, None, "radar"), Duration::from_millis(50)),
            Fixed::new(SourceKind::SoilMoisture, SignalSample::ok(0.55, None, "soil")),
        ];
        let report = ForensicReport::new(adapters, RuleThresholds::default());

        let assessment = report.assess_parallel(&request(AssessmentMode::Historical), Duration::MAX);

        assert!(assessment.degraded_sources().is_empty());
        assert_eq!(assessment.level(), RiskLevel::Critical);
    }

    #[test]
    fn test_fuse_is_pure() {
        let req = request(AssessmentMode::Forecast);
        let inputs = BTreeMap::from([
            (SourceKind::Precipitation, SignalSample::ok(85.0, None, "rain").with_peak(95.0)),
            (SourceKind::RadarChange, SignalSample::no_data("none")),
        ]);

        let a = serde_json::to_string(&fuse(&req, inputs.clone(), &RuleThresholds::default())).unwrap();
        let b = serde_json::to_string(&fuse(&req, inputs, &RuleThresholds::default())).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"CRITICAL\""));
    }
}
