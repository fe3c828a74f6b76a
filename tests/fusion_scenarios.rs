/// End-to-end fusion tests.
///
/// Drives the real adapters through `ForensicReport::from_clients` with
/// in-memory weather and imagery collaborators, so URL building and HTTP
/// are the only things not exercised here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use slidemon_service::adapters::SourceAdapter;
use slidemon_service::config::{Config, RuleThresholds};
use slidemon_service::ingest::imagery::{CollectionQuery, ImageExpr, ImageryService, Reduction};
use slidemon_service::ingest::weather::{HourlySeries, WeatherClient, WeatherQuery};
use slidemon_service::model::{
    AssessmentMode, AssessmentRequest, FactorCode, FetchError, RiskLevel, SampleStatus, SignalSample, SourceKind,
};
use slidemon_service::report::ForensicReport;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

struct CannedWeather {
    result: Result<HourlySeries, FetchError>,
}

impl WeatherClient for CannedWeather {
    fn hourly_series(&self, _query: &WeatherQuery) -> Result<HourlySeries, FetchError> {
        self.result.clone()
    }
}

/// Imagery archive with fixed radar and soil pass dates and fixed reduction
/// results, or a blanket failure.
struct CannedImagery {
    radar_passes: Vec<NaiveDate>,
    soil_passes: Vec<NaiveDate>,
    radar_change: Option<f64>,
    soil_moisture: Option<f64>,
    failure: Option<FetchError>,
}

impl CannedImagery {
    fn failing(reason: &str) -> Self {
        Self {
            radar_passes: Vec::new(),
            soil_passes: Vec::new(),
            radar_change: None,
            soil_moisture: None,
            failure: Some(FetchError::Transport(reason.to_string())),
        }
    }
}

impl ImageryService for CannedImagery {
    fn acquisitions(&self, query: &CollectionQuery) -> Result<Vec<NaiveDate>, FetchError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        let passes = if query.collection.contains("S1") { &self.radar_passes } else { &self.soil_passes };
        Ok(passes.iter().copied().filter(|d| query.range.contains(*d)).collect())
    }

    fn reduce_mean(&self, reduction: &Reduction) -> Result<Option<f64>, FetchError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(match reduction.image {
            ImageExpr::AbsDifference { .. } => self.radar_change,
            ImageExpr::Composite { .. } => self.soil_moisture,
        })
    }
}

struct Sleepy {
    source: SourceKind,
    delay: Duration,
    calls: AtomicUsize,
}

impl SourceAdapter for Sleepy {
    fn source(&self) -> SourceKind {
        self.source
    }

    fn fetch(&self, _request: &AssessmentRequest) -> SignalSample {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        SignalSample::ok(5.0, None, "late")
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn series(start: &str, rain: &[f64], probability: &[f64]) -> HourlySeries {
    let first = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M").unwrap();
    HourlySeries {
        times: (0..rain.len()).map(|h| first + chrono::Duration::hours(h as i64)).collect(),
        rain: rain.iter().map(|r| Some(*r)).collect(),
        probability: probability.iter().map(|p| Some(*p)).collect(),
    }
}

fn report(weather: CannedWeather, imagery: CannedImagery) -> ForensicReport {
    ForensicReport::from_clients(&Config::default(), Arc::new(weather), Arc::new(imagery))
}

fn historical(on: &str) -> AssessmentRequest {
    AssessmentRequest::new(11.54, 76.13, date(on), AssessmentMode::Historical).unwrap()
}

fn forecast(on: &str) -> AssessmentRequest {
    AssessmentRequest::new(11.54, 76.13, date(on), AssessmentMode::Forecast).unwrap()
}

/// Historical windows for 2024-07-30: radar recent [07-18, 07-31),
/// baseline [06-30, 07-17); soil [07-27, 07-30).
fn wayanad_imagery(radar_change: f64, soil_moisture: f64) -> CannedImagery {
    CannedImagery {
        radar_passes: vec![date("2024-07-05"), date("2024-07-11"), date("2024-07-28")],
        soil_passes: vec![date("2024-07-27"), date("2024-07-28"), date("2024-07-29")],
        radar_change: Some(radar_change),
        soil_moisture: Some(soil_moisture),
        failure: None,
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_extreme_rain_alone_is_watch() {
    let weather = CannedWeather { result: Ok(series("2024-07-29T00:00", &[60.0, 80.0, 70.0], &[])) };
    let assessment = report(weather, wayanad_imagery(0.5, 0.2)).assess(&historical("2024-07-30"));

    assert_eq!(assessment.factor_codes(), vec![FactorCode::ExtremeRainfall]);
    assert_eq!(assessment.level(), RiskLevel::Watch);
    assert!(assessment.degraded_sources().is_empty());
    assert_eq!(assessment.input(SourceKind::Precipitation).unwrap().value(), Some(210.0));
}

#[test]
fn test_ground_shift_and_saturation_is_critical() {
    let weather = CannedWeather { result: Ok(series("2024-07-29T00:00", &[20.0, 30.0], &[])) };
    let assessment = report(weather, wayanad_imagery(3.1, 0.55)).assess(&historical("2024-07-30"));

    assert_eq!(assessment.factor_codes(), vec![FactorCode::GroundShift, FactorCode::SoilSaturated]);
    assert_eq!(assessment.level(), RiskLevel::Critical);
}

#[test]
fn test_all_sources_failing_reads_safe_with_degraded_inputs() {
    let weather = CannedWeather { result: Err(FetchError::Transport("connection refused".into())) };
    let assessment = report(weather, CannedImagery::failing("gateway down")).assess(&historical("2024-07-30"));

    assert!(assessment.factors().is_empty());
    assert_eq!(assessment.level(), RiskLevel::Safe);
    assert_eq!(assessment.degraded_sources().len(), 3);
    for sample in assessment.inputs().values() {
        assert_eq!(sample.status(), SampleStatus::Error);
        assert!(sample.value().is_none());
    }
    assert!(assessment.to_string().contains("no evidence"));
}

#[test]
fn test_forecast_rain_alone_can_be_critical() {
    let weather = CannedWeather {
        result: Ok(series("2026-10-18T00:00", &[20.0, 25.0, 40.0], &[60.0, 95.0, 80.0])),
    };
    let assessment = report(weather, CannedImagery::failing("gateway down")).assess(&forecast("2026-10-18"));

    assert_eq!(
        assessment.factor_codes(),
        vec![FactorCode::HeavyRainForecast, FactorCode::StormProbable]
    );
    assert_eq!(assessment.level(), RiskLevel::Critical);
    assert_eq!(
        assessment.degraded_sources(),
        vec![SourceKind::RadarChange, SourceKind::SoilMoisture]
    );
}

#[test]
fn test_empty_windows_are_no_data_not_errors() {
    let weather = CannedWeather { result: Ok(HourlySeries::default()) };
    let imagery = CannedImagery {
        radar_passes: Vec::new(),
        soil_passes: Vec::new(),
        radar_change: Some(9.9),
        soil_moisture: Some(0.9),
        failure: None,
    };
    let assessment = report(weather, imagery).assess(&historical("2024-07-30"));

    assert_eq!(assessment.level(), RiskLevel::Safe);
    for sample in assessment.inputs().values() {
        assert_eq!(sample.status(), SampleStatus::NoData);
    }
}

#[test]
fn test_same_inputs_give_byte_identical_json() {
    let run = || {
        let weather = CannedWeather { result: Ok(series("2024-07-29T00:00", &[60.0, 80.0, 70.0], &[])) };
        let assessment = report(weather, wayanad_imagery(3.1, 0.55)).assess(&historical("2024-07-30"));
        serde_json::to_string(&assessment).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_parallel_deadline_degrades_only_the_slow_source() {
    let slow = Arc::new(Sleepy {
        source: SourceKind::RadarChange,
        delay: Duration::from_secs(3),
        calls: AtomicUsize::new(0),
    });
    let fast = Arc::new(Sleepy {
        source: SourceKind::SoilMoisture,
        delay: Duration::ZERO,
        calls: AtomicUsize::new(0),
    });
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![slow.clone(), fast.clone()];
    let report = ForensicReport::new(adapters, RuleThresholds::default());

    let assessment = report.assess_parallel(&historical("2024-07-30"), Duration::from_millis(300));

    assert_eq!(assessment.input(SourceKind::RadarChange).unwrap().status(), SampleStatus::Error);
    assert_eq!(assessment.input(SourceKind::SoilMoisture).unwrap().status(), SampleStatus::Ok);
    assert_eq!(assessment.input(SourceKind::Precipitation).unwrap().status(), SampleStatus::NoData);
    assert_eq!(assessment.factor_codes(), vec![FactorCode::SoilSaturated]);
    assert_eq!(fast.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_forecast_probability_without_amounts_still_raises_storm() {
    let mut probable = series("2026-10-18T00:00", &[0.0, 0.0, 0.0], &[30.0, 92.0, 70.0]);
    probable.rain = vec![None; 3];
    let weather = CannedWeather { result: Ok(probable) };
    let assessment = report(weather, CannedImagery::failing("gateway down")).assess(&forecast("2026-10-18"));

    assert_eq!(assessment.factor_codes(), vec![FactorCode::StormProbable]);
    assert_eq!(assessment.level(), RiskLevel::Watch);
    assert_eq!(assessment.input(SourceKind::Precipitation).unwrap().status(), SampleStatus::Ok);
}
