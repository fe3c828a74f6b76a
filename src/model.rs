/// Shared data types for the landslide risk-fusion engine.
///
/// Everything the adapters, rule set, classifier and orchestrator pass
/// between each other lives here: the per-source `SignalSample`, the
/// triggered `RiskFactor`s and the final `RiskAssessment`.
///
/// `SignalSample` keeps its fields private so the one invariant that
/// matters downstream holds by construction: a sample carries a value
/// if and only if its status is `Ok`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The independent sensor feeds fused into one assessment.
///
/// Ordering is significant: `RiskAssessment::inputs` is a `BTreeMap`
/// keyed by this enum, so serialized output always lists sources in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    Precipitation,
    RadarChange,
    SoilMoisture,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Precipitation,
        SourceKind::RadarChange,
        SourceKind::SoilMoisture,
    ];

    /// Human-readable name used in report output.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Precipitation => "Rainfall",
            SourceKind::RadarChange => "Satellite radar (ground movement)",
            SourceKind::SoilMoisture => "Soil moisture",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Signal samples
// ---------------------------------------------------------------------------

/// Validity of a single source reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Ok,
    NoData,
    Stale,
    Error,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SampleStatus::Ok => "OK",
            SampleStatus::NoData => "NO_DATA",
            SampleStatus::Stale => "STALE",
            SampleStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A normalized reading from one source adapter.
///
/// `peak` is the secondary numeric field used by the precipitation source
/// (peak hourly intensity for archive windows, peak precipitation
/// probability for forecasts). Like `value`, it is only ever present on
/// an `Ok` sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SampleRecord")]
pub struct SignalSample {
    value: Option<f64>,
    peak: Option<f64>,
    status: SampleStatus,
    observed_at: Option<NaiveDate>,
    metadata: String,
}

impl SignalSample {
    /// A valid reading.
    pub fn ok(value: f64, observed_at: Option<NaiveDate>, metadata: impl Into<String>) -> Self {
        Self {
            value: Some(value),
            peak: None,
            status: SampleStatus::Ok,
            observed_at,
            metadata: metadata.into(),
        }
    }

    /// Attach the secondary numeric field. Ignored unless the sample is `Ok`.
    pub fn with_peak(mut self, peak: f64) -> Self {
        if self.status == SampleStatus::Ok {
            self.peak = Some(peak);
        }
        self
    }

    /// Provider reachable, but the requested window/filter was empty.
    pub fn no_data(metadata: impl Into<String>) -> Self {
        Self::without_value(SampleStatus::NoData, None, metadata)
    }

    /// Data exists but is too old to count as evidence.
    pub fn stale(observed_at: Option<NaiveDate>, metadata: impl Into<String>) -> Self {
        Self::without_value(SampleStatus::Stale, observed_at, metadata)
    }

    /// Transport, parse or upstream failure.
    pub fn error(metadata: impl Into<String>) -> Self {
        Self::without_value(SampleStatus::Error, None, metadata)
    }

    fn without_value(status: SampleStatus, observed_at: Option<NaiveDate>, metadata: impl Into<String>) -> Self {
        Self {
            value: None,
            peak: None,
            status,
            observed_at,
            metadata: metadata.into(),
        }
    }

    /// Bypasses the status/value invariant; lets tests check that
    /// consumers do not rely on it alone.
    #[cfg(test)]
    pub(crate) fn unchecked(status: SampleStatus, value: Option<f64>, peak: Option<f64>) -> Self {
        Self {
            value,
            peak,
            status,
            observed_at: None,
            metadata: "forged".to_string(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn peak(&self) -> Option<f64> {
        self.peak
    }

    pub fn status(&self) -> SampleStatus {
        self.status
    }

    pub fn observed_at(&self) -> Option<NaiveDate> {
        self.observed_at
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub fn is_ok(&self) -> bool {
        self.status == SampleStatus::Ok
    }

    /// Downgrade an `Ok` sample to `Stale` when its observation date lags
    /// `reference` by more than `max_age_days`. Other samples pass through.
    pub fn check_freshness(self, reference: NaiveDate, max_age_days: Option<i64>) -> Self {
        let (Some(max_age), Some(observed), true) = (max_age_days, self.observed_at, self.is_ok()) else {
            return self;
        };

        let lag = (reference - observed).num_days();
        if lag <= max_age {
            return self;
        }

        Self::stale(
            Some(observed),
            format!("Last observation {} is {} days old (limit {} days)", observed, lag, max_age),
        )
    }

    /// Self-describing one-line status, suitable for rendering even when
    /// the source failed.
    pub fn status_line(&self) -> String {
        let observed = self
            .observed_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        match self.value {
            Some(value) => format!(
                "{} | value {:.3} | observed {} | {}",
                self.status, value, observed, self.metadata
            ),
            None => format!("{} | observed {} | {}", self.status, observed, self.metadata),
        }
    }
}

/// Wire shape of a sample. Deserialization goes through this so a stored
/// or received assessment cannot smuggle a value in on a non-`Ok` sample.
#[derive(Deserialize)]
struct SampleRecord {
    value: Option<f64>,
    peak: Option<f64>,
    status: SampleStatus,
    observed_at: Option<NaiveDate>,
    metadata: String,
}

impl TryFrom<SampleRecord> for SignalSample {
    type Error = String;

    fn try_from(r: SampleRecord) -> Result<Self, Self::Error> {
        match (r.status, r.value) {
            (SampleStatus::Ok, Some(value)) => {
                let sample = SignalSample::ok(value, r.observed_at, r.metadata);
                Ok(match r.peak {
                    Some(peak) => sample.with_peak(peak),
                    None => sample,
                })
            }
            (SampleStatus::Ok, None) => Err("OK sample without a value".to_string()),
            (status, None) if r.peak.is_none() => {
                Ok(SignalSample::without_value(status, r.observed_at, r.metadata))
            }
            (status, _) => Err(format!("{} sample must not carry a value", status)),
        }
    }
}

impl From<FetchError> for SignalSample {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NoData(msg) => SignalSample::no_data(msg),
            other => SignalSample::error(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure modes inside a source adapter. Never escapes an adapter;
/// converted into `SignalSample` status instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// Network or auth failure reaching a provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider reachable, empty result for the requested window/filter.
    #[error("no data: {0}")]
    NoData(String),

    /// Malformed or unexpected response body.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Rejected assessment input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("unknown assessment mode '{0}' (expected 'historical' or 'forecast')")]
    UnknownMode(String),

    #[error("reference date {0} outside supported years {min}-{max}", min = MIN_REFERENCE_YEAR, max = MAX_REFERENCE_YEAR)]
    DateOutOfRange(NaiveDate),
}

/// Reference dates are limited to years any provider archive could cover,
/// which also keeps every day-offset window inside chrono's calendar.
pub const MIN_REFERENCE_YEAR: i32 = 1900;
pub const MAX_REFERENCE_YEAR: i32 = 2200;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Which rule vocabulary and data windows an assessment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentMode {
    /// Forensic look back at a past date using archived observations.
    Historical,
    /// Live outlook: 48-hour rain forecast plus the latest satellite passes.
    Forecast,
}

impl FromStr for AssessmentMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "historical" | "history" => Ok(AssessmentMode::Historical),
            "forecast" | "live" => Ok(AssessmentMode::Forecast),
            _ => Err(RequestError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for AssessmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentMode::Historical => f.write_str("historical"),
            AssessmentMode::Forecast => f.write_str("forecast"),
        }
    }
}

/// Location and time reference for one assessment cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Target date (historical) or "now" (forecast).
    pub reference_date: NaiveDate,
    pub mode: AssessmentMode,
}

impl AssessmentRequest {
    pub fn new(
        latitude: f64,
        longitude: f64,
        reference_date: NaiveDate,
        mode: AssessmentMode,
    ) -> Result<Self, RequestError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(RequestError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(RequestError::LongitudeOutOfRange(longitude));
        }
        if !(MIN_REFERENCE_YEAR..=MAX_REFERENCE_YEAR).contains(&reference_date.year()) {
            return Err(RequestError::DateOutOfRange(reference_date));
        }

        Ok(Self {
            latitude,
            longitude,
            reference_date,
            mode,
        })
    }
}

// ---------------------------------------------------------------------------
// Risk factors and levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorCode {
    GroundShift,
    SoilSaturated,
    ExtremeRainfall,
    HeavyRainForecast,
    StormProbable,
}

/// One named, independently triggered piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    code: FactorCode,
    description: String,
    severity: f64,
}

impl RiskFactor {
    pub fn new(code: FactorCode, description: impl Into<String>, severity: f64) -> Self {
        Self {
            code,
            description: description.into(),
            severity,
        }
    }

    pub fn code(&self) -> FactorCode {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Measured value divided by its rule threshold.
    pub fn severity(&self) -> f64 {
        self.severity
    }
}

/// Ordinal risk level. `Warning` is reserved; the current rule counts
/// never produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Watch,
    Warning,
    Critical,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Watch => "WATCH (PREPARE)",
            RiskLevel::Warning => "WARNING",
            RiskLevel::Critical => "CRITICAL (EVACUATE)",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "No danger signs detected.",
            RiskLevel::Watch => "One danger sign detected. Prepare drains and an exit route.",
            RiskLevel::Warning => "Several danger signs developing. Be ready to leave.",
            RiskLevel::Critical => "Multiple danger signs detected. Leave the slope now.",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Assessment
// ---------------------------------------------------------------------------

/// Result of one evaluation cycle: the level, the factors that produced
/// it, and exactly one sample per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    request: AssessmentRequest,
    level: RiskLevel,
    factors: Vec<RiskFactor>,
    inputs: BTreeMap<SourceKind, SignalSample>,
}

impl RiskAssessment {
    pub fn new(
        request: AssessmentRequest,
        level: RiskLevel,
        factors: Vec<RiskFactor>,
        inputs: BTreeMap<SourceKind, SignalSample>,
    ) -> Self {
        Self {
            request,
            level,
            factors,
            inputs,
        }
    }

    pub fn request(&self) -> &AssessmentRequest {
        &self.request
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn factors(&self) -> &[RiskFactor] {
        &self.factors
    }

    pub fn factor_codes(&self) -> Vec<FactorCode> {
        self.factors.iter().map(|f| f.code()).collect()
    }

    pub fn inputs(&self) -> &BTreeMap<SourceKind, SignalSample> {
        &self.inputs
    }

    pub fn input(&self, source: SourceKind) -> Option<&SignalSample> {
        self.inputs.get(&source)
    }

    /// Sources that contributed no evidence. A `Safe` level with every
    /// source listed here means "unknown", not "safe".
    pub fn degraded_sources(&self) -> Vec<SourceKind> {
        self.inputs
            .iter()
            .filter(|(_, sample)| !sample.is_ok())
            .map(|(source, _)| *source)
            .collect()
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Landslide risk at {:.4}, {:.4} ({} assessment for {})",
            self.request.latitude, self.request.longitude, self.request.mode, self.request.reference_date
        )?;
        writeln!(f, "STATUS: {}", self.level.label())?;
        writeln!(f, "  {}", self.level.advice())?;

        if !self.factors.is_empty() {
            writeln!(f, "\nRisk factors:")?;
            for factor in &self.factors {
                writeln!(f, "  - {} (x{:.2} threshold)", factor.description(), factor.severity())?;
            }
        }

        writeln!(f, "\nData sources:")?;
        for (source, sample) in &self.inputs {
            writeln!(f, "  {:<34} {}", source.label(), sample.status_line())?;
        }

        let degraded = self.degraded_sources();
        if degraded.len() == self.inputs.len() && !self.inputs.is_empty() {
            writeln!(f, "\nNo source returned usable data: SAFE here means no evidence, not confirmed safety.")?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_value_present_only_when_ok() {
        let ok = SignalSample::ok(1.5, None, "fine");
        assert_eq!(ok.value(), Some(1.5));
        assert_eq!(ok.status(), SampleStatus::Ok);

        for sample in [
            SignalSample::no_data("empty"),
            SignalSample::stale(Some(date("2024-07-01")), "old"),
            SignalSample::error("boom"),
        ] {
            assert!(sample.value().is_none(), "non-OK sample must not carry a value: {:?}", sample);
            assert!(sample.peak().is_none());
        }
    }

    #[test]
    fn test_peak_is_dropped_on_non_ok_samples() {
        let sample = SignalSample::no_data("empty").with_peak(95.0);
        assert!(sample.peak().is_none());

        let sample = SignalSample::ok(85.0, None, "forecast").with_peak(95.0);
        assert_eq!(sample.peak(), Some(95.0));
    }

    #[test]
    fn test_fetch_error_maps_to_status() {
        let sample: SignalSample = FetchError::NoData("no passes".into()).into();
        assert_eq!(sample.status(), SampleStatus::NoData);
        assert_eq!(sample.metadata(), "no passes");

        let sample: SignalSample = FetchError::Transport("connection refused".into()).into();
        assert_eq!(sample.status(), SampleStatus::Error);
        assert!(sample.metadata().contains("connection refused"));

        let sample: SignalSample = FetchError::Parse("bad json".into()).into();
        assert_eq!(sample.status(), SampleStatus::Error);
    }

    #[test]
    fn test_freshness_downgrades_old_ok_samples() {
        let sample = SignalSample::ok(2.5, Some(date("2024-07-10")), "pass");
        let checked = sample.check_freshness(date("2024-07-30"), Some(10));
        assert_eq!(checked.status(), SampleStatus::Stale);
        assert!(checked.value().is_none());
        assert_eq!(checked.observed_at(), Some(date("2024-07-10")));
        assert!(checked.metadata().contains("20 days old"));
    }

    #[test]
    fn test_freshness_keeps_recent_and_unlimited_samples() {
        let sample = SignalSample::ok(2.5, Some(date("2024-07-25")), "pass");
        assert!(sample.clone().check_freshness(date("2024-07-30"), Some(10)).is_ok());
        assert!(sample.check_freshness(date("2025-07-30"), None).is_ok());
    }

    #[test]
    fn test_status_line_describes_failed_source() {
        let line = SignalSample::error("Sentinel gateway unreachable").status_line();
        assert!(line.starts_with("ERROR"));
        assert!(line.contains("N/A"));
        assert!(line.contains("Sentinel gateway unreachable"));
    }

    #[test]
    fn test_request_rejects_out_of_range_coordinates() {
        let d = date("2024-07-30");
        assert!(AssessmentRequest::new(11.54, 76.13, d, AssessmentMode::Historical).is_ok());
        assert_eq!(
            AssessmentRequest::new(91.0, 0.0, d, AssessmentMode::Forecast),
            Err(RequestError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            AssessmentRequest::new(0.0, -181.0, d, AssessmentMode::Forecast),
            Err(RequestError::LongitudeOutOfRange(-181.0))
        );
        assert!(AssessmentRequest::new(f64::NAN, 0.0, d, AssessmentMode::Forecast).is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("historical".parse::<AssessmentMode>(), Ok(AssessmentMode::Historical));
        assert_eq!("FORECAST".parse::<AssessmentMode>(), Ok(AssessmentMode::Forecast));
        assert!("tomorrow".parse::<AssessmentMode>().is_err());
    }

    #[test]
    fn test_risk_levels_are_ordered() {
        assert!(RiskLevel::Safe < RiskLevel::Watch);
        assert!(RiskLevel::Watch < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Critical);
    }

    #[test]
    fn test_serialized_status_uses_wire_names() {
        let json = serde_json::to_string(&SignalSample::no_data("x")).unwrap();
        assert!(json.contains("\"NO_DATA\""), "got {}", json);
        let json = serde_json::to_string(&SourceKind::RadarChange).unwrap();
        assert_eq!(json, "\"RADAR_CHANGE\"");
    }

    #[test]
    fn test_degraded_sources_lists_non_ok_inputs() {
        let request = AssessmentRequest::new(11.54, 76.13, date("2024-07-30"), AssessmentMode::Historical).unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert(SourceKind::Precipitation, SignalSample::ok(12.0, None, "rain"));
        inputs.insert(SourceKind::RadarChange, SignalSample::error("down"));
        inputs.insert(SourceKind::SoilMoisture, SignalSample::no_data("none"));

        let assessment = RiskAssessment::new(request, RiskLevel::Safe, vec![], inputs);
        assert_eq!(
            assessment.degraded_sources(),
            vec![SourceKind::RadarChange, SourceKind::SoilMoisture]
        );

        let rendered = assessment.to_string();
        assert!(rendered.contains("STATUS: SAFE"));
        assert!(rendered.contains("ERROR"));
    }

    #[test]
    fn test_request_rejects_dates_outside_supported_years() {
        for d in [NaiveDate::MIN, date("1899-12-31"), date("2201-01-01"), NaiveDate::MAX] {
            assert_eq!(
                AssessmentRequest::new(1.0, 1.0, d, AssessmentMode::Historical),
                Err(RequestError::DateOutOfRange(d))
            );
        }
        assert!(AssessmentRequest::new(1.0, 1.0, date("1900-01-01"), AssessmentMode::Forecast).is_ok());
    }

    #[test]
    fn test_deserialize_keeps_valid_samples() {
        let ok = SignalSample::ok(3.1, Some(date("2024-07-28")), "radar").with_peak(4.0);
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(serde_json::from_str::<SignalSample>(&json).unwrap(), ok);

        let stale = SignalSample::stale(Some(date("2024-07-01")), "old");
        let json = serde_json::to_string(&stale).unwrap();
        assert_eq!(serde_json::from_str::<SignalSample>(&json).unwrap(), stale);
    }

    #[test]
    fn test_deserialize_rejects_value_on_non_ok_sample() {
        let json = r#"{"value":3.1,"peak":null,"status":"ERROR","observed_at":null,"metadata":"x"}"#;
        let err = serde_json::from_str::<SignalSample>(json).expect_err("ERROR sample with a value");
        assert!(err.to_string().contains("must not carry a value"), "got {}", err);

        let json = r#"{"value":null,"peak":95.0,"status":"NO_DATA","observed_at":null,"metadata":"x"}"#;
        assert!(serde_json::from_str::<SignalSample>(json).is_err());

        let json = r#"{"value":null,"peak":null,"status":"OK","observed_at":null,"metadata":"x"}"#;
        assert!(serde_json::from_str::<SignalSample>(json).is_err());
    }
}
