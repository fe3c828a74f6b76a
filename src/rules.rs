/// Risk rule set: maps one sample per source to the triggered risk factors.
///
/// Pure and deterministic. Every rule is evaluated independently; a sample
/// whose status is not `Ok` carries no value and therefore cannot trigger
/// anything. Missing data is "no evidence", never evidence of risk.
///
/// The two modes use different rain vocabularies:
///
/// | mode       | rain factors                                  | per-source cap |
/// |------------|-----------------------------------------------|----------------|
/// | historical | `EXTREME_RAINFALL` (archive total)            | 1              |
/// | forecast   | `HEAVY_RAIN_FORECAST` + `STORM_PROBABLE`      | 2              |
///
/// The forecast asymmetry is kept on purpose: a heavy total and a near
/// certain storm are separate warnings on the live outlook, while the
/// forensic view only has the observed total to go on.

use std::collections::BTreeMap;

use crate::config::RuleThresholds;
use crate::model::{AssessmentMode, FactorCode, RiskFactor, SignalSample, SourceKind};

/// Evaluates the rules for `mode` against `inputs`.
///
/// Output order is fixed: forecast lists the rain factors first (they are
/// the primary live warning), historical lists ground shift first.
pub fn evaluate(
    mode: AssessmentMode,
    inputs: &BTreeMap<SourceKind, SignalSample>,
    thresholds: &RuleThresholds,
) -> Vec<RiskFactor> {
    let sample = |source: SourceKind| inputs.get(&source);

    let ground = ground_shift(sample(SourceKind::RadarChange), thresholds);
    let soil = soil_saturated(sample(SourceKind::SoilMoisture), thresholds);

    match mode {
        AssessmentMode::Historical => {
            let rain = extreme_rainfall(sample(SourceKind::Precipitation), thresholds);
            [ground, soil, rain].into_iter().flatten().collect()
        }
        AssessmentMode::Forecast => {
            let precip = sample(SourceKind::Precipitation);
            let heavy = heavy_rain_forecast(precip, thresholds);
            let storm = storm_probable(precip, thresholds);
            [heavy, storm, ground, soil].into_iter().flatten().collect()
        }
    }
}

// ---------------------------------------------------------------------------
// Individual rules
// ---------------------------------------------------------------------------

/// The sample, if it may count as evidence at all.
fn evidence(sample: Option<&SignalSample>) -> Option<&SignalSample> {
    sample.filter(|s| s.is_ok())
}

/// Value strictly above `threshold`.
fn exceeds(value: Option<f64>, threshold: f64) -> Option<f64> {
    value.filter(|v| *v > threshold)
}

fn ground_shift(sample: Option<&SignalSample>, t: &RuleThresholds) -> Option<RiskFactor> {
    let score = exceeds(evidence(sample)?.value(), t.ground_shift)?;
    Some(RiskFactor::new(
        FactorCode::GroundShift,
        format!("Ground shift detected (radar change {:.2})", score),
        score / t.ground_shift,
    ))
}

fn soil_saturated(sample: Option<&SignalSample>, t: &RuleThresholds) -> Option<RiskFactor> {
    let moisture = exceeds(evidence(sample)?.value(), t.soil_saturation)?;
    Some(RiskFactor::new(
        FactorCode::SoilSaturated,
        format!("Soil saturated ({:.2} moisture)", moisture),
        moisture / t.soil_saturation,
    ))
}

fn extreme_rainfall(sample: Option<&SignalSample>, t: &RuleThresholds) -> Option<RiskFactor> {
    let total = exceeds(evidence(sample)?.value(), t.extreme_rainfall_mm)?;
    Some(RiskFactor::new(
        FactorCode::ExtremeRainfall,
        format!("Extreme rainfall ({:.1} mm)", total),
        total / t.extreme_rainfall_mm,
    ))
}

fn heavy_rain_forecast(sample: Option<&SignalSample>, t: &RuleThresholds) -> Option<RiskFactor> {
    let total = exceeds(evidence(sample)?.value(), t.heavy_rain_forecast_mm)?;
    Some(RiskFactor::new(
        FactorCode::HeavyRainForecast,
        format!("Heavy rain coming ({:.1} mm forecast)", total),
        total / t.heavy_rain_forecast_mm,
    ))
}

fn storm_probable(sample: Option<&SignalSample>, t: &RuleThresholds) -> Option<RiskFactor> {
    let probability = exceeds(evidence(sample)?.peak(), t.storm_probability_pct)?;
    Some(RiskFactor::new(
        FactorCode::StormProbable,
        format!("Storm probable ({:.0}% chance of rain)", probability),
        probability / t.storm_probability_pct,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
