/// Test fixtures: representative JSON payloads from the weather API and
/// the imagery gateway.
///
/// Weather fixtures reflect the Open-Meteo hourly envelope:
///   response.hourly
///     .time[]                       - local ISO 8601 without seconds ("2024-07-30T00:00")
///     .rain[]                       - mm per hour, `null` for missing hours
///     .precipitation_probability[]  - percent, forecast endpoint only
///   response.error / .reason        - present only on rejected requests
///
/// Imagery fixtures reflect the gateway's listing and reduction replies.
/// The Chooralmala values are shaped after the July 2024 Wayanad event:
/// a wet week, one very heavy night, and a radar pass two days before.

/// Six archive hours spanning midnight on the night of the event.
/// Total 61.5 mm, peak 32.0 mm/h.
#[cfg(test)]
pub(crate) fn fixture_archive_rain_json() -> &'static str {
    r#"{
      "latitude": 11.5,
      "longitude": 76.125,
      "timezone": "GMT",
      "hourly_units": { "time": "iso8601", "rain": "mm" },
      "hourly": {
        "time": [
          "2024-07-29T21:00", "2024-07-29T22:00", "2024-07-29T23:00",
          "2024-07-30T00:00", "2024-07-30T01:00", "2024-07-30T02:00"
        ],
        "rain": [4.5, 8.0, 32.0, 12.0, 3.0, 2.0]
      }
    }"#
}

/// Four forecast hours: 85 mm total, peak probability 95%.
#[cfg(test)]
pub(crate) fn fixture_forecast_json() -> &'static str {
    r#"{
      "latitude": 11.5,
      "longitude": 76.125,
      "hourly_units": { "time": "iso8601", "rain": "mm", "precipitation_probability": "%" },
      "hourly": {
        "time": ["2026-10-18T00:00", "2026-10-18T01:00", "2026-10-18T02:00", "2026-10-18T03:00"],
        "rain": [10.0, 30.0, 40.0, 5.0],
        "precipitation_probability": [70, 95, 90, 60]
      }
    }"#
}

/// Archive hours with gaps: nulls must be skipped, not treated as zero
/// evidence of dryness or as a parse failure.
#[cfg(test)]
pub(crate) fn fixture_partial_nulls_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["2024-07-30T00:00", "2024-07-30T01:00", "2024-07-30T02:00", "2024-07-30T03:00"],
        "rain": [1.5, null, 2.0, null]
      }
    }"#
}

/// Every hour present but no rain value at all (station outage).
#[cfg(test)]
pub(crate) fn fixture_all_null_rain_json() -> &'static str {
    r#"{
      "hourly": {
        "time": ["2024-07-30T00:00", "2024-07-30T01:00"],
        "rain": [null, null]
      }
    }"#
}

/// Empty hourly arrays: the provider answered but the window was empty.
#[cfg(test)]
pub(crate) fn fixture_empty_hourly_json() -> &'static str {
    r#"{ "hourly": { "time": [], "rain": [] } }"#
}

/// Error envelope returned with HTTP 400.
#[cfg(test)]
pub(crate) fn fixture_weather_error_json() -> &'static str {
    r#"{ "error": true, "reason": "Parameter 'start_date' is out of allowed range" }"#
}

/// Three Sentinel-1 passes; the last one carries a full timestamp.
#[cfg(test)]
pub(crate) fn fixture_radar_acquisitions_json() -> &'static str {
    r#"{ "acquisitions": ["2024-07-18", "2024-07-23", "2024-07-28T00:47:12Z"] }"#
}

#[cfg(test)]
pub(crate) fn fixture_empty_acquisitions_json() -> &'static str {
    r#"{ "acquisitions": [] }"#
}

#[cfg(test)]
pub(crate) fn fixture_reduce_json() -> &'static str {
    r#"{ "mean": 3.1, "pixels": 7854 }"#
}

/// Region fully masked (e.g. water body or swath edge).
#[cfg(test)]
pub(crate) fn fixture_reduce_masked_json() -> &'static str {
    r#"{ "mean": null, "pixels": 0 }"#
}
