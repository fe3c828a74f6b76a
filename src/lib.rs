/// slidemon_service: landslide early-warning fusion engine.
///
/// # Module structure
///
/// ```text
/// slidemon_service
/// ├── model       - shared data types (SignalSample, RiskFactor, RiskAssessment, FetchError, ...)
/// ├── config      - slidemon.toml loader: provider endpoints, data windows, rule thresholds
/// ├── sites       - named site registry for lookups by name
/// ├── ingest
/// │   ├── weather - Open-Meteo archive/forecast: URL construction + JSON parsing
/// │   ├── imagery - satellite imagery gateway: session, acquisition listing, reductions
/// │   └── fixtures (test only) - representative provider response payloads
/// ├── adapters
/// │   ├── precipitation - rain totals over the archive window or the forecast horizon
/// │   ├── radar         - SAR backscatter change against a baseline composite
/// │   └── soil          - trailing mean of daily soil moisture
/// ├── rules       - per-mode risk rules mapping samples to factors
/// ├── classifier  - factor count to risk level
/// ├── report      - orchestrator: adapters -> rules -> classifier
/// └── endpoint    - tiny_http API serving assessments as JSON
/// ```

pub mod adapters;
pub mod classifier;
pub mod config;
pub mod endpoint;
pub mod ingest;
pub mod model;
pub mod report;
pub mod rules;
pub mod sites;
