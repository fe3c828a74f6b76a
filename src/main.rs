//! Landslide Early Warning - command-line entry point
//!
//! Runs one assessment for a location and date and prints the report card
//! (or the JSON assessment), or serves assessments over HTTP.
//!
//! Usage:
//!   slidemon --site Chooralmala --date 2024-07-30
//!   slidemon --lat 11.54 --lon 76.13 --mode forecast --json
//!   slidemon --serve 8080 --parallel-timeout 45
//!
//! Environment:
//!   IMAGERY_API_TOKEN - bearer token for the imagery gateway (may live in .env)
//!   RUST_LOG          - tracing filter, default `slidemon_service=info`

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Parser;

use slidemon_service::config::{self, Config};
use slidemon_service::endpoint::{self, EndpointContext};
use slidemon_service::ingest::imagery::HttpImageryService;
use slidemon_service::ingest::weather::OpenMeteoClient;
use slidemon_service::model::{AssessmentMode, AssessmentRequest};
use slidemon_service::report::ForensicReport;
use slidemon_service::sites::find_site;

#[derive(Parser, Debug)]
#[command(name = "slidemon")]
#[command(about = "Multi-sensor landslide risk assessment")]
#[command(version)]
struct Args {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "lon", conflicts_with = "site")]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Named site from the registry (case-insensitive, prefix match allowed)
    #[arg(long)]
    site: Option<String>,

    /// Reference date YYYY-MM-DD; defaults to today (UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// historical | forecast
    #[arg(long, default_value = "historical")]
    mode: AssessmentMode,

    /// Config file; defaults to ./slidemon.toml when present
    #[arg(long, env = "SLIDEMON_CONFIG")]
    config: Option<PathBuf>,

    /// Print the assessment as JSON instead of the report card
    #[arg(long)]
    json: bool,

    /// Fetch sources concurrently with this deadline in seconds (1 to 86400)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    parallel_timeout: Option<u64>,

    /// Serve assessments over HTTP on this port instead of running once
    #[arg(long)]
    serve: Option<u16>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slidemon_service=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv::dotenv().ok();
    let args = Args::parse();

    let config: Config = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    // Without an imagery session two of three sources are blind; refuse to start.
    let imagery = match HttpImageryService::connect(&config.imagery) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "imagery session failed");
            return Err(e.into());
        }
    };
    let weather = Arc::new(OpenMeteoClient::new(config.weather.clone())?);
    let report = ForensicReport::from_clients(&config, weather, imagery);
    let parallel_timeout = args.parallel_timeout.map(Duration::from_secs);

    if let Some(port) = args.serve {
        let ctx = EndpointContext {
            report,
            sites: config.sites(),
            parallel_timeout,
        };
        endpoint::start_endpoint_server(port, ctx)?;
        return Ok(());
    }

    let (latitude, longitude) = match (&args.site, args.lat, args.lon) {
        (Some(name), _, _) => {
            let sites = config.sites();
            let site = find_site(&sites, name).ok_or_else(|| format!("unknown site '{}'", name))?;
            tracing::info!(site = %site.name, "resolved site");
            (site.latitude, site.longitude)
        }
        (None, Some(lat), Some(lon)) => (lat, lon),
        _ => return Err("either --site or both --lat and --lon are required".into()),
    };

    let reference_date = args.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let request = AssessmentRequest::new(latitude, longitude, reference_date, args.mode)?;

    let assessment = match parallel_timeout {
        Some(timeout) => report.assess_parallel(&request, timeout),
        None => report.assess(&request),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print!("{}", assessment);
    }

    Ok(())
}
