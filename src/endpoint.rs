/// HTTP endpoint for on-demand assessments
///
/// Lets a dashboard or map layer request an assessment and render the JSON
/// as-is; all interpretation already happened in the fusion core.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /assess?lat=..&lon=..[&date=YYYY-MM-DD][&mode=historical|forecast]
/// - GET /assess?site=NAME[&date=..][&mode=..] - coordinates from the site registry

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use chrono::NaiveDate;

use crate::model::{AssessmentMode, AssessmentRequest};
use crate::report::ForensicReport;
use crate::sites::{find_site, Site};

type JsonResponse = tiny_http::Response<Cursor<Vec<u8>>>;

/// What the server needs to answer requests.
pub struct EndpointContext {
    pub report: ForensicReport,
    pub sites: Vec<Site>,
    /// Run adapters concurrently with this deadline; sequential when `None`.
    pub parallel_timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Query parsing
// ---------------------------------------------------------------------------

/// Splits a request URL into its path and decoded query parameters.
pub fn split_url(url: &str) -> (&str, HashMap<String, String>) {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect();

    (path, params)
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Builds an assessment request from query parameters.
///
/// `site` takes precedence over `lat`/`lon`. `date` defaults to `today`,
/// `mode` to historical.
pub fn request_from_params(
    params: &HashMap<String, String>,
    sites: &[Site],
    today: NaiveDate,
) -> Result<AssessmentRequest, String> {
    let (latitude, longitude) = match params.get("site") {
        Some(name) => {
            let site = find_site(sites, name).ok_or_else(|| format!("Unknown site '{}'", name))?;
            (site.latitude, site.longitude)
        }
        None => (number(params, "lat")?, number(params, "lon")?),
    };

    let reference_date = match params.get("date") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        None => today,
    };

    let mode = match params.get("mode") {
        Some(raw) => raw.parse::<AssessmentMode>().map_err(|e| e.to_string())?,
        None => AssessmentMode::Historical,
    };

    AssessmentRequest::new(latitude, longitude, reference_date, mode).map_err(|e| e.to_string())
}

fn number(params: &HashMap<String, String>, key: &str) -> Result<f64, String> {
    let raw = params
        .get(key)
        .ok_or_else(|| format!("Missing '{}' parameter", key))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid '{}' value '{}'", key, raw))
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Resolves one request URL to a status code and JSON body.
pub fn route(ctx: &EndpointContext, url: &str, today: NaiveDate) -> (u16, serde_json::Value) {
    let (path, params) = split_url(url);

    match path {
        "/health" => (
            200,
            serde_json::json!({
                "status": "ok",
                "service": "slidemon_service",
                "version": env!("CARGO_PKG_VERSION")
            }),
        ),
        "/assess" => handle_assess(ctx, &params, today),
        _ => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": ["/health", "/assess?lat=..&lon=..&date=..&mode=.."]
            }),
        ),
    }
}

fn handle_assess(
    ctx: &EndpointContext,
    params: &HashMap<String, String>,
    today: NaiveDate,
) -> (u16, serde_json::Value) {
    let request = match request_from_params(params, &ctx.sites, today) {
        Ok(request) => request,
        Err(e) => return (400, serde_json::json!({ "error": e })),
    };

    let assessment = match ctx.parallel_timeout {
        Some(timeout) => ctx.report.assess_parallel(&request, timeout),
        None => ctx.report.assess(&request),
    };

    match serde_json::to_value(&assessment) {
        Ok(body) => (200, body),
        Err(e) => (500, serde_json::json!({ "error": format!("Serialization failed: {}", e) })),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port. Blocks forever.
pub fn start_endpoint_server(port: u16, ctx: EndpointContext) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    tracing::info!(port, "HTTP endpoint listening");

    for request in server.incoming_requests() {
        let today = chrono::Utc::now().date_naive();
        let (status, body) = route(&ctx, request.url(), today);
        tracing::debug!(url = request.url(), status, "request handled");

        if let Err(e) = request.respond(create_response(status, &body)) {
            tracing::warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
