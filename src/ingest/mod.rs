/// Provider clients for the external data feeds.
///
/// - `weather` - hourly rain / precipitation-probability series
/// - `imagery` - satellite imagery gateway (radar backscatter, soil moisture)
/// - `fixtures` (test only) - representative provider payloads
///
/// Clients return `Result<_, FetchError>`; the adapters in `crate::adapters`
/// are what fold those results into `SignalSample`s.

pub mod fixtures;
pub mod imagery;
pub mod weather;
