/// Named site registry.
///
/// Sites let the CLI and endpoint accept `--site Chooralmala` instead of
/// raw coordinates. `slidemon.toml` may list its own `[[site]]` entries;
/// when it lists none, the built-in registry below is used.

use serde::{Deserialize, Serialize};

/// A monitored hillside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    #[serde(default)]
    pub description: Option<String>,
}

struct BuiltinSite {
    name: &'static str,
    latitude: f64,
    longitude: f64,
    description: &'static str,
}

static BUILTIN_SITES: &[BuiltinSite] = &[
    BuiltinSite {
        name: "Chooralmala, Wayanad",
        latitude: 11.54,
        longitude: 76.13,
        description: "Debris-flow site of the 30 July 2024 Wayanad landslides. \
                      Reference case for forensic backtests.",
    },
    BuiltinSite {
        name: "Mundakkai, Wayanad",
        latitude: 11.56,
        longitude: 76.14,
        description: "Upslope settlement at the head of the 2024 Wayanad runout.",
    },
    BuiltinSite {
        name: "Puthumala, Wayanad",
        latitude: 11.52,
        longitude: 76.16,
        description: "August 2019 landslide site on the same ridge system.",
    },
];

/// Built-in registry as owned `Site`s.
pub fn default_sites() -> Vec<Site> {
    BUILTIN_SITES
        .iter()
        .map(|s| Site {
            name: s.name.to_string(),
            latitude: s.latitude,
            longitude: s.longitude,
            description: Some(s.description.to_string()),
        })
        .collect()
}

/// Looks up a site by name. Exact (case-insensitive) matches win over
/// prefix matches, so "Chooralmala" finds "Chooralmala, Wayanad".
pub fn find_site<'a>(sites: &'a [Site], query: &str) -> Option<&'a Site> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    sites
        .iter()
        .find(|s| s.name.to_lowercase() == query)
        .or_else(|| sites.iter().find(|s| s.name.to_lowercase().starts_with(&query)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
