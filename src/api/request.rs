use serde::{Deserialize, Serialize};

fn default_start_time() -> String {
    "08:00:00".to_string()
}

/// Query parameters for one routing request. `from` and `to` take a stop id
/// or a (partial) station name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRequest {
    pub from: String,
    pub to: String,
    #[serde(default = "default_start_time")]
    pub time: String,
    /// Service date, `YYYYMMDD` with or without hyphens. Defaults to the
    /// server's current day.
    #[serde(default)]
    pub date: Option<String>,
}
