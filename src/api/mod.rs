use serde::{Deserialize, Serialize};

pub mod request;
pub mod response;

/// One emitted stop visit of a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyStop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub arrival_time: String,
    pub departure_time: String,
    pub trip_id: String,
    pub route_id: String,
    pub route_name: String,
    pub route_description: String,
    pub trip_headsign: String,
    pub trip_short_name: String,
    pub date: String,
    pub is_transfer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One change of trips within a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub at_stop: String,
    pub stop_id: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub transfer_info: String,
    pub from_trip: String,
    pub to_trip: String,
    pub from_route: String,
    pub to_route: String,
}

/// The answer to one earliest-arrival query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journey {
    pub origin: String,
    pub origin_name: String,
    pub destination: String,
    pub destination_name: String,
    pub start_time: String,
    pub date: String,
    pub arrival_time: String,
    pub total_travel_minutes: f64,
    pub stop_count: usize,
    pub transfer_count: usize,
    pub transfers: Vec<TransferRecord>,
    pub detailed_route: Vec<JourneyStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One stop catalogue entry for the stations listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}
