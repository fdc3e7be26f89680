use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::debug;
use thiserror::Error;

use super::{parse_hms, RouteInfo, Stop, StopTime, TripInfo};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("missing required table: {}", .0.display())]
    MissingTable(PathBuf),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Column positions for the fields a loader cares about, resolved once from
/// the header row. Tables are loose exports; unknown columns are ignored and
/// known ones may be missing entirely.
struct Columns {
    positions: Vec<Option<usize>>,
}

impl Columns {
    fn resolve(headers: &StringRecord, names: &[&str]) -> Columns {
        Columns {
            positions: names
                .iter()
                .map(|name| headers.iter().position(|header| header.trim() == *name))
                .collect(),
        }
    }

    fn get<'a>(&self, record: &'a StringRecord, field: usize) -> &'a str {
        self.positions[field]
            .and_then(|position| record.get(position))
            .unwrap_or("")
    }
}

fn reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>, FeedError> {
    Ok(csv::ReaderBuilder::new().flexible(true).from_path(path)?)
}

/// Load the stop catalogue. Rows without a stop id, or with coordinates that
/// are present but unparseable, are skipped.
pub fn load_stops(path: &Path) -> Result<HashMap<String, Stop>, FeedError> {
    if !path.is_file() {
        return Err(FeedError::MissingTable(path.to_owned()));
    }
    let mut reader = reader_for(path)?;
    let columns = Columns::resolve(
        reader.headers()?,
        &["stop_id", "stop_name", "stop_lat", "stop_lon"],
    );

    let mut stops = HashMap::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let stop_id = columns.get(&record, 0).trim();
        if stop_id.is_empty() {
            continue;
        }
        let Some(lat) = parse_coordinate(columns.get(&record, 2)) else {
            continue;
        };
        let Some(lon) = parse_coordinate(columns.get(&record, 3)) else {
            continue;
        };
        stops.insert(
            stop_id.to_string(),
            Stop {
                stop_id: stop_id.to_string(),
                name: columns.get(&record, 1).trim().to_string(),
                lat,
                lon,
            },
        );
    }
    debug!("{}: {} stops", path.display(), stops.len());
    Ok(stops)
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse().ok()
}

/// Load stop times grouped by trip and ordered by `stop_sequence`. Rows with
/// an unparseable sequence sort as 0; time fields become absent sentinels on
/// any parse failure.
pub fn load_stop_times(path: &Path) -> Result<HashMap<String, Vec<StopTime>>, FeedError> {
    if !path.is_file() {
        return Err(FeedError::MissingTable(path.to_owned()));
    }
    let mut reader = reader_for(path)?;
    let columns = Columns::resolve(
        reader.headers()?,
        &[
            "trip_id",
            "stop_id",
            "stop_sequence",
            "arrival_time",
            "departure_time",
        ],
    );

    let mut trips: HashMap<String, Vec<StopTime>> = HashMap::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let trip_id = columns.get(&record, 0).trim();
        let stop_id = columns.get(&record, 1).trim();
        if trip_id.is_empty() || stop_id.is_empty() {
            continue;
        }
        trips.entry(trip_id.to_string()).or_default().push(StopTime {
            stop_id: stop_id.to_string(),
            stop_sequence: columns.get(&record, 2).trim().parse().unwrap_or(0),
            arrival_secs: parse_hms(columns.get(&record, 3)),
            departure_secs: parse_hms(columns.get(&record, 4)),
        });
    }
    for rows in trips.values_mut() {
        // Stable, so ties keep file order.
        rows.sort_by_key(|row| row.stop_sequence);
    }
    debug!("{}: stop times for {} trips", path.display(), trips.len());
    Ok(trips)
}

/// Load route decorations. The table is optional; a missing file is an empty
/// catalogue.
pub fn load_routes(path: &Path) -> Result<HashMap<String, RouteInfo>, FeedError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let mut reader = reader_for(path)?;
    let columns = Columns::resolve(
        reader.headers()?,
        &["route_id", "route_short_name", "route_long_name", "route_type"],
    );

    let mut routes = HashMap::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let route_id = columns.get(&record, 0).trim();
        if route_id.is_empty() {
            continue;
        }
        routes.insert(
            route_id.to_string(),
            RouteInfo {
                short_name: columns.get(&record, 1).trim().to_string(),
                long_name: columns.get(&record, 2).trim().to_string(),
                route_type: columns.get(&record, 3).trim().to_string(),
            },
        );
    }
    Ok(routes)
}

/// Load trip decorations and the trip-to-service mapping. Optional table.
pub fn load_trips(path: &Path) -> Result<HashMap<String, TripInfo>, FeedError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let mut reader = reader_for(path)?;
    let columns = Columns::resolve(
        reader.headers()?,
        &[
            "trip_id",
            "route_id",
            "service_id",
            "trip_headsign",
            "trip_short_name",
        ],
    );

    let mut trips = HashMap::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let trip_id = columns.get(&record, 0).trim();
        if trip_id.is_empty() {
            continue;
        }
        trips.insert(
            trip_id.to_string(),
            TripInfo {
                route_id: columns.get(&record, 1).trim().to_string(),
                service_id: columns.get(&record, 2).trim().to_string(),
                trip_headsign: columns.get(&record, 3).trim().to_string(),
                trip_short_name: columns.get(&record, 4).trim().to_string(),
            },
        );
    }
    Ok(trips)
}

/// Load the service calendar. Only added-service exceptions contribute; date
/// strings are kept verbatim and compared literally to the query date.
pub fn load_calendar_dates(path: &Path) -> Result<HashMap<String, HashSet<String>>, FeedError> {
    if !path.is_file() {
        return Ok(HashMap::new());
    }
    let mut reader = reader_for(path)?;
    let columns = Columns::resolve(reader.headers()?, &["service_id", "date", "exception_type"]);

    let mut calendar: HashMap<String, HashSet<String>> = HashMap::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let service_id = columns.get(&record, 0).trim();
        let date = columns.get(&record, 1).trim();
        if service_id.is_empty() || date.is_empty() {
            continue;
        }
        if columns.get(&record, 2).trim() != "1" {
            continue;
        }
        calendar
            .entry(service_id.to_string())
            .or_default()
            .insert(date.to_string());
    }
    Ok(calendar)
}
