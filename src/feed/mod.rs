pub mod load;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use itertools::Itertools;
use log::info;

pub use load::FeedError;

/// One stop from the stop catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One row of a trip's stop-time sequence. Times are seconds since midnight
/// of the service day; trips crossing midnight carry values past 86400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub stop_id: String,
    pub stop_sequence: u32,
    pub arrival_secs: Option<u32>,
    pub departure_secs: Option<u32>,
}

/// Trip decoration from `trips.csv`. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripInfo {
    pub route_id: String,
    pub service_id: String,
    pub trip_headsign: String,
    pub trip_short_name: String,
}

/// Route decoration from `routes.csv`. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub short_name: String,
    pub long_name: String,
    pub route_type: String,
}

/// Parse an `HH:MM:SS` time string into seconds since midnight.
///
/// Empty strings and the literal `nan` are absent. Hours of 24 and above are
/// accepted at face value, continuing the same service-day timeline.
pub fn parse_hms(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }
    let mut fields = trimmed.split(':');
    let (h, m, s) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    let s: u32 = s.trim().parse().ok()?;
    Some(h * 3600 + m * 60 + s)
}

/// Format seconds since midnight as zero-padded `HH:MM:SS`. Values at or past
/// 24 hours keep the literal hour count (`25:10:00`).
pub fn format_hms(secs: u32) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// A schedule dataset loaded from one directory of GTFS CSV exports.
///
/// `stops.csv` and `stop_times.csv` are required; `routes.csv`, `trips.csv`
/// and `calendar_dates.csv` degrade to empty maps when missing.
#[derive(Debug, Clone, Default)]
pub struct ScheduleFeed {
    pub stops: HashMap<String, Stop>,
    /// trip_id to that trip's rows, ordered by `stop_sequence`.
    pub stop_times: HashMap<String, Vec<StopTime>>,
    pub routes: HashMap<String, RouteInfo>,
    pub trips: HashMap<String, TripInfo>,
    /// service_id to the set of dates (verbatim `YYYYMMDD` strings) with an
    /// added-service exception.
    pub calendar: HashMap<String, HashSet<String>>,
}

impl ScheduleFeed {
    pub fn open(data_dir: &Path) -> Result<ScheduleFeed, FeedError> {
        let feed = ScheduleFeed {
            stops: load::load_stops(&data_dir.join("stops.csv"))?,
            stop_times: load::load_stop_times(&data_dir.join("stop_times.csv"))?,
            routes: load::load_routes(&data_dir.join("routes.csv"))?,
            trips: load::load_trips(&data_dir.join("trips.csv"))?,
            calendar: load::load_calendar_dates(&data_dir.join("calendar_dates.csv"))?,
        };
        info!(
            "loaded feed: {} stops, {} trips with stop times, {} routes, {} services",
            feed.stops.len(),
            feed.stop_times.len(),
            feed.routes.len(),
            feed.calendar.len()
        );
        Ok(feed)
    }

    /// Map a textual query to a stop: exact id first, then case-insensitive
    /// exact name, then case-insensitive substring. Candidates are considered
    /// in stop-id order so repeated lookups resolve the same way.
    pub fn resolve_stop(&self, query: &str) -> Option<&Stop> {
        if let Some(stop) = self.stops.get(query) {
            return Some(stop);
        }
        let needle = query.to_lowercase();
        let by_id = self
            .stops
            .values()
            .sorted_by(|a, b| a.stop_id.cmp(&b.stop_id))
            .collect_vec();
        by_id
            .iter()
            .find(|stop| stop.name.to_lowercase() == needle)
            .or_else(|| {
                by_id
                    .iter()
                    .find(|stop| stop.name.to_lowercase().contains(&needle))
            })
            .copied()
    }
}

/// The per-query view of a feed: trips whose service runs on the query date
/// and which still have at least one departure at or after the start time.
#[derive(Debug)]
pub struct ScheduleIndex<'a> {
    active: Vec<(&'a str, &'a [StopTime])>,
}

impl<'a> ScheduleIndex<'a> {
    pub fn new(feed: &'a ScheduleFeed, start_secs: u32, date: &str) -> ScheduleIndex<'a> {
        // With no trips table or no calendar there is nothing to key the
        // service filter on; the feed still routes, minus decorations.
        let date_filter = !feed.trips.is_empty() && !feed.calendar.is_empty();
        let active_services: HashSet<&str> = feed
            .calendar
            .iter()
            .filter(|(_, dates)| dates.contains(date))
            .map(|(service_id, _)| service_id.as_str())
            .collect();

        let active: Vec<(&str, &[StopTime])> = feed
            .stop_times
            .iter()
            .filter(|(trip_id, _)| {
                !date_filter
                    || feed
                        .trips
                        .get(*trip_id)
                        .is_some_and(|trip| active_services.contains(trip.service_id.as_str()))
            })
            .filter(|(_, rows)| {
                rows.iter()
                    .any(|row| row.departure_secs.is_some_and(|dep| dep >= start_secs))
            })
            .map(|(trip_id, rows)| (trip_id.as_str(), rows.as_slice()))
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .collect();

        info!(
            "{} of {} trips active on {} with departures at or after {}",
            active.len(),
            feed.stop_times.len(),
            date,
            format_hms(start_secs)
        );
        ScheduleIndex { active }
    }

    pub fn trips(&self) -> impl Iterator<Item = (&'a str, &'a [StopTime])> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_times() {
        assert_eq!(parse_hms("08:00:00"), Some(8 * 3600));
        assert_eq!(parse_hms("00:00:00"), Some(0));
        assert_eq!(parse_hms("23:59:59"), Some(86399));
    }

    #[test]
    fn parses_times_past_midnight() {
        assert_eq!(parse_hms("24:00:00"), Some(86400));
        assert_eq!(parse_hms("25:10:30"), Some(25 * 3600 + 10 * 60 + 30));
    }

    #[test]
    fn strips_whitespace() {
        assert_eq!(parse_hms("  08:30:00 "), Some(8 * 3600 + 30 * 60));
    }

    #[test]
    fn rejects_absent_and_malformed_times() {
        assert_eq!(parse_hms(""), None);
        assert_eq!(parse_hms("   "), None);
        assert_eq!(parse_hms("nan"), None);
        assert_eq!(parse_hms("NaN"), None);
        assert_eq!(parse_hms("08:00"), None);
        assert_eq!(parse_hms("08:00:00:00"), None);
        assert_eq!(parse_hms("eight:00:00"), None);
        assert_eq!(parse_hms("-1:00:00"), None);
    }

    #[test]
    fn formats_zero_padded() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(8 * 3600 + 31 * 60), "08:31:00");
        assert_eq!(format_hms(25 * 3600 + 600), "25:10:00");
    }

    #[test]
    fn hms_round_trips_within_a_day() {
        for secs in (0..86400).step_by(61) {
            assert_eq!(parse_hms(&format_hms(secs)), Some(secs));
        }
        assert_eq!(parse_hms(&format_hms(86399)), Some(86399));
    }

    fn catalogue() -> ScheduleFeed {
        let mut feed = ScheduleFeed::default();
        for (id, name) in [
            ("100", "Central Station"),
            ("200", "Harbour"),
            ("300", "Harbour East"),
        ] {
            feed.stops.insert(
                id.to_string(),
                Stop {
                    stop_id: id.to_string(),
                    name: name.to_string(),
                    lat: 0.0,
                    lon: 0.0,
                },
            );
        }
        feed
    }

    #[test]
    fn resolves_exact_id_before_names() {
        let feed = catalogue();
        assert_eq!(feed.resolve_stop("200").unwrap().name, "Harbour");
    }

    #[test]
    fn resolves_exact_name_before_substring() {
        let feed = catalogue();
        // "Harbour" is both an exact name and a substring of "Harbour East".
        assert_eq!(feed.resolve_stop("harbour").unwrap().stop_id, "200");
        assert_eq!(feed.resolve_stop("harbour e").unwrap().stop_id, "300");
        assert!(feed.resolve_stop("airport").is_none());
    }

    #[test]
    fn index_requires_departures_after_start() {
        let mut feed = catalogue();
        feed.stop_times.insert(
            "early".to_string(),
            vec![StopTime {
                stop_id: "100".to_string(),
                stop_sequence: 0,
                arrival_secs: Some(3600),
                departure_secs: Some(3600),
            }],
        );
        feed.stop_times.insert(
            "late".to_string(),
            vec![StopTime {
                stop_id: "100".to_string(),
                stop_sequence: 0,
                arrival_secs: Some(7200),
                departure_secs: Some(7200),
            }],
        );

        let index = ScheduleIndex::new(&feed, 5000, "20250101");
        let active: Vec<&str> = index.trips().map(|(trip_id, _)| trip_id).collect();
        assert_eq!(active, vec!["late"]);
    }

    #[test]
    fn index_skips_date_filter_without_calendar() {
        let mut feed = catalogue();
        feed.trips.insert(
            "t1".to_string(),
            TripInfo {
                service_id: "weekday".to_string(),
                ..TripInfo::default()
            },
        );
        feed.stop_times.insert(
            "t1".to_string(),
            vec![StopTime {
                stop_id: "100".to_string(),
                stop_sequence: 0,
                arrival_secs: Some(3600),
                departure_secs: Some(3600),
            }],
        );

        // No calendar table at all: every trip is date-eligible.
        assert_eq!(ScheduleIndex::new(&feed, 0, "20250101").len(), 1);

        // A calendar that does not cover the date excludes the trip.
        feed.calendar
            .insert("weekday".to_string(), HashSet::from(["20250102".to_string()]));
        assert!(ScheduleIndex::new(&feed, 0, "20250101").is_empty());

        // And one that does cover it keeps the trip.
        feed.calendar
            .get_mut("weekday")
            .unwrap()
            .insert("20250101".to_string());
        assert_eq!(ScheduleIndex::new(&feed, 0, "20250101").len(), 1);
    }
}
