use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use log::{debug, info};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use thiserror::Error;

use crate::api::{Journey, JourneyStop, TransferRecord};
use crate::feed::{format_hms, parse_hms, FeedError, ScheduleFeed, ScheduleIndex};
use crate::graph::TransitGraph;

/// Upper bound on origin visits the search departs from.
pub const MAX_START_VISITS: usize = 10;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid start_time: {0}")]
    InvalidStartTime(String),
    #[error("Origin stop not found: {0}")]
    OriginNotFound(String),
    #[error("Destination stop not found: {0}")]
    DestinationNotFound(String),
    #[error("No route found from {origin} to {destination} after {start_time} on {date}")]
    NoRoute {
        origin: String,
        destination: String,
        start_time: String,
        date: String,
    },
    #[error(transparent)]
    Feed(#[from] FeedError),
}

/// Answer one earliest-arrival query against the feed in `data_dir`.
///
/// Loads the tables, filters them to the service date and start time, builds
/// the per-query time-expanded graph, searches it, and reconstructs the
/// winning path. Nothing survives the call.
pub fn compute_route(
    origin_id: &str,
    destination_id: &str,
    start_time: &str,
    date: &str,
    data_dir: &Path,
) -> Result<Journey, RouteError> {
    let feed = ScheduleFeed::open(data_dir)?;

    if !feed.stops.contains_key(origin_id) {
        return Err(RouteError::OriginNotFound(origin_id.to_string()));
    }
    if !feed.stops.contains_key(destination_id) {
        return Err(RouteError::DestinationNotFound(destination_id.to_string()));
    }
    if origin_id == destination_id {
        return Ok(trivial_journey(&feed, origin_id, start_time, date));
    }

    let start_secs = parse_hms(start_time)
        .ok_or_else(|| RouteError::InvalidStartTime(start_time.to_string()))?;
    let date = date.replace('-', "");

    let index = ScheduleIndex::new(&feed, start_secs, &date);
    let graph = TransitGraph::build(&feed, &index, start_secs, &date);

    let path = find_earliest_arrival(&graph, origin_id, destination_id, start_secs).ok_or_else(
        || RouteError::NoRoute {
            origin: origin_id.to_string(),
            destination: destination_id.to_string(),
            start_time: start_time.to_string(),
            date: date.clone(),
        },
    )?;

    Ok(assemble_journey(
        &graph,
        &feed,
        path,
        origin_id,
        destination_id,
        start_time,
    ))
}

/// Single-source shortest-path state for one start visit.
struct ShortestPaths {
    dist: Vec<u32>,
    prev: Vec<Option<NodeIndex>>,
}

impl ShortestPaths {
    fn reaches(&self, node: NodeIndex) -> bool {
        self.dist[node.index()] != u32::MAX
    }

    fn path_to(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut path = vec![node];
        let mut cursor = node;
        while let Some(previous) = self.prev[cursor.index()] {
            path.push(previous);
            cursor = previous;
        }
        path.reverse();
        path
    }
}

fn shortest_paths(graph: &TransitGraph, start: NodeIndex) -> ShortestPaths {
    let inner = graph.inner();
    let mut state = ShortestPaths {
        dist: vec![u32::MAX; inner.node_count()],
        prev: vec![None; inner.node_count()],
    };
    let mut heap = BinaryHeap::new();
    state.dist[start.index()] = 0;
    heap.push(Reverse((0u32, start)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if cost > state.dist[node.index()] {
            continue;
        }
        for edge in inner.edges(node) {
            let next = edge.target();
            let candidate = cost.saturating_add(edge.weight().weight_secs);
            if candidate < state.dist[next.index()] {
                state.dist[next.index()] = candidate;
                state.prev[next.index()] = Some(node);
                heap.push(Reverse((candidate, next)));
            }
        }
    }
    state
}

/// Dijkstra from each candidate start visit in turn, keeping the path to the
/// target visit with the smallest real arrival time. Search cost is weighted
/// by penalised edge seconds, but the winner is judged on the clock.
fn find_earliest_arrival(
    graph: &TransitGraph,
    origin_id: &str,
    destination_id: &str,
    start_secs: u32,
) -> Option<Vec<NodeIndex>> {
    let starts: Vec<NodeIndex> = graph
        .departures_from(origin_id)
        .iter()
        .filter(|(_, departure)| *departure >= start_secs)
        .map(|(node, _)| *node)
        .take(MAX_START_VISITS)
        .collect();
    let targets: Vec<NodeIndex> = graph
        .departures_from(destination_id)
        .iter()
        .map(|(node, _)| *node)
        .collect();
    debug!(
        "{} start visits at {}, {} target visits at {}",
        starts.len(),
        origin_id,
        targets.len(),
        destination_id
    );
    if starts.is_empty() || targets.is_empty() {
        return None;
    }

    let mut best: Option<(u32, Vec<NodeIndex>)> = None;
    for start in starts {
        let paths = shortest_paths(graph, start);
        for &target in &targets {
            if !paths.reaches(target) {
                continue;
            }
            let arrival = graph.visit(target).arrival_secs;
            // Strict: on ties the first path found stays.
            if best.as_ref().map_or(true, |(earliest, _)| arrival < *earliest) {
                best = Some((arrival, paths.path_to(target)));
            }
        }
    }
    if let Some((arrival, _)) = &best {
        info!("earliest arrival {}", format_hms(*arrival));
    }
    best.map(|(_, path)| path)
}

/// Normalise search artefacts out of a node path.
///
/// First, a path that opens by switching trips without leaving the origin
/// loses its first node. Then same-stop runs collapse: a node is dropped when
/// the previous kept node and the next node both sit at its stop, because it
/// only marks waiting mid-transfer.
fn cleaned_path(graph: &TransitGraph, mut path: Vec<NodeIndex>) -> Vec<NodeIndex> {
    if path.len() >= 2 {
        let first = graph.visit(path[0]);
        let second = graph.visit(path[1]);
        if first.stop_id == second.stop_id && first.trip_id != second.trip_id {
            path.remove(0);
        }
    }

    if path.len() > 1 {
        let mut cleaned = vec![path[0]];
        let mut i = 1;
        while i < path.len() {
            let current = graph.visit(path[i]);
            let last_kept = graph.visit(*cleaned.last().expect("cleaned path starts non-empty"));
            if current.stop_id == last_kept.stop_id {
                if let Some(&next) = path.get(i + 1) {
                    if graph.visit(next).stop_id == current.stop_id {
                        i += 1;
                        continue;
                    }
                }
            }
            cleaned.push(path[i]);
            i += 1;
        }
        path = cleaned;
    }
    path
}

fn assemble_journey(
    graph: &TransitGraph,
    feed: &ScheduleFeed,
    path: Vec<NodeIndex>,
    origin_id: &str,
    destination_id: &str,
    start_time: &str,
) -> Journey {
    let path = cleaned_path(graph, path);

    let mut stops: Vec<JourneyStop> = Vec::with_capacity(path.len());
    let mut transfers: Vec<TransferRecord> = Vec::new();

    for (position, &node) in path.iter().enumerate() {
        let visit = graph.visit(node);
        let (stop_lat, stop_lon) = feed
            .stops
            .get(&visit.stop_id)
            .map(|stop| (stop.lat, stop.lon))
            .unwrap_or((0.0, 0.0));

        let previous = position
            .checked_sub(1)
            .map(|previous| graph.visit(path[previous]));
        let transfer_from = previous
            .filter(|previous| previous.trip_id != visit.trip_id)
            .map(|previous| (previous.trip_id.clone(), previous.route_id.clone()));

        let transfer_note = transfer_from.as_ref().map(|(from_trip, from_route)| {
            let note = format!("Transfer from trip {} to trip {}", from_trip, visit.trip_id);
            transfers.push(TransferRecord {
                at_stop: visit.stop_name.clone(),
                stop_id: visit.stop_id.clone(),
                stop_lat,
                stop_lon,
                transfer_info: note.clone(),
                from_trip: from_trip.clone(),
                to_trip: visit.trip_id.clone(),
                from_route: from_route.clone(),
                to_route: visit.route_id.clone(),
            });
            note
        });

        stops.push(JourneyStop {
            stop_id: visit.stop_id.clone(),
            stop_name: visit.stop_name.clone(),
            stop_lat,
            stop_lon,
            arrival_time: format_hms(visit.arrival_secs),
            departure_time: format_hms(visit.departure_secs),
            trip_id: visit.trip_id.clone(),
            route_id: visit.route_id.clone(),
            route_name: visit.route_name.clone(),
            route_description: visit.route_description.clone(),
            trip_headsign: visit.trip_headsign.clone(),
            trip_short_name: visit.trip_short_name.clone(),
            date: graph.date().to_string(),
            is_transfer: transfer_note.is_some(),
            transfer_type: transfer_note.as_ref().map(|_| "departure".to_string()),
            transfer_note,
            note: None,
        });
    }

    let first = graph.visit(path[0]);
    let last = graph.visit(*path.last().expect("search paths are non-empty"));
    // The Dijkstra cost includes transfer penalties; travel time comes from
    // the real clock values at the endpoints.
    let total_secs = last.arrival_secs.saturating_sub(first.departure_secs);
    let total_travel_minutes = (total_secs as f64 / 60.0 * 10.0).round() / 10.0;

    Journey {
        origin: origin_id.to_string(),
        origin_name: stop_name_or_id(feed, origin_id),
        destination: destination_id.to_string(),
        destination_name: stop_name_or_id(feed, destination_id),
        start_time: start_time.to_string(),
        date: graph.date().to_string(),
        arrival_time: format_hms(last.arrival_secs),
        total_travel_minutes,
        stop_count: stops.len(),
        transfer_count: transfers.len(),
        transfers,
        detailed_route: stops,
        note: None,
    }
}

fn stop_name_or_id(feed: &ScheduleFeed, stop_id: &str) -> String {
    feed.stops
        .get(stop_id)
        .map(|stop| stop.name.clone())
        .unwrap_or_else(|| stop_id.to_string())
}

/// The degenerate journey for identical endpoints: one synthetic visit whose
/// arrival and departure echo the requested start time.
fn trivial_journey(feed: &ScheduleFeed, stop_id: &str, start_time: &str, date: &str) -> Journey {
    let name = stop_name_or_id(feed, stop_id);
    let (stop_lat, stop_lon) = feed
        .stops
        .get(stop_id)
        .map(|stop| (stop.lat, stop.lon))
        .unwrap_or((0.0, 0.0));
    let note = "Origin equals destination".to_string();
    let date = date.replace('-', "");

    Journey {
        origin: stop_id.to_string(),
        origin_name: name.clone(),
        destination: stop_id.to_string(),
        destination_name: name.clone(),
        start_time: start_time.to_string(),
        date: date.clone(),
        arrival_time: start_time.to_string(),
        total_travel_minutes: 0.0,
        stop_count: 1,
        transfer_count: 0,
        transfers: Vec::new(),
        detailed_route: vec![JourneyStop {
            stop_id: stop_id.to_string(),
            stop_name: name,
            stop_lat,
            stop_lon,
            arrival_time: start_time.to_string(),
            departure_time: start_time.to_string(),
            trip_id: String::new(),
            route_id: String::new(),
            route_name: String::new(),
            route_description: String::new(),
            trip_headsign: String::new(),
            trip_short_name: String::new(),
            date,
            is_transfer: false,
            transfer_note: None,
            transfer_type: None,
            note: Some(note.clone()),
        }],
        note: Some(note),
    }
}
