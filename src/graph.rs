use std::collections::HashMap;

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::feed::{ScheduleFeed, ScheduleIndex};

/// Added to every transfer edge to discourage changing trips (10 minutes).
pub const TRANSFER_PENALTY_SECS: u32 = 600;
/// How many later departures at the same stop each visit is checked against.
pub const TRANSFER_SCAN_WINDOW: usize = 2;
/// Upper bound on transfer edges emitted per visit.
pub const TRANSFERS_PER_VISIT: usize = 2;
/// Visits departing later than this after the query start are left out.
pub const GRAPH_HORIZON_SECS: u32 = 24 * 3600;

/// One vehicle's visit to one stop: the node of the time-expanded graph.
/// Carries the decorations the journey output needs so reconstruction never
/// goes back to the feed.
#[derive(Debug, Clone)]
pub struct StopVisit {
    pub stop_id: String,
    pub trip_id: String,
    /// Position in the trip's ordered stop-time sequence.
    pub stop_index: usize,
    pub arrival_secs: u32,
    pub departure_secs: u32,
    pub stop_name: String,
    pub route_id: String,
    pub route_name: String,
    pub route_description: String,
    pub trip_headsign: String,
    pub trip_short_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    /// Staying onboard between consecutive stops of one trip.
    Ride,
    /// Changing to a later-departing trip at the same stop.
    Transfer,
}

/// Edge payload: elapsed seconds (plus penalty for transfers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub kind: HopKind,
    pub weight_secs: u32,
}

/// The per-query time-expanded graph, with an index of outbound visits per
/// stop sorted by departure time.
#[derive(Debug)]
pub struct TransitGraph {
    graph: DiGraph<StopVisit, Hop>,
    departures_by_stop: HashMap<String, Vec<(NodeIndex, u32)>>,
    date: String,
}

impl TransitGraph {
    pub fn build(
        feed: &ScheduleFeed,
        index: &ScheduleIndex,
        start_secs: u32,
        date: &str,
    ) -> TransitGraph {
        let mut graph = DiGraph::new();
        let mut departures_by_stop: HashMap<String, Vec<(NodeIndex, u32)>> = HashMap::new();
        let horizon = start_secs.saturating_add(GRAPH_HORIZON_SECS);

        for (trip_id, rows) in index.trips() {
            let trip_info = feed.trips.get(trip_id);
            let route_id = trip_info.map(|trip| trip.route_id.clone()).unwrap_or_default();
            let route_info = feed.routes.get(&route_id);

            let mut previous: Option<NodeIndex> = None;
            for (stop_index, row) in rows.iter().enumerate() {
                let (Some(arrival_secs), Some(departure_secs)) =
                    (row.arrival_secs, row.departure_secs)
                else {
                    // A row without usable times breaks the chain: the next
                    // emitted visit starts a fresh one.
                    previous = None;
                    continue;
                };
                if departure_secs > horizon {
                    previous = None;
                    continue;
                }

                let node = graph.add_node(StopVisit {
                    stop_id: row.stop_id.clone(),
                    trip_id: trip_id.to_string(),
                    stop_index,
                    arrival_secs,
                    departure_secs,
                    stop_name: feed
                        .stops
                        .get(&row.stop_id)
                        .map(|stop| stop.name.clone())
                        .unwrap_or_default(),
                    route_id: route_id.clone(),
                    route_name: route_info
                        .map(|route| route.short_name.clone())
                        .unwrap_or_else(|| route_id.clone()),
                    route_description: route_info
                        .map(|route| route.long_name.clone())
                        .unwrap_or_default(),
                    trip_headsign: trip_info
                        .map(|trip| trip.trip_headsign.clone())
                        .unwrap_or_default(),
                    trip_short_name: trip_info
                        .map(|trip| trip.trip_short_name.clone())
                        .unwrap_or_default(),
                });

                if let Some(previous) = previous {
                    let boarded_at = graph[previous].departure_secs;
                    // Zero-dwell hops are fine; rows running backwards in
                    // time get no edge.
                    if arrival_secs >= boarded_at {
                        graph.add_edge(
                            previous,
                            node,
                            Hop {
                                kind: HopKind::Ride,
                                weight_secs: arrival_secs - boarded_at,
                            },
                        );
                    }
                }
                departures_by_stop
                    .entry(row.stop_id.clone())
                    .or_default()
                    .push((node, departure_secs));
                previous = Some(node);
            }
        }

        let mut transfer_count = 0usize;
        for departures in departures_by_stop.values_mut() {
            // Stable sort: simultaneous departures keep emission order.
            departures.sort_by_key(|(_, departure_secs)| *departure_secs);

            for from_position in 0..departures.len() {
                let (from_node, _) = departures[from_position];
                let from_trip = graph[from_node].trip_id.clone();
                let from_arrival = graph[from_node].arrival_secs;

                let mut added = 0usize;
                let window_end =
                    departures.len().min(from_position + 1 + TRANSFER_SCAN_WINDOW);
                for &(to_node, to_departure) in &departures[from_position + 1..window_end] {
                    if graph[to_node].trip_id == from_trip {
                        continue;
                    }
                    if to_departure < from_arrival {
                        continue;
                    }
                    graph.add_edge(
                        from_node,
                        to_node,
                        Hop {
                            kind: HopKind::Transfer,
                            weight_secs: (to_departure - from_arrival) + TRANSFER_PENALTY_SECS,
                        },
                    );
                    transfer_count += 1;
                    added += 1;
                    if added >= TRANSFERS_PER_VISIT {
                        break;
                    }
                }
            }
        }

        debug!(
            "graph: {} visits, {} edges ({} transfers)",
            graph.node_count(),
            graph.edge_count(),
            transfer_count
        );
        TransitGraph {
            graph,
            departures_by_stop,
            date: date.to_string(),
        }
    }

    pub fn visit(&self, node: NodeIndex) -> &StopVisit {
        &self.graph[node]
    }

    /// Outbound visits at a stop, ascending by departure time.
    pub fn departures_from(&self, stop_id: &str) -> &[(NodeIndex, u32)] {
        self.departures_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn inner(&self) -> &DiGraph<StopVisit, Hop> {
        &self.graph
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use petgraph::visit::EdgeRef;

    use crate::feed::{ScheduleFeed, ScheduleIndex, Stop, StopTime, TripInfo};

    use super::*;

    fn stop_time(stop_id: &str, seq: u32, arrival: Option<u32>, departure: Option<u32>) -> StopTime {
        StopTime {
            stop_id: stop_id.to_string(),
            stop_sequence: seq,
            arrival_secs: arrival,
            departure_secs: departure,
        }
    }

    fn feed_with(trips: Vec<(&str, Vec<StopTime>)>) -> ScheduleFeed {
        let mut feed = ScheduleFeed::default();
        let mut stop_ids = HashSet::new();
        for (trip_id, rows) in trips {
            for row in &rows {
                stop_ids.insert(row.stop_id.clone());
            }
            feed.trips.insert(
                trip_id.to_string(),
                TripInfo {
                    route_id: format!("route-{trip_id}"),
                    ..TripInfo::default()
                },
            );
            feed.stop_times.insert(trip_id.to_string(), rows);
        }
        for stop_id in stop_ids {
            feed.stops.insert(
                stop_id.clone(),
                Stop {
                    stop_id: stop_id.clone(),
                    name: format!("Stop {stop_id}"),
                    lat: 0.0,
                    lon: 0.0,
                },
            );
        }
        feed
    }

    fn build(feed: &ScheduleFeed, start_secs: u32) -> TransitGraph {
        let index = ScheduleIndex::new(feed, start_secs, "20250101");
        TransitGraph::build(feed, &index, start_secs, "20250101")
    }

    fn edges_of(graph: &TransitGraph) -> Vec<(String, String, HopKind, u32)> {
        graph
            .inner()
            .edge_references()
            .map(|edge| {
                let from = graph.visit(edge.source());
                let to = graph.visit(edge.target());
                (
                    format!("{}@{}", from.stop_id, from.trip_id),
                    format!("{}@{}", to.stop_id, to.trip_id),
                    edge.weight().kind,
                    edge.weight().weight_secs,
                )
            })
            .collect()
    }

    #[test]
    fn chains_ride_edges_with_elapsed_weights() {
        let feed = feed_with(vec![(
            "T1",
            vec![
                stop_time("A", 1, Some(28800), Some(28800)),
                stop_time("B", 2, Some(30600), Some(30660)),
                stop_time("C", 3, Some(33300), Some(33300)),
            ],
        )]);
        let graph = build(&feed, 28800);

        assert_eq!(graph.node_count(), 3);
        let edges = edges_of(&graph);
        assert!(edges.contains(&("A@T1".into(), "B@T1".into(), HopKind::Ride, 1800)));
        assert!(edges.contains(&("B@T1".into(), "C@T1".into(), HopKind::Ride, 2640)));
    }

    #[test]
    fn undefined_times_break_the_chain() {
        let feed = feed_with(vec![(
            "T1",
            vec![
                stop_time("A", 1, Some(28800), Some(28800)),
                stop_time("B", 2, None, Some(30600)),
                stop_time("C", 3, Some(33300), Some(33300)),
            ],
        )]);
        let graph = build(&feed, 28800);

        // B never becomes a visit and no edge spans the gap.
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn zero_dwell_is_kept_and_backwards_rows_get_no_edge() {
        let feed = feed_with(vec![(
            "T1",
            vec![
                stop_time("A", 1, Some(28800), Some(28800)),
                stop_time("B", 2, Some(28800), Some(28800)),
                stop_time("C", 3, Some(27000), Some(27000)),
                stop_time("D", 4, Some(28900), Some(29000)),
            ],
        )]);
        let graph = build(&feed, 0);

        let edges = edges_of(&graph);
        assert!(edges.contains(&("A@T1".into(), "B@T1".into(), HopKind::Ride, 0)));
        // C arrives before B departs: dropped edge, but C still anchors the
        // next hop.
        assert!(!edges
            .iter()
            .any(|(from, to, _, _)| from == "B@T1" && to == "C@T1"));
        assert!(edges.contains(&("C@T1".into(), "D@T1".into(), HopKind::Ride, 1900)));
    }

    #[test]
    fn visits_beyond_the_horizon_are_omitted() {
        let feed = feed_with(vec![(
            "T1",
            vec![
                stop_time("A", 1, Some(28800), Some(28800)),
                stop_time("B", 2, Some(28800 + GRAPH_HORIZON_SECS), Some(28801 + GRAPH_HORIZON_SECS)),
            ],
        )]);
        let graph = build(&feed, 28800);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn transfers_connect_distinct_trips_with_penalty() {
        let feed = feed_with(vec![
            (
                "T1",
                vec![
                    stop_time("A", 1, Some(28800), Some(28800)),
                    stop_time("B", 2, Some(30600), Some(30660)),
                ],
            ),
            (
                "T2",
                vec![
                    stop_time("B", 1, Some(31500), Some(31500)),
                    stop_time("D", 2, Some(33000), Some(33000)),
                ],
            ),
        ]);
        let graph = build(&feed, 28800);

        let edges = edges_of(&graph);
        // Wait at B is 31500 - 30600 = 900 seconds, plus the flat penalty.
        assert!(edges.contains(&(
            "B@T1".into(),
            "B@T2".into(),
            HopKind::Transfer,
            900 + TRANSFER_PENALTY_SECS
        )));
        // Never back in time: T2's visit arrives before T1's departs.
        assert!(!edges
            .iter()
            .any(|(from, to, kind, _)| *kind == HopKind::Transfer && from == "B@T2" && to == "B@T1"));
    }

    #[test]
    fn transfer_fan_out_is_bounded() {
        let mut trips = vec![(
            "T0",
            vec![
                stop_time("X", 1, Some(28000), Some(28000)),
                stop_time("HUB", 2, Some(28800), Some(28800)),
            ],
        )];
        let laters: Vec<(String, Vec<StopTime>)> = (1..=5)
            .map(|i| {
                (
                    format!("T{i}"),
                    vec![
                        stop_time("HUB", 1, Some(29000 + i * 60), Some(29000 + i * 60)),
                        stop_time("Y", 2, Some(32000 + i * 60), Some(32000 + i * 60)),
                    ],
                )
            })
            .collect();
        trips.extend(
            laters
                .iter()
                .map(|(trip_id, rows)| (trip_id.as_str(), rows.clone())),
        );
        let feed = feed_with(trips);
        let graph = build(&feed, 27000);

        let from_t0: Vec<_> = edges_of(&graph)
            .into_iter()
            .filter(|(from, _, kind, _)| from == "HUB@T0" && *kind == HopKind::Transfer)
            .collect();
        assert_eq!(from_t0.len(), TRANSFERS_PER_VISIT);
    }

    #[test]
    fn departure_index_is_sorted() {
        let feed = feed_with(vec![
            ("T1", vec![stop_time("A", 1, Some(30000), Some(30000))]),
            ("T2", vec![stop_time("A", 1, Some(29000), Some(29000))]),
            ("T3", vec![stop_time("A", 1, Some(31000), Some(31000))]),
        ]);
        let graph = build(&feed, 0);

        let departures: Vec<u32> = graph
            .departures_from("A")
            .iter()
            .map(|(_, departure)| *departure)
            .collect();
        assert_eq!(departures, vec![29000, 30000, 31000]);
        assert!(graph.departures_from("missing").is_empty());
    }
}
