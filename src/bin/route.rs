use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use layover::api::response::ErrorBody;
use layover::api::Journey;
use layover::feed::ScheduleFeed;
use layover::route::compute_route;

extern crate layover;

/// Answer one earliest-arrival query and print the journey as JSON.
#[derive(Parser)]
struct RouteArgs {
    /// Origin stop id or (partial) station name.
    origin: String,
    /// Destination stop id or (partial) station name.
    destination: String,
    /// Departure time from the origin, HH:MM:SS.
    #[arg(short, long, default_value = "08:00:00")]
    time: String,
    /// Service date (YYYYMMDD, hyphens allowed). Defaults to today.
    #[arg(short, long)]
    date: Option<String>,
    /// Directory holding the feed's CSV tables.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn run(args: &RouteArgs, date: &str) -> Result<Journey, anyhow::Error> {
    let feed = ScheduleFeed::open(&args.data_dir)?;
    let origin = feed
        .resolve_stop(&args.origin)
        .map(|stop| stop.stop_id.clone())
        .unwrap_or_else(|| args.origin.clone());
    let destination = feed
        .resolve_stop(&args.destination)
        .map(|stop| stop.stop_id.clone())
        .unwrap_or_else(|| args.destination.clone());

    Ok(compute_route(
        &origin,
        &destination,
        &args.time,
        date,
        &args.data_dir,
    )?)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = RouteArgs::parse();
    let date = args
        .date
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y%m%d").to_string());

    let (payload, code) = match run(&args, &date) {
        Ok(journey) => (
            serde_json::to_value(&journey).expect("journey serialises"),
            ExitCode::SUCCESS,
        ),
        Err(err) => (
            serde_json::to_value(ErrorBody::new(&err)).expect("error body serialises"),
            ExitCode::FAILURE,
        ),
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .expect("payload renders");
    println!("{rendered}");
    code
}
