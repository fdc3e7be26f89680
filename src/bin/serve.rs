use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use layover::api::request::RouteRequest;
use layover::api::response::ErrorBody;
use layover::api::StationRecord;
use layover::feed::ScheduleFeed;
use layover::route::compute_route;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

#[macro_use]
extern crate rocket;

struct ServerConfig {
    data_dir: PathBuf,
}

fn today() -> String {
    Local::now().format("%Y%m%d").to_string()
}

fn error_response(code: Status, message: impl ToString) -> status::Custom<Json<Value>> {
    status::Custom(
        code,
        Json(serde_json::to_value(ErrorBody::new(message)).expect("error body serialises")),
    )
}

fn answer(request: &RouteRequest, config: &ServerConfig) -> status::Custom<Json<Value>> {
    let date = request.date.clone().unwrap_or_else(today);
    let feed = match ScheduleFeed::open(&config.data_dir) {
        Ok(feed) => feed,
        Err(err) => return error_response(Status::InternalServerError, err),
    };
    let origin = feed
        .resolve_stop(&request.from)
        .map(|stop| stop.stop_id.clone())
        .unwrap_or_else(|| request.from.clone());
    let destination = feed
        .resolve_stop(&request.to)
        .map(|stop| stop.stop_id.clone())
        .unwrap_or_else(|| request.to.clone());

    match compute_route(&origin, &destination, &request.time, &date, &config.data_dir) {
        Ok(journey) => {
            let mut value = serde_json::to_value(journey).expect("journey serialises");
            value["success"] = json!(true);
            status::Custom(Status::Ok, Json(value))
        }
        Err(err) => error_response(Status::NotFound, err),
    }
}

#[get("/api/route?<from>&<to>&<time>&<date>")]
fn route_get(
    from: Option<String>,
    to: Option<String>,
    time: Option<String>,
    date: Option<String>,
    config: &State<ServerConfig>,
) -> status::Custom<Json<Value>> {
    let Some(from) = from else {
        return error_response(Status::BadRequest, "Missing 'from' parameter");
    };
    let Some(to) = to else {
        return error_response(Status::BadRequest, "Missing 'to' parameter");
    };
    let request = RouteRequest {
        from,
        to,
        time: time.unwrap_or_else(|| "08:00:00".to_string()),
        date,
    };
    answer(&request, config)
}

#[post("/api/route", data = "<request>")]
fn route_post(
    request: Json<RouteRequest>,
    config: &State<ServerConfig>,
) -> status::Custom<Json<Value>> {
    answer(&request.0, config)
}

#[get("/api/stations")]
fn stations(config: &State<ServerConfig>) -> status::Custom<Json<Value>> {
    match ScheduleFeed::open(&config.data_dir) {
        Ok(feed) => {
            let mut stations: Vec<StationRecord> = feed
                .stops
                .values()
                .map(|stop| StationRecord {
                    stop_id: stop.stop_id.clone(),
                    stop_name: stop.name.clone(),
                    stop_lat: stop.lat,
                    stop_lon: stop.lon,
                })
                .collect();
            stations.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));
            status::Custom(
                Status::Ok,
                Json(json!({ "stations": stations, "success": true })),
            )
        }
        Err(err) => error_response(Status::NotFound, err),
    }
}

#[get("/api/health")]
fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "transit-routing-api",
        "success": true
    }))
}

#[get("/")]
fn index() -> Json<Value> {
    Json(json!({
        "message": "Transit routing API",
        "endpoints": {
            "GET /api/route": "Journey between stops (query params: from, to, time, date)",
            "POST /api/route": "Journey between stops (JSON body: {from, to, time, date})",
            "GET /api/stations": "List all stops in the feed",
            "GET /api/health": "Health check"
        },
        "examples": {
            "get_route": "/api/route?from=CAGLIARI&to=OLBIA&time=08:00:00",
            "post_route": "POST /api/route with JSON: {\"from\": \"CAGLIARI\", \"to\": \"OLBIA\", \"time\": \"08:00:00\"}"
        }
    }))
}

#[derive(Parser)]
struct ServeArgs {
    /// Directory holding the feed's CSV tables.
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,
    #[arg(short, long)]
    port: Option<u16>,
}

#[launch]
fn rocket() -> _ {
    env_logger::init();
    let args = ServeArgs::parse();

    rocket::build()
        .manage(ServerConfig {
            data_dir: args.data_dir,
        })
        .configure(rocket::Config::figment().merge(("port", args.port.unwrap_or(8000))))
        .mount(
            "/",
            routes![index, health, stations, route_get, route_post],
        )
}
