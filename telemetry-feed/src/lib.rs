//! Local telemetry source for the simulator.
//!
//! Serves `GET /get-temperature` and `GET /get-location`. Every request
//! advances an internal random walk, so consecutive reads differ the way a
//! real sensor feed would.

use axum::{extract::State, response::Json, routing::get, Router};
use rand::Rng;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Temperature step bound per request (degrees Celsius)
const TEMPERATURE_STEP: f64 = 0.5;

/// Location step bound per request (degrees)
const LOCATION_STEP: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedValues {
    pub temperature: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for FeedValues {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            latitude: 48.131,
            longitude: 11.459,
        }
    }
}

/// Shared feed state
pub struct FeedState {
    values: Mutex<FeedValues>,
    /// Disable to serve fixed values (tests)
    walk: bool,
}

impl FeedState {
    pub fn new(initial: FeedValues) -> Self {
        Self {
            values: Mutex::new(initial),
            walk: true,
        }
    }

    /// Feed that always serves `values` unchanged.
    pub fn fixed(values: FeedValues) -> Self {
        Self {
            values: Mutex::new(values),
            walk: false,
        }
    }

    /// Advance the walk (if enabled) and return the new values.
    fn next(&self) -> FeedValues {
        let mut values = match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.walk {
            let mut rng = rand::thread_rng();
            values.temperature += rng.gen_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
            let d_lat = rng.gen_range(-LOCATION_STEP..=LOCATION_STEP);
            values.latitude = (values.latitude + d_lat).clamp(-90.0, 90.0);
            values.longitude += rng.gen_range(-LOCATION_STEP..=LOCATION_STEP);
        }
        *values
    }
}

#[derive(Serialize)]
pub struct TemperatureResponse {
    pub temperature: f64,
}

#[derive(Serialize)]
pub struct LocationResponse {
    pub latitude: f64,
    pub longitude: f64,
}

/// Create telemetry feed router
pub fn create_router(state: Arc<FeedState>) -> Router {
    Router::new()
        .route("/get-temperature", get(get_temperature))
        .route("/get-location", get(get_location))
        .with_state(state)
}

/// GET /get-temperature
async fn get_temperature(State(state): State<Arc<FeedState>>) -> Json<TemperatureResponse> {
    let values = state.next();
    debug!(temperature = values.temperature, "Serving temperature");
    Json(TemperatureResponse {
        temperature: values.temperature,
    })
}

/// GET /get-location
async fn get_location(State(state): State<Arc<FeedState>>) -> Json<LocationResponse> {
    let values = state.next();
    debug!(
        latitude = values.latitude,
        longitude = values.longitude,
        "Serving location"
    );
    Json(LocationResponse {
        latitude: values.latitude,
        longitude: values.longitude,
    })
}
