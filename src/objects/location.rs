//! Location object (6).

use crate::model::{object_model, ModelError, ObjectModel, LOCATION};
use crate::notify::Notifier;
use crate::resource::{
    ObjectEnabler, ObjectId, ResourceError, ResourceId, ResourceStore, ResourceValue,
};
use crate::sampler::Sampled;
use crate::telemetry::{number_field, TelemetrySource, LOCATION_PATH};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const LATITUDE: ResourceId = 0;
pub const LONGITUDE: ResourceId = 1;
pub const TIMESTAMP: ResourceId = 5;

const SUPPORTED_RESOURCES: [ResourceId; 3] = [LATITUDE, LONGITUDE, TIMESTAMP];

/// Position and the time it was last changed, read atomically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Manual move direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Map a `w`/`a`/`s`/`d` key to a direction.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'w' => Some(Direction::North),
            's' => Some(Direction::South),
            'd' => Some(Direction::East),
            'a' => Some(Direction::West),
            _ => None,
        }
    }

    /// Unit (latitude, longitude) offset.
    fn offset(self) -> (f64, f64) {
        match self {
            Direction::North => (1.0, 0.0),
            Direction::South => (-1.0, 0.0),
            Direction::East => (0.0, 1.0),
            Direction::West => (0.0, -1.0),
        }
    }
}

struct LocationState {
    store: ResourceStore,
    position: Position,
}

pub struct Location {
    model: &'static ObjectModel,
    state: Mutex<LocationState>,
    notifier: Notifier,
    source: Option<Arc<dyn TelemetrySource>>,
    scale_factor: f64,
    period: Duration,
}

impl Location {
    pub fn new(
        latitude: f64,
        longitude: f64,
        scale_factor: f64,
        period: Duration,
        notifier: Notifier,
        source: Option<Arc<dyn TelemetrySource>>,
    ) -> Result<Self, ModelError> {
        let model = object_model(LOCATION).ok_or(ModelError::UnknownObject(LOCATION))?;
        model.validate_supported(&SUPPORTED_RESOURCES)?;

        let position = Position {
            latitude,
            longitude,
            timestamp: Utc::now(),
        };
        let store = ResourceStore::new(LOCATION)
            .with(LATITUDE, ResourceValue::Float(latitude))
            .with(LONGITUDE, ResourceValue::Float(longitude))
            .with(TIMESTAMP, ResourceValue::Time(position.timestamp));

        Ok(Self {
            model,
            state: Mutex::new(LocationState { store, position }),
            notifier,
            source,
            scale_factor,
            period,
        })
    }

    pub fn position(&self) -> Position {
        self.state.lock().position
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Apply a new position and return the resource ids that changed.
    ///
    /// Each coordinate is compared with exact equality against the stored
    /// one. Any change refreshes the timestamp and emits one notification.
    pub fn apply(&self, latitude: f64, longitude: f64) -> BTreeSet<ResourceId> {
        let mut state = self.state.lock();
        self.apply_locked(&mut state, latitude, longitude)
    }

    /// Shift the position one step, scaled by the scale factor.
    pub fn move_towards(&self, direction: Direction) -> BTreeSet<ResourceId> {
        let (d_lat, d_lon) = direction.offset();
        self.shift(d_lat, d_lon)
    }

    fn shift(&self, d_lat: f64, d_lon: f64) -> BTreeSet<ResourceId> {
        let mut state = self.state.lock();
        let latitude = clamp_latitude(state.position.latitude + d_lat * self.scale_factor);
        let longitude = wrap_longitude(state.position.longitude + d_lon * self.scale_factor);
        self.apply_locked(&mut state, latitude, longitude)
    }

    fn apply_locked(
        &self,
        state: &mut LocationState,
        latitude: f64,
        longitude: f64,
    ) -> BTreeSet<ResourceId> {
        let mut changed = BTreeSet::new();

        if latitude != state.position.latitude {
            state.position.latitude = latitude;
            changed.extend([LATITUDE, TIMESTAMP]);
        }
        if longitude != state.position.longitude {
            state.position.longitude = longitude;
            changed.extend([LONGITUDE, TIMESTAMP]);
        }
        if changed.is_empty() {
            return changed;
        }

        state.position.timestamp = Utc::now();
        let position = state.position;
        let values = [
            (LATITUDE, ResourceValue::Float(position.latitude)),
            (LONGITUDE, ResourceValue::Float(position.longitude)),
            (TIMESTAMP, ResourceValue::Time(position.timestamp)),
        ];
        for (resource_id, value) in values {
            if let Err(e) = state.store.set(resource_id, value) {
                warn!(error = %e, "Failed to store location value");
            }
        }

        self.notifier.fire(changed.iter().copied());
        changed
    }

    async fn fetch_position(source: &dyn TelemetrySource) -> Result<(f64, f64)> {
        let payload = source.fetch(LOCATION_PATH).await?;
        let latitude = number_field(&payload, "latitude")?;
        let longitude = number_field(&payload, "longitude")?;
        Ok((latitude, longitude))
    }
}

fn clamp_latitude(latitude: f64) -> f64 {
    latitude.clamp(-90.0, 90.0)
}

/// Wrap into [-180, 180) for any step size.
fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

/// One random-walk step per axis: -1, 0 or +1.
fn random_step() -> (f64, f64) {
    let mut rng = rand::thread_rng();
    let d_lat: i32 = rng.gen_range(-1..=1);
    let d_lon: i32 = rng.gen_range(-1..=1);
    (f64::from(d_lat), f64::from(d_lon))
}

impl ObjectEnabler for Location {
    fn object_id(&self) -> ObjectId {
        LOCATION
    }

    fn read(&self, resource_id: ResourceId) -> Result<ResourceValue, ResourceError> {
        info!(object_id = LOCATION, resource_id, "Read on location resource");
        if !self.supports(resource_id) {
            return Err(ResourceError::not_found(LOCATION, resource_id));
        }

        let state = self.state.lock();
        state
            .store
            .get(resource_id)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(LOCATION, resource_id))
    }

    fn write(&self, resource_id: ResourceId, value: ResourceValue) -> Result<(), ResourceError> {
        info!(object_id = LOCATION, resource_id, value = %value, "Write on location resource");
        self.model.check_write(resource_id, &value)?;
        Err(ResourceError::not_found(LOCATION, resource_id))
    }

    fn execute(&self, resource_id: ResourceId, _args: Option<&str>) -> Result<(), ResourceError> {
        info!(object_id = LOCATION, resource_id, "Execute on location resource");
        Err(ResourceError::not_found(LOCATION, resource_id))
    }

    fn supported_resource_ids(&self) -> &[ResourceId] {
        &SUPPORTED_RESOURCES
    }
}

#[async_trait]
impl Sampled for Location {
    fn sampler_name(&self) -> &str {
        "location"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn sample(&self) {
        let changed = match &self.source {
            Some(source) => match Self::fetch_position(source.as_ref()).await {
                Ok((latitude, longitude)) => self.apply(latitude, longitude),
                Err(e) => {
                    warn!(error = %e, "Location telemetry unavailable, skipping tick");
                    return;
                }
            },
            None => {
                let (d_lat, d_lon) = random_step();
                self.shift(d_lat, d_lon)
            }
        };
        debug!(changed = ?changed, "Location tick");
    }
}
