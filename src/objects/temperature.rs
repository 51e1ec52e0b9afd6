//! Temperature sensor object (3303).
//!
//! The current reading drifts by a bounded random step each tick, or follows
//! the telemetry source when one is configured. Running min/max track the
//! extremes since the last reset.

use crate::model::{object_model, ModelError, ObjectModel, TEMPERATURE_SENSOR};
use crate::notify::Notifier;
use crate::resource::{
    ObjectEnabler, ObjectId, ResourceError, ResourceId, ResourceStore, ResourceValue,
};
use crate::sampler::Sampled;
use crate::telemetry::{number_field, TelemetrySource, TEMPERATURE_PATH};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MIN_MEASURED_VALUE: ResourceId = 5601;
pub const MAX_MEASURED_VALUE: ResourceId = 5602;
pub const RESET_MIN_MAX_MEASURED_VALUES: ResourceId = 5605;
pub const SENSOR_VALUE: ResourceId = 5700;
pub const UNITS: ResourceId = 5701;

pub const UNIT_CELSIUS: &str = "cel";

const SUPPORTED_RESOURCES: [ResourceId; 5] = [
    SENSOR_VALUE,
    UNITS,
    MAX_MEASURED_VALUE,
    MIN_MEASURED_VALUE,
    RESET_MIN_MAX_MEASURED_VALUES,
];

/// Consistent view of the sensor's numeric state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureReading {
    pub current: f64,
    pub min: f64,
    pub max: f64,
}

/// Input to one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TemperatureSample {
    /// Perturbation added to the current reading
    Delta(f64),
    /// Absolute reading from the telemetry source
    Absolute(f64),
}

struct SensorState {
    store: ResourceStore,
    reading: TemperatureReading,
}

impl SensorState {
    /// Mirror the numeric state into the resource store.
    fn sync_store(&mut self) {
        let values = [
            (SENSOR_VALUE, self.reading.current),
            (MIN_MEASURED_VALUE, self.reading.min),
            (MAX_MEASURED_VALUE, self.reading.max),
        ];
        for (resource_id, value) in values {
            if let Err(e) = self.store.set(resource_id, ResourceValue::Float(value)) {
                warn!(error = %e, "Failed to store temperature value");
            }
        }
    }
}

pub struct TemperatureSensor {
    model: &'static ObjectModel,
    state: Mutex<SensorState>,
    notifier: Notifier,
    source: Option<Arc<dyn TelemetrySource>>,
    period: Duration,
}

impl TemperatureSensor {
    /// Creates the sensor with min = max = current = `initial`.
    pub fn new(
        initial: f64,
        period: Duration,
        notifier: Notifier,
        source: Option<Arc<dyn TelemetrySource>>,
    ) -> Result<Self, ModelError> {
        let model =
            object_model(TEMPERATURE_SENSOR).ok_or(ModelError::UnknownObject(TEMPERATURE_SENSOR))?;
        model.validate_supported(&SUPPORTED_RESOURCES)?;

        let initial = round_two_digits(initial);
        let reading = TemperatureReading {
            current: initial,
            min: initial,
            max: initial,
        };
        let store = ResourceStore::new(TEMPERATURE_SENSOR)
            .with(SENSOR_VALUE, ResourceValue::Float(initial))
            .with(MIN_MEASURED_VALUE, ResourceValue::Float(initial))
            .with(MAX_MEASURED_VALUE, ResourceValue::Float(initial))
            .with(UNITS, ResourceValue::String(UNIT_CELSIUS.to_string()));

        Ok(Self {
            model,
            state: Mutex::new(SensorState { store, reading }),
            notifier,
            source,
            period,
        })
    }

    /// Current, min and max read under a single lock acquisition.
    pub fn reading(&self) -> TemperatureReading {
        self.state.lock().reading
    }

    /// Apply one tick and return the resource ids that changed.
    ///
    /// An unchanged reading (exact float equality) changes nothing and emits
    /// nothing. Otherwise the current value is always reported, plus at most
    /// one extremum: the maximum is checked first, then the minimum.
    pub fn apply(&self, sample: TemperatureSample) -> BTreeSet<ResourceId> {
        let mut state = self.state.lock();

        let next = round_two_digits(match sample {
            TemperatureSample::Delta(delta) => state.reading.current + delta,
            TemperatureSample::Absolute(value) => value,
        });

        let mut changed = BTreeSet::new();
        if next == state.reading.current {
            return changed;
        }

        state.reading.current = next;
        changed.insert(SENSOR_VALUE);

        if next > state.reading.max {
            state.reading.max = next;
            changed.insert(MAX_MEASURED_VALUE);
        } else if next < state.reading.min {
            state.reading.min = next;
            changed.insert(MIN_MEASURED_VALUE);
        }

        state.sync_store();
        self.notifier.fire(changed.iter().copied());
        changed
    }

    fn reset_min_max(&self) {
        let mut state = self.state.lock();
        state.reading.min = state.reading.current;
        state.reading.max = state.reading.current;
        state.sync_store();
    }
}

/// Round half-up to two decimal places.
///
/// Rounds the shortest decimal form of `value`, so 1.005 becomes 1.01 even
/// though its binary value sits just below the midpoint.
pub fn round_two_digits(value: f64) -> f64 {
    match Decimal::from_str(&value.to_string()) {
        Ok(decimal) => {
            let rounded = decimal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            rounded.mantissa() as f64 / 10f64.powi(rounded.scale() as i32)
        }
        // Non-finite or beyond decimal range
        Err(_) => (value * 100.0).round() / 100.0,
    }
}

/// Random drift in [-1.0, 1.0] with 0.1 resolution.
fn random_delta() -> f64 {
    let steps: i32 = rand::thread_rng().gen_range(-10..=10);
    f64::from(steps) / 10.0
}

impl ObjectEnabler for TemperatureSensor {
    fn object_id(&self) -> ObjectId {
        TEMPERATURE_SENSOR
    }

    fn read(&self, resource_id: ResourceId) -> Result<ResourceValue, ResourceError> {
        info!(object_id = TEMPERATURE_SENSOR, resource_id, "Read on temperature resource");
        if !self.supports(resource_id) {
            return Err(ResourceError::not_found(TEMPERATURE_SENSOR, resource_id));
        }

        let state = self.state.lock();
        state
            .store
            .get(resource_id)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(TEMPERATURE_SENSOR, resource_id))
    }

    fn write(&self, resource_id: ResourceId, value: ResourceValue) -> Result<(), ResourceError> {
        info!(
            object_id = TEMPERATURE_SENSOR,
            resource_id,
            value = %value,
            "Write on temperature resource"
        );
        self.model.check_write(resource_id, &value)?;
        // Every declared temperature resource is read-only or executable
        Err(ResourceError::not_found(TEMPERATURE_SENSOR, resource_id))
    }

    fn execute(&self, resource_id: ResourceId, args: Option<&str>) -> Result<(), ResourceError> {
        info!(
            object_id = TEMPERATURE_SENSOR,
            resource_id,
            args = args.unwrap_or(""),
            "Execute on temperature resource"
        );
        match resource_id {
            RESET_MIN_MAX_MEASURED_VALUES => {
                self.reset_min_max();
                Ok(())
            }
            _ => Err(ResourceError::not_found(TEMPERATURE_SENSOR, resource_id)),
        }
    }

    fn supported_resource_ids(&self) -> &[ResourceId] {
        &SUPPORTED_RESOURCES
    }
}

#[async_trait]
impl Sampled for TemperatureSensor {
    fn sampler_name(&self) -> &str {
        "temperature"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn sample(&self) {
        let sample = match &self.source {
            Some(source) => {
                let reading = source
                    .fetch(TEMPERATURE_PATH)
                    .await
                    .and_then(|payload| number_field(&payload, "temperature"));
                match reading {
                    Ok(value) => TemperatureSample::Absolute(value),
                    Err(e) => {
                        warn!(error = %e, "Temperature telemetry unavailable, skipping tick");
                        return;
                    }
                }
            }
            None => TemperatureSample::Delta(random_delta()),
        };

        let changed = self.apply(sample);
        debug!(changed = ?changed, "Temperature tick");
    }
}
