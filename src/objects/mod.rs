//! Simulated objects and the registry that dispatches to them.
//!
//! The concrete enabler for each object type is selected by object id at
//! construction time. The registry owns every enabler plus the sampler tasks
//! bound to them, and cancels all samplers together on shutdown.

pub mod device;
pub mod location;
pub mod temperature;

pub use device::Device;
pub use location::{Direction, Location, Position};
pub use temperature::{TemperatureReading, TemperatureSample, TemperatureSensor};

use crate::config::SimConfig;
use crate::model::{DEVICE, LOCATION, TEMPERATURE_SENSOR};
use crate::notify::NotificationHub;
use crate::resource::{
    InstanceId, ObjectEnabler, ObjectId, ResourceError, ResourceId, ResourceValue,
};
use crate::sampler::{cancel_all, spawn_sampler, Sampled, SamplerHandle};
use crate::telemetry::TelemetrySource;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::info;


/// Simulated object types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Device,
    Location,
    TemperatureSensor,
}

impl ObjectKind {
    pub fn from_id(object_id: ObjectId) -> Option<Self> {
        match object_id {
            DEVICE => Some(ObjectKind::Device),
            LOCATION => Some(ObjectKind::Location),
            TEMPERATURE_SENSOR => Some(ObjectKind::TemperatureSensor),
            _ => None,
        }
    }

    pub fn id(self) -> ObjectId {
        match self {
            ObjectKind::Device => DEVICE,
            ObjectKind::Location => LOCATION,
            ObjectKind::TemperatureSensor => TEMPERATURE_SENSOR,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Device => write!(f, "device"),
            ObjectKind::Location => write!(f, "location"),
            ObjectKind::TemperatureSensor => write!(f, "temperature"),
        }
    }
}

/// Addressable set of object instances and their sampler tasks.
pub struct ObjectRegistry {
    enablers: BTreeMap<ObjectId, Arc<dyn ObjectEnabler>>,
    samplers: Vec<SamplerHandle>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            enablers: BTreeMap::new(),
            samplers: Vec::new(),
        }
    }

    /// Register an object without background sampling.
    pub fn insert(&mut self, enabler: Arc<dyn ObjectEnabler>) {
        info!(object_id = enabler.object_id(), "Registered object");
        self.enablers.insert(enabler.object_id(), enabler);
    }

    /// Register an object and start its sampler.
    ///
    /// Must be called from within a tokio runtime. The sampler task only
    /// holds a weak reference to the object.
    pub fn insert_sampled<T>(&mut self, object: Arc<T>)
    where
        T: ObjectEnabler + Sampled + 'static,
    {
        let weak = Arc::downgrade(&object);
        let weak: Weak<dyn Sampled> = weak;
        let handle = spawn_sampler(weak, object.sampler_name().to_string(), object.period());
        self.samplers.push(handle);
        self.insert(object);
    }

    pub fn get(&self, object_id: ObjectId) -> Option<&Arc<dyn ObjectEnabler>> {
        self.enablers.get(&object_id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.enablers.keys().copied().collect()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    fn instance(
        &self,
        object_id: ObjectId,
        instance_id: InstanceId,
        resource_id: ResourceId,
    ) -> Result<&Arc<dyn ObjectEnabler>, ResourceError> {
        self.enablers
            .get(&object_id)
            .filter(|e| e.instance_id() == instance_id)
            .ok_or_else(|| ResourceError::not_found(object_id, resource_id))
    }

    pub fn read(
        &self,
        object_id: ObjectId,
        instance_id: InstanceId,
        resource_id: ResourceId,
    ) -> Result<ResourceValue, ResourceError> {
        self.instance(object_id, instance_id, resource_id)?
            .read(resource_id)
    }

    pub fn write(
        &self,
        object_id: ObjectId,
        instance_id: InstanceId,
        resource_id: ResourceId,
        value: ResourceValue,
    ) -> Result<(), ResourceError> {
        self.instance(object_id, instance_id, resource_id)?
            .write(resource_id, value)
    }

    pub fn execute(
        &self,
        object_id: ObjectId,
        instance_id: InstanceId,
        resource_id: ResourceId,
        args: Option<&str>,
    ) -> Result<(), ResourceError> {
        self.instance(object_id, instance_id, resource_id)?
            .execute(resource_id, args)
    }

    /// Cancel every sampler and wait for them to stop.
    pub async fn shutdown(&mut self) {
        info!("Shutting down object registry");
        cancel_all(self.samplers.drain(..).collect()).await;
        info!("All samplers stopped");
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectRegistry {
    fn drop(&mut self) {
        // Best-effort abort when shutdown() was not awaited
        for handle in self.samplers.drain(..) {
            handle.abort();
        }
    }
}

/// Registry plus typed handles the binary needs beyond dispatch.
pub struct SimulatedObjects {
    pub registry: ObjectRegistry,
    pub location: Option<Arc<Location>>,
    pub temperature: Option<Arc<TemperatureSensor>>,
}

/// Instantiate every enabled object type and start its sampler.
pub fn build_objects(
    config: &SimConfig,
    hub: &NotificationHub,
    telemetry: Option<Arc<dyn TelemetrySource>>,
) -> Result<SimulatedObjects> {
    let mut registry = ObjectRegistry::new();
    let mut location = None;
    let mut temperature = None;

    for &object_id in &config.objects.enabled {
        let kind = ObjectKind::from_id(object_id)
            .with_context(|| format!("Object {} is not simulated", object_id))?;
        let notifier = hub.notifier(kind.id(), 0);

        match kind {
            ObjectKind::Device => {
                let device = Device::new(&config.device, notifier)
                    .context("Failed to create device object")?;
                registry.insert_sampled(Arc::new(device));
            }
            ObjectKind::Location => {
                let (latitude, longitude) = config.location.initial_position()?;
                let object = Arc::new(
                    Location::new(
                        latitude,
                        longitude,
                        config.location.scale_factor,
                        Duration::from_secs(config.location.period_secs),
                        notifier,
                        telemetry.clone(),
                    )
                    .context("Failed to create location object")?,
                );
                registry.insert_sampled(Arc::clone(&object));
                location = Some(object);
            }
            ObjectKind::TemperatureSensor => {
                let object = Arc::new(
                    TemperatureSensor::new(
                        config.temperature.initial,
                        Duration::from_secs(config.temperature.period_secs),
                        notifier,
                        telemetry.clone(),
                    )
                    .context("Failed to create temperature object")?,
                );
                registry.insert_sampled(Arc::clone(&object));
                temperature = Some(object);
            }
        }
        info!(object_id, kind = %kind, "Object created");
    }

    Ok(SimulatedObjects {
        registry,
        location,
        temperature,
    })
}
