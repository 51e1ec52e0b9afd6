//! Device object (3).
//!
//! Mostly static identity strings. Battery and memory resources are computed
//! at read time; the current-time resource is refreshed by a clock sampler
//! that reports a change on every tick.

use crate::config::DeviceConfig;
use crate::model::{object_model, ModelError, ObjectModel, DEVICE};
use crate::notify::Notifier;
use crate::resource::{
    ObjectEnabler, ObjectId, ResourceError, ResourceId, ResourceStore, ResourceValue,
};
use crate::sampler::Sampled;
use async_trait::async_trait;
use chrono::{Local, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MANUFACTURER: ResourceId = 0;
pub const MODEL_NUMBER: ResourceId = 1;
pub const SERIAL_NUMBER: ResourceId = 2;
pub const FIRMWARE_VERSION: ResourceId = 3;
pub const REBOOT: ResourceId = 4;
pub const FACTORY_RESET: ResourceId = 5;
pub const BATTERY_LEVEL: ResourceId = 9;
pub const MEMORY_FREE: ResourceId = 10;
pub const ERROR_CODE: ResourceId = 11;
pub const RESET_ERROR_CODE: ResourceId = 12;
pub const CURRENT_TIME: ResourceId = 13;
pub const UTC_OFFSET: ResourceId = 14;
pub const TIMEZONE: ResourceId = 15;
pub const SUPPORTED_BINDING: ResourceId = 16;
pub const DEVICE_TYPE: ResourceId = 17;
pub const HARDWARE_VERSION: ResourceId = 18;
pub const SOFTWARE_VERSION: ResourceId = 19;
pub const BATTERY_STATUS: ResourceId = 20;
pub const MEMORY_TOTAL: ResourceId = 21;

const SUPPORTED_RESOURCES: [ResourceId; 19] = [
    MANUFACTURER,
    MODEL_NUMBER,
    SERIAL_NUMBER,
    FIRMWARE_VERSION,
    REBOOT,
    FACTORY_RESET,
    BATTERY_LEVEL,
    MEMORY_FREE,
    ERROR_CODE,
    RESET_ERROR_CODE,
    CURRENT_TIME,
    UTC_OFFSET,
    TIMEZONE,
    SUPPORTED_BINDING,
    DEVICE_TYPE,
    HARDWARE_VERSION,
    SOFTWARE_VERSION,
    BATTERY_STATUS,
    MEMORY_TOTAL,
];

/// Current time is declared RW in the model but not writable here.
const WRITABLE_RESOURCES: [ResourceId; 2] = [UTC_OFFSET, TIMEZONE];

const NO_ERROR: i64 = 0;

struct DeviceState {
    store: ResourceStore,
}

pub struct Device {
    model: &'static ObjectModel,
    state: Mutex<DeviceState>,
    notifier: Notifier,
    clock_period: Duration,
    default_utc_offset: String,
    default_timezone: String,
}

impl Device {
    pub fn new(config: &DeviceConfig, notifier: Notifier) -> Result<Self, ModelError> {
        let model = object_model(DEVICE).ok_or(ModelError::UnknownObject(DEVICE))?;
        model.validate_supported(&SUPPORTED_RESOURCES)?;

        let default_utc_offset = host_utc_offset();
        let default_timezone = host_timezone();

        let text = |s: &str| ResourceValue::String(s.to_string());
        let store = ResourceStore::new(DEVICE)
            .with(MANUFACTURER, text(&config.manufacturer))
            .with(MODEL_NUMBER, text(&config.model_number))
            .with(SERIAL_NUMBER, text(&config.serial_number))
            .with(FIRMWARE_VERSION, text(&config.firmware_version))
            .with(ERROR_CODE, ResourceValue::IntegerMap(no_error_codes()))
            .with(CURRENT_TIME, ResourceValue::Time(Utc::now()))
            .with(UTC_OFFSET, text(&default_utc_offset))
            .with(TIMEZONE, text(&default_timezone))
            .with(SUPPORTED_BINDING, text("U"))
            .with(DEVICE_TYPE, text(&config.device_type))
            .with(HARDWARE_VERSION, text(&config.hardware_version))
            .with(SOFTWARE_VERSION, text(&config.software_version));

        Ok(Self {
            model,
            state: Mutex::new(DeviceState { store }),
            notifier,
            clock_period: Duration::from_secs(config.clock_period_secs),
            default_utc_offset,
            default_timezone,
        })
    }

    fn factory_reset(&self) {
        let mut state = self.state.lock();
        let restore = [
            (UTC_OFFSET, ResourceValue::String(self.default_utc_offset.clone())),
            (TIMEZONE, ResourceValue::String(self.default_timezone.clone())),
        ];
        for (resource_id, value) in restore {
            if let Err(e) = state.store.set(resource_id, value) {
                warn!(error = %e, "Failed to restore device resource");
            }
        }
        self.notifier.fire([UTC_OFFSET, TIMEZONE]);
    }

    fn reset_error_code(&self) {
        let mut state = self.state.lock();
        match state
            .store
            .set(ERROR_CODE, ResourceValue::IntegerMap(no_error_codes()))
        {
            Ok(true) => {
                self.notifier.fire([ERROR_CODE]);
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to reset error code"),
        }
    }
}

fn no_error_codes() -> BTreeMap<u16, i64> {
    BTreeMap::from([(0, NO_ERROR)])
}

/// Host UTC offset in ISO 8601 short form: `Z`, `+02`, `-0330`.
pub fn host_utc_offset() -> String {
    format_utc_offset(Local::now().offset().local_minus_utc())
}

pub(crate) fn format_utc_offset(seconds: i32) -> String {
    if seconds == 0 {
        return "Z".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if minutes == 0 {
        format!("{}{:02}", sign, hours)
    } else {
        format!("{}{:02}{:02}", sign, hours, minutes)
    }
}

fn host_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|e| {
        debug!(error = %e, "Host timezone unavailable, defaulting to UTC");
        "UTC".to_string()
    })
}

/// (MemAvailable, MemTotal) in KiB from `/proc/meminfo`; zeros elsewhere.
fn host_memory_kib() -> (i64, i64) {
    let meminfo = match std::fs::read_to_string("/proc/meminfo") {
        Ok(s) => s,
        Err(_) => return (0, 0),
    };
    parse_meminfo(&meminfo)
}

pub(crate) fn parse_meminfo(meminfo: &str) -> (i64, i64) {
    let field = |name: &str| {
        meminfo
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };
    (field("MemAvailable:"), field("MemTotal:"))
}

impl ObjectEnabler for Device {
    fn object_id(&self) -> ObjectId {
        DEVICE
    }

    fn read(&self, resource_id: ResourceId) -> Result<ResourceValue, ResourceError> {
        info!(object_id = DEVICE, resource_id, "Read on device resource");
        if !self.supports(resource_id) {
            return Err(ResourceError::not_found(DEVICE, resource_id));
        }

        // Live values are computed at call time and never stored
        let value = match resource_id {
            BATTERY_LEVEL => ResourceValue::Integer(rand::thread_rng().gen_range(0..=100)),
            BATTERY_STATUS => ResourceValue::Integer(rand::thread_rng().gen_range(0..=6)),
            MEMORY_FREE => ResourceValue::Integer(host_memory_kib().0),
            MEMORY_TOTAL => ResourceValue::Integer(host_memory_kib().1),
            CURRENT_TIME => ResourceValue::Time(Utc::now()),
            _ => self
                .state
                .lock()
                .store
                .get(resource_id)
                .cloned()
                .ok_or_else(|| ResourceError::not_found(DEVICE, resource_id))?,
        };
        Ok(value)
    }

    fn write(&self, resource_id: ResourceId, value: ResourceValue) -> Result<(), ResourceError> {
        info!(object_id = DEVICE, resource_id, value = %value, "Write on device resource");
        if !WRITABLE_RESOURCES.contains(&resource_id) {
            return Err(ResourceError::not_found(DEVICE, resource_id));
        }
        self.model.check_write(resource_id, &value)?;

        let mut state = self.state.lock();
        state.store.set(resource_id, value)?;
        self.notifier.fire([resource_id]);
        Ok(())
    }

    fn execute(&self, resource_id: ResourceId, args: Option<&str>) -> Result<(), ResourceError> {
        info!(
            object_id = DEVICE,
            resource_id,
            args = args.unwrap_or(""),
            "Execute on device resource"
        );
        match resource_id {
            REBOOT => {
                info!("Reboot requested (simulated)");
                Ok(())
            }
            FACTORY_RESET => {
                self.factory_reset();
                Ok(())
            }
            RESET_ERROR_CODE => {
                self.reset_error_code();
                Ok(())
            }
            _ => Err(ResourceError::not_found(DEVICE, resource_id)),
        }
    }

    fn supported_resource_ids(&self) -> &[ResourceId] {
        &SUPPORTED_RESOURCES
    }
}

#[async_trait]
impl Sampled for Device {
    fn sampler_name(&self) -> &str {
        "device-clock"
    }

    fn period(&self) -> Duration {
        self.clock_period
    }

    async fn sample(&self) {
        let mut state = self.state.lock();
        if let Err(e) = state.store.set(CURRENT_TIME, ResourceValue::Time(Utc::now())) {
            warn!(error = %e, "Failed to store current time");
        }
        // The clock always advances, so every tick is a change
        self.notifier.fire([CURRENT_TIME]);
        debug!("Device clock tick");
    }
}
