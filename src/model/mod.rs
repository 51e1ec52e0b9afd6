//! Built-in object model.
//!
//! Declares, per object type, every resource's type and access mode. Enablers
//! validate their supported resource ids against this table at construction
//! and type-check writes through it.

use crate::resource::{ObjectId, ResourceError, ResourceId, ResourceValue, ValueKind};
use std::fmt;

pub const DEVICE: ObjectId = 3;
pub const LOCATION: ObjectId = 6;
pub const TEMPERATURE_SENSOR: ObjectId = 3303;

/// Operations a resource accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operations {
    Read,
    Write,
    ReadWrite,
    Execute,
}

impl Operations {
    pub fn readable(self) -> bool {
        matches!(self, Operations::Read | Operations::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Operations::Write | Operations::ReadWrite)
    }

    pub fn executable(self) -> bool {
        matches!(self, Operations::Execute)
    }
}

/// Declaration of a single resource.
#[derive(Clone, Copy, Debug)]
pub struct ResourceModel {
    pub id: ResourceId,
    pub name: &'static str,
    pub operations: Operations,
    /// Value type; `None` for executable resources
    pub kind: Option<ValueKind>,
}

/// Declaration of an object type.
#[derive(Debug)]
pub struct ObjectModel {
    pub id: ObjectId,
    pub name: &'static str,
    pub resources: &'static [ResourceModel],
}

const fn res(
    id: ResourceId,
    name: &'static str,
    operations: Operations,
    kind: Option<ValueKind>,
) -> ResourceModel {
    ResourceModel {
        id,
        name,
        operations,
        kind,
    }
}

use Operations::{Execute as E, Read as R, ReadWrite as RW};

static DEVICE_MODEL: ObjectModel = ObjectModel {
    id: DEVICE,
    name: "Device",
    resources: &[
        res(0, "Manufacturer", R, Some(ValueKind::String)),
        res(1, "Model Number", R, Some(ValueKind::String)),
        res(2, "Serial Number", R, Some(ValueKind::String)),
        res(3, "Firmware Version", R, Some(ValueKind::String)),
        res(4, "Reboot", E, None),
        res(5, "Factory Reset", E, None),
        res(9, "Battery Level", R, Some(ValueKind::Integer)),
        res(10, "Memory Free", R, Some(ValueKind::Integer)),
        res(11, "Error Code", R, Some(ValueKind::IntegerMap)),
        res(12, "Reset Error Code", E, None),
        res(13, "Current Time", RW, Some(ValueKind::Time)),
        res(14, "UTC Offset", RW, Some(ValueKind::String)),
        res(15, "Timezone", RW, Some(ValueKind::String)),
        res(16, "Supported Binding and Modes", R, Some(ValueKind::String)),
        res(17, "Device Type", R, Some(ValueKind::String)),
        res(18, "Hardware Version", R, Some(ValueKind::String)),
        res(19, "Software Version", R, Some(ValueKind::String)),
        res(20, "Battery Status", R, Some(ValueKind::Integer)),
        res(21, "Memory Total", R, Some(ValueKind::Integer)),
    ],
};

static LOCATION_MODEL: ObjectModel = ObjectModel {
    id: LOCATION,
    name: "Location",
    resources: &[
        res(0, "Latitude", R, Some(ValueKind::Float)),
        res(1, "Longitude", R, Some(ValueKind::Float)),
        res(2, "Altitude", R, Some(ValueKind::Float)),
        res(3, "Radius", R, Some(ValueKind::Float)),
        res(5, "Timestamp", R, Some(ValueKind::Time)),
        res(6, "Speed", R, Some(ValueKind::Float)),
    ],
};

static TEMPERATURE_MODEL: ObjectModel = ObjectModel {
    id: TEMPERATURE_SENSOR,
    name: "Temperature",
    resources: &[
        res(5601, "Min Measured Value", R, Some(ValueKind::Float)),
        res(5602, "Max Measured Value", R, Some(ValueKind::Float)),
        res(5603, "Min Range Value", R, Some(ValueKind::Float)),
        res(5604, "Max Range Value", R, Some(ValueKind::Float)),
        res(5605, "Reset Min and Max Measured Values", E, None),
        res(5700, "Sensor Value", R, Some(ValueKind::Float)),
        res(5701, "Sensor Units", R, Some(ValueKind::String)),
    ],
};

/// Look up the model of an object type.
pub fn object_model(object_id: ObjectId) -> Option<&'static ObjectModel> {
    match object_id {
        DEVICE => Some(&DEVICE_MODEL),
        LOCATION => Some(&LOCATION_MODEL),
        TEMPERATURE_SENSOR => Some(&TEMPERATURE_MODEL),
        _ => None,
    }
}

impl ObjectModel {
    pub fn resource(&self, resource_id: ResourceId) -> Option<&ResourceModel> {
        self.resources.iter().find(|r| r.id == resource_id)
    }

    /// Checks that every id an enabler claims to support is declared here.
    pub fn validate_supported(&self, supported: &[ResourceId]) -> Result<(), ModelError> {
        for id in supported {
            if self.resource(*id).is_none() {
                return Err(ModelError::UndeclaredResource {
                    object_id: self.id,
                    resource_id: *id,
                });
            }
        }
        Ok(())
    }

    /// Type-check a write.
    ///
    /// Unknown or non-writable resources are `NotFound`; a value of the wrong
    /// type is `Rejected`.
    pub fn check_write(
        &self,
        resource_id: ResourceId,
        value: &ResourceValue,
    ) -> Result<(), ResourceError> {
        let resource = self
            .resource(resource_id)
            .filter(|r| r.operations.writable())
            .ok_or_else(|| ResourceError::not_found(self.id, resource_id))?;

        match resource.kind {
            Some(kind) if kind == value.kind() => Ok(()),
            Some(kind) => Err(ResourceError::rejected(
                self.id,
                resource_id,
                format!("{} expects {}, got {}", resource.name, kind, value.kind()),
            )),
            None => Err(ResourceError::not_found(self.id, resource_id)),
        }
    }
}

/// Mismatch between an enabler and the object model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    UnknownObject(ObjectId),
    UndeclaredResource {
        object_id: ObjectId,
        resource_id: ResourceId,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownObject(id) => write!(f, "no model for object {}", id),
            ModelError::UndeclaredResource {
                object_id,
                resource_id,
            } => write!(
                f,
                "resource {} is not declared in the model of object {}",
                resource_id, object_id
            ),
        }
    }
}

impl std::error::Error for ModelError {}
