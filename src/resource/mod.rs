// Resource values, the per-instance store and the enabler dispatch contract

mod store;

pub use store::ResourceStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;


/// Object type identifier (3 = device, 6 = location, 3303 = temperature).
pub type ObjectId = u16;

/// Instance identifier within an object type.
pub type InstanceId = u16;

/// Resource identifier, unique within an object instance.
pub type ResourceId = u16;

/// Typed value held by a single resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResourceValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Time(DateTime<Utc>),
    /// Multi-instance integer resource (e.g. device error codes)
    IntegerMap(BTreeMap<u16, i64>),
}

impl ResourceValue {
    /// The type tag of this value, used to enforce type stability per id.
    pub fn kind(&self) -> ValueKind {
        match self {
            ResourceValue::String(_) => ValueKind::String,
            ResourceValue::Integer(_) => ValueKind::Integer,
            ResourceValue::Float(_) => ValueKind::Float,
            ResourceValue::Boolean(_) => ValueKind::Boolean,
            ResourceValue::Time(_) => ValueKind::Time,
            ResourceValue::IntegerMap(_) => ValueKind::IntegerMap,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResourceValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ResourceValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ResourceValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            ResourceValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::String(s) => write!(f, "{}", s),
            ResourceValue::Integer(v) => write!(f, "{}", v),
            ResourceValue::Float(v) => write!(f, "{}", v),
            ResourceValue::Boolean(v) => write!(f, "{}", v),
            ResourceValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            ResourceValue::IntegerMap(m) => write!(f, "{:?}", m),
        }
    }
}

/// Type tag of a [`ResourceValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Float,
    Boolean,
    Time,
    IntegerMap,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::Time => "time",
            ValueKind::IntegerMap => "integer map",
        };
        write!(f, "{}", name)
    }
}

/// Result of a read/write/execute against an unsupported or ill-typed target.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// No resource at this id supports the requested operation
    NotFound {
        object_id: ObjectId,
        resource_id: ResourceId,
    },
    /// Resource exists and is writable but the value was refused
    Rejected {
        object_id: ObjectId,
        resource_id: ResourceId,
        reason: String,
    },
}

impl ResourceError {
    pub fn not_found(object_id: ObjectId, resource_id: ResourceId) -> Self {
        ResourceError::NotFound {
            object_id,
            resource_id,
        }
    }

    pub fn rejected(object_id: ObjectId, resource_id: ResourceId, reason: impl Into<String>) -> Self {
        ResourceError::Rejected {
            object_id,
            resource_id,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound {
                object_id,
                resource_id,
            } => write!(f, "resource /{}/{} not found", object_id, resource_id),
            ResourceError::Rejected {
                object_id,
                resource_id,
                reason,
            } => write!(f, "write to /{}/{} rejected: {}", object_id, resource_id, reason),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Dispatch contract shared by every simulated object.
///
/// Each object type binds its own behavior to resource ids; the registry only
/// ever sees this interface. Implementations serialize all state access
/// behind a single per-instance lock.
pub trait ObjectEnabler: Send + Sync {
    /// Object type identifier.
    fn object_id(&self) -> ObjectId;

    /// Instance identifier (single-instance objects use 0).
    fn instance_id(&self) -> InstanceId {
        0
    }

    /// Read the current value of a resource.
    fn read(&self, resource_id: ResourceId) -> Result<ResourceValue, ResourceError>;

    /// Write a writable resource and raise a change notification.
    fn write(&self, resource_id: ResourceId, value: ResourceValue) -> Result<(), ResourceError>;

    /// Trigger an executable resource.
    fn execute(&self, resource_id: ResourceId, args: Option<&str>) -> Result<(), ResourceError>;

    /// Resource ids declared at construction.
    fn supported_resource_ids(&self) -> &[ResourceId];

    fn supports(&self, resource_id: ResourceId) -> bool {
        self.supported_resource_ids().contains(&resource_id)
    }
}
