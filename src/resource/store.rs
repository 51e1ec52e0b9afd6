use super::{ObjectId, ResourceError, ResourceId, ResourceValue};
use std::collections::BTreeMap;

/// Ground-truth values of one object instance, keyed by resource id.
///
/// The first value stored for an id fixes its type; later values of a
/// different type are rejected.
#[derive(Clone, Debug)]
pub struct ResourceStore {
    object_id: ObjectId,
    values: BTreeMap<ResourceId, ResourceValue>,
}

impl ResourceStore {
    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert used while an enabler is being constructed.
    pub fn with(mut self, resource_id: ResourceId, value: ResourceValue) -> Self {
        self.values.insert(resource_id, value);
        self
    }

    pub fn get(&self, resource_id: ResourceId) -> Option<&ResourceValue> {
        self.values.get(&resource_id)
    }

    pub fn contains(&self, resource_id: ResourceId) -> bool {
        self.values.contains_key(&resource_id)
    }

    /// Store a value and report whether it differs from the previous one.
    ///
    /// Float values compare with exact equality.
    pub fn set(&mut self, resource_id: ResourceId, value: ResourceValue) -> Result<bool, ResourceError> {
        match self.values.get_mut(&resource_id) {
            Some(existing) => {
                if existing.kind() != value.kind() {
                    return Err(ResourceError::rejected(
                        self.object_id,
                        resource_id,
                        format!("expected {}, got {}", existing.kind(), value.kind()),
                    ));
                }
                if *existing == value {
                    return Ok(false);
                }
                *existing = value;
                Ok(true)
            }
            None => {
                self.values.insert(resource_id, value);
                Ok(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
