// Change notification delivery from enablers to the observation channel

use crate::resource::{InstanceId, ObjectId, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// One "resources changed" event, at most one per tick per instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourcesChanged {
    pub object_id: ObjectId,
    pub instance_id: InstanceId,
    /// Deduplicated, ascending
    pub resource_ids: BTreeSet<ResourceId>,
    pub timestamp: DateTime<Utc>,
}

/// Hub owning the sending side of the single observation channel.
///
/// Delivery is fire-and-forget: `try_send` never waits, and an event that
/// cannot be queued (channel full or observer gone) is dropped with a
/// warning.
#[derive(Clone, Debug)]
pub struct NotificationHub {
    tx: mpsc::Sender<ResourcesChanged>,
}

impl NotificationHub {
    /// Create the hub and the receiver the observation transport drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResourcesChanged>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Notifier bound to one object instance.
    pub fn notifier(&self, object_id: ObjectId, instance_id: InstanceId) -> Notifier {
        Notifier {
            object_id,
            instance_id,
            tx: self.tx.clone(),
        }
    }
}

/// Per-instance handle used by enablers and samplers to report changes.
#[derive(Clone, Debug)]
pub struct Notifier {
    object_id: ObjectId,
    instance_id: InstanceId,
    tx: mpsc::Sender<ResourcesChanged>,
}

impl Notifier {
    /// Emit a single event for the given resource ids.
    ///
    /// Duplicate ids are collapsed; an empty set emits nothing. Returns
    /// whether an event was queued.
    pub fn fire<I>(&self, resource_ids: I) -> bool
    where
        I: IntoIterator<Item = ResourceId>,
    {
        let resource_ids: BTreeSet<ResourceId> = resource_ids.into_iter().collect();
        if resource_ids.is_empty() {
            return false;
        }

        let event = ResourcesChanged {
            object_id: self.object_id,
            instance_id: self.instance_id,
            resource_ids,
            timestamp: Utc::now(),
        };

        match self.tx.try_send(event) {
            Ok(()) => {
                debug!(
                    object_id = self.object_id,
                    instance_id = self.instance_id,
                    "Queued change notification"
                );
                true
            }
            Err(TrySendError::Full(event)) => {
                warn!(
                    object_id = self.object_id,
                    instance_id = self.instance_id,
                    resources = ?event.resource_ids,
                    "Observation channel full, dropping notification"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    object_id = self.object_id,
                    instance_id = self.instance_id,
                    resources = ?event.resource_ids,
                    "Observation channel closed, dropping notification"
                );
                false
            }
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_coalesces_duplicates_into_one_event() {
        let (hub, mut rx) = NotificationHub::channel(8);
        let notifier = hub.notifier(3303, 0);

        assert!(notifier.fire([5700, 5602, 5700]));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.object_id, 3303);
        assert_eq!(event.instance_id, 0);
        assert_eq!(event.resource_ids, BTreeSet::from([5602, 5700]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fire_empty_set_sends_nothing() {
        let (hub, mut rx) = NotificationHub::channel(8);
        let notifier = hub.notifier(6, 0);

        assert!(!notifier.fire(std::iter::empty()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_channel_drops_without_blocking() {
        let (hub, mut rx) = NotificationHub::channel(1);
        let notifier = hub.notifier(3, 0);

        assert!(notifier.fire([13]));
        assert!(!notifier.fire([13]));

        // Only the first event was queued; the second was not retried
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_drops() {
        let (hub, rx) = NotificationHub::channel(4);
        drop(rx);

        let notifier = hub.notifier(3, 0);
        assert!(!notifier.fire([14]));
    }
}
