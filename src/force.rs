//! Publish/subscribe channel for ambient forces such as wind.
//!
//! Any number of publishers may hold a clone of a [`ForceBus`]. A rope
//! subscribes while its soft body is alive and drains the queued vectors at
//! the start of every tick, so forces published between ticks are applied in
//! publication order before the next physics step. Dropping the
//! [`ForceSubscription`] unsubscribes and discards anything still queued.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3;

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    senders: Vec<(u64, Sender<Vec3>)>,
}

/// Cloneable publisher side of the force channel.
#[derive(Clone, Debug, Default)]
pub struct ForceBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ForceBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `force` to every current subscriber.
    ///
    /// Returns how many subscribers received it. With no subscriber the
    /// force is dropped.
    pub fn publish(&self, force: Vec3) -> usize {
        let mut subscribers = self.lock();
        subscribers
            .senders
            .retain(|(_, sender)| sender.send(force).is_ok());
        subscribers.senders.len()
    }

    /// Register a new subscriber. Only forces published afterwards are delivered.
    pub fn subscribe(&self) -> ForceSubscription {
        let (sender, receiver) = mpsc::channel();
        let mut subscribers = self.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.push((id, sender));
        log::trace!("force subscriber {} registered", id);

        ForceSubscription {
            id,
            receiver,
            bus: Arc::clone(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }
}

/// Receiving side of a [`ForceBus`] registration.
#[derive(Debug)]
pub struct ForceSubscription {
    id: u64,
    receiver: Receiver<Vec3>,
    bus: Arc<Mutex<Subscribers>>,
}

impl ForceSubscription {
    /// Take every force queued since the last drain, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.receiver.try_iter()
    }
}

impl Drop for ForceSubscription {
    fn drop(&mut self) {
        let mut subscribers = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.senders.retain(|(id, _)| *id != self.id);
        log::trace!("force subscriber {} removed", self.id);
    }
}
