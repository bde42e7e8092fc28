//! Objects that ride along with rope nodes.
//!
//! An attached object is owned by the caller. The rope keeps a handle and
//! pushes the tracked node's position into it once per frame, snapping to the
//! latest physics state.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use glam::Vec3;
//! use strand::{Attachable, AttachmentRegistry};
//!
//! struct Lantern { position: Vec3 }
//!
//! impl Attachable for Lantern {
//!     fn update_position(&mut self, position: Vec3) {
//!         self.position = position;
//!     }
//! }
//!
//! let lantern = Rc::new(RefCell::new(Lantern { position: Vec3::ZERO }));
//! let mut registry = AttachmentRegistry::new();
//! registry.attach(12, Rc::clone(&lantern));
//! assert!(registry.contains(12));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;

/// Something that can follow a rope node.
pub trait Attachable {
    /// Move to `position`, the tracked node's current world-space position.
    fn update_position(&mut self, position: Vec3);

    /// Whether updates still reach the object. Dead handles are skipped.
    fn is_alive(&self) -> bool {
        true
    }
}

impl<T: Attachable + ?Sized> Attachable for Rc<RefCell<T>> {
    fn update_position(&mut self, position: Vec3) {
        self.borrow_mut().update_position(position);
    }

    fn is_alive(&self) -> bool {
        self.borrow().is_alive()
    }
}

/// Handles whose owner has gone away are skipped.
impl<T: Attachable + ?Sized> Attachable for Weak<RefCell<T>> {
    fn update_position(&mut self, position: Vec3) {
        if let Some(object) = self.upgrade() {
            object.borrow_mut().update_position(position);
        }
    }

    fn is_alive(&self) -> bool {
        self.upgrade().is_some_and(|object| object.borrow().is_alive())
    }
}

impl<T: Attachable + ?Sized> Attachable for Arc<Mutex<T>> {
    fn update_position(&mut self, position: Vec3) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update_position(position);
    }

    fn is_alive(&self) -> bool {
        self.lock().unwrap_or_else(PoisonError::into_inner).is_alive()
    }
}

/// Node index → attached object map.
///
/// Indices are not checked against the rope's node count: an entry past the
/// end is kept but never updated. Updates run in ascending index order.
#[derive(Default)]
pub struct AttachmentRegistry {
    entries: BTreeMap<usize, Box<dyn Attachable>>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `object` to node `index`, returning whatever was bound there before.
    pub fn attach<A: Attachable + 'static>(
        &mut self,
        index: usize,
        object: A,
    ) -> Option<Box<dyn Attachable>> {
        self.entries.insert(index, Box::new(object))
    }

    /// Remove the binding at `index`.
    pub fn detach(&mut self, index: usize) -> Option<Box<dyn Attachable>> {
        self.entries.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound node indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Push `positions[index]` to every live bound object whose index is in range.
    ///
    /// Returns the number of objects that received a position.
    pub(crate) fn update(&mut self, positions: impl Fn(usize) -> Option<Vec3>) -> usize {
        let mut updated = 0;
        for (&index, object) in self.entries.iter_mut() {
            if !object.is_alive() {
                continue;
            }
            if let Some(position) = positions(index) {
                object.update_position(position);
                updated += 1;
            }
        }
        updated
    }
}

impl fmt::Debug for AttachmentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentRegistry")
            .field("indices", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
