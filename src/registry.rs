//! # Registry
//!
//! Concurrency-safe store mapping generated ids to live resources, used for
//! inbox fetchers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RESERVED CREATION                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  reserve()          lock → new uuid → slot = Reserved → unlock          │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  async setup        no lock held; get(id) answers NotFound meanwhile    │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  fulfill(resource)  lock → Reserved? → slot = Ready(resource) → unlock  │
//! │                            released? → Err(FetcherNotFound)             │
//! │                                                                         │
//! │  dropping a Reservation without fulfilling it frees the slot            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation takes the single map lock for its whole critical section,
//! so an entry is always either fully present or absent to observers. The
//! lock is never held across resource setup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

enum Slot<R: ?Sized> {
    Reserved,
    Ready(Arc<R>),
}

/// Id → resource store
///
/// Clones share the same entries.
pub struct Registry<R: ?Sized> {
    entries: Arc<Mutex<HashMap<String, Slot<R>>>>,
}

impl<R: ?Sized> Clone for Registry<R> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<R: ?Sized> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ?Sized> Registry<R> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store a ready resource under a fresh id
    pub fn create(&self, resource: impl Into<Arc<R>>) -> String {
        let resource = resource.into();
        let mut entries = self.entries.lock();
        let id = fresh_id(&entries);
        entries.insert(id.clone(), Slot::Ready(resource));
        tracing::debug!(id = %id, "Registry entry created");
        id
    }

    /// Reserve a fresh id for a resource that is still being set up
    pub fn reserve(&self) -> Reservation<R> {
        let mut entries = self.entries.lock();
        let id = fresh_id(&entries);
        entries.insert(id.clone(), Slot::Reserved);
        Reservation {
            id,
            entries: Arc::clone(&self.entries),
            settled: false,
        }
    }

    /// Look up a ready resource
    ///
    /// Unknown, released and still-reserved ids are all `FetcherNotFound`.
    pub fn get(&self, id: &str) -> Result<Arc<R>> {
        match self.entries.lock().get(id) {
            Some(Slot::Ready(resource)) => Ok(Arc::clone(resource)),
            _ => Err(Error::FetcherNotFound(id.to_string())),
        }
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn release(&self, id: &str) -> bool {
        let removed = self.entries.lock().remove(id).is_some();
        if removed {
            tracing::debug!(id = %id, "Registry entry released");
        }
        removed
    }

    /// Whether a ready resource exists under `id`
    pub fn contains(&self, id: &str) -> bool {
        matches!(self.entries.lock().get(id), Some(Slot::Ready(_)))
    }

    /// Number of ready resources
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether there are no ready resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fresh_id<R: ?Sized>(entries: &HashMap<String, Slot<R>>) -> String {
    loop {
        let id = Uuid::new_v4().to_string();
        if !entries.contains_key(&id) {
            return id;
        }
    }
}

/// An id reserved for a resource under construction
pub struct Reservation<R: ?Sized> {
    id: String,
    entries: Arc<Mutex<HashMap<String, Slot<R>>>>,
    settled: bool,
}

impl<R: ?Sized> Reservation<R> {
    /// The reserved id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store the finished resource under the reserved id
    ///
    /// Fails with `FetcherNotFound` if the id was released meanwhile; the
    /// resource is dropped in that case.
    pub fn fulfill(mut self, resource: impl Into<Arc<R>>) -> Result<String> {
        self.settled = true;
        let resource = resource.into();
        let mut entries = self.entries.lock();
        match entries.get_mut(&self.id) {
            Some(slot @ Slot::Reserved) => {
                *slot = Slot::Ready(resource);
                tracing::debug!(id = %self.id, "Registry reservation fulfilled");
                Ok(self.id.clone())
            }
            _ => {
                tracing::debug!(id = %self.id, "Registry reservation released before setup finished");
                Err(Error::FetcherNotFound(self.id.clone()))
            }
        }
    }
}

impl<R: ?Sized> Drop for Reservation<R> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut entries = self.entries.lock();
        if matches!(entries.get(&self.id), Some(Slot::Reserved)) {
            entries.remove(&self.id);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
