//! Typed, reference-counted resource cache.
//!
//! Each cache is parameterized over its value type and loader, and keyed by
//! strings of the form `domain:path[:variant]` (shader keys like
//! `core/line` carry the domain in the path's first segment instead).
//! Bookkeeping — acquire, release, cache probes — is atomic and
//! mutex-protected, so a cache whose loader and value types are `Sync` is
//! safe under concurrent calls; loading itself is serialized per key with a
//! double-checked slot lock. Caches over GL objects use loaders that carry
//! the GL handle and are therefore render-thread-only by construction:
//! their loads are scheduled on the render thread because that is the only
//! thread that can reach them.
//!
//! Unloading is dropping: values live behind an `Arc`, and GL-backed
//! wrappers delete their driver objects in `Drop`, so releasing the last
//! reference is the unload.

use crate::error::ResourceError;
use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Parsed form of a cache key.
///
/// Keys are written `domain:path[:variant]`. When the first segment
/// contains a `/` it is itself the path and the domain is the path's first
/// segment, which admits the shader-style keys (`core/world3d`,
/// `particle/particle_update:compute`) unchanged.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceKey {
    full: String,
    domain: String,
    path: String,
    variant: Option<String>,
}

impl ResourceKey {
    pub fn parse(key: &str) -> ResourceKey {
        let segments: Vec<&str> = key.splitn(3, ':').collect();
        let (domain, path, variant) = match segments.as_slice() {
            [one] => (Self::domain_of(one), one.to_string(), None),
            [first, second] if first.contains('/') => {
                (Self::domain_of(first), first.to_string(), Some(second.to_string()))
            }
            [first, second] => (first.to_string(), second.to_string(), None),
            [first, second, third] => {
                (first.to_string(), second.to_string(), Some(third.to_string()))
            }
            _ => (String::new(), key.to_string(), None),
        };
        ResourceKey {
            full: key.to_string(),
            domain,
            path,
            variant,
        }
    }

    fn domain_of(path: &str) -> String {
        path.split('/').next().unwrap_or("").to_string()
    }

    pub fn full(&self) -> &str {
        &self.full
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

/// Produces resource values on cache misses.
pub trait ResourceLoader<T> {
    fn load(&self, key: &ResourceKey) -> Result<T, ResourceError>;
}

impl<T, F> ResourceLoader<T> for F
where
    F: Fn(&ResourceKey) -> Result<T, ResourceError>,
{
    fn load(&self, key: &ResourceKey) -> Result<T, ResourceError> {
        self(key)
    }
}

struct Slot<T> {
    key: String,
    value: Mutex<Option<Arc<T>>>,
    refs: AtomicU32,
    invalid: AtomicBool,
    immediate_unload: bool,
}

impl<T> Slot<T> {
    fn new(key: &str, immediate_unload: bool) -> Slot<T> {
        Slot {
            key: key.to_string(),
            value: Mutex::new(None),
            refs: AtomicU32::new(0),
            invalid: AtomicBool::new(false),
            immediate_unload,
        }
    }

    fn is_alive(&self) -> bool {
        !self.invalid.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        self.refs.fetch_add(1, Ordering::SeqCst);
    }

    /// Monotonic decrement, clamped at zero. Reaching zero unloads now
    /// when the owning cache runs in immediate mode.
    fn release(&self) {
        loop {
            let current = self.refs.load(Ordering::SeqCst);
            if current == 0 {
                return;
            }
            if self
                .refs
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if current == 1 && self.immediate_unload {
                    if self.value.lock().unwrap().take().is_some() {
                        log::debug!("resource {}: unloaded (refcount hit zero)", self.key);
                    }
                }
                return;
            }
        }
    }
}

/// Shared claim on a cached resource. Dropping the handle releases its
/// share of the reference count exactly once; explicit [`release`] is
/// idempotent.
///
/// [`release`]: Handle::release
pub struct Handle<T> {
    slot: Weak<Slot<T>>,
    key: String,
    released: AtomicBool,
}

impl<T> Handle<T> {
    fn new(slot: &Arc<Slot<T>>, key: &str) -> Handle<T> {
        Handle {
            slot: Arc::downgrade(slot),
            key: key.to_string(),
            released: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The resource value. Fails with [`ResourceError::Invalid`] once the
    /// cache disposed the slot or this handle was released.
    pub fn get(&self) -> Result<Arc<T>, ResourceError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ResourceError::Invalid);
        }
        let slot = self.slot.upgrade().ok_or(ResourceError::Invalid)?;
        if !slot.is_alive() {
            return Err(ResourceError::Invalid);
        }
        let value = slot.value.lock().unwrap().clone();
        value.ok_or(ResourceError::Invalid)
    }

    /// Takes another share of the reference count.
    pub fn acquire(&self) -> Result<Handle<T>, ResourceError> {
        let slot = self.slot.upgrade().ok_or(ResourceError::Invalid)?;
        if !slot.is_alive() {
            return Err(ResourceError::Invalid);
        }
        slot.acquire();
        Ok(Handle::new(&slot, &self.key))
    }

    /// Releases this handle's share. Idempotent; a double release never
    /// drives the count below zero.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            if let Some(slot) = self.slot.upgrade() {
                slot.release();
            }
        }
    }

    /// Current reference count of the underlying slot (0 if gone).
    pub fn ref_count(&self) -> u32 {
        self.slot
            .upgrade()
            .map(|s| s.refs.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key)
            .field("refs", &self.ref_count())
            .finish()
    }
}

/// Typed cache of reference-counted resources.
pub struct ResourceCache<T, L: ResourceLoader<T>> {
    label: &'static str,
    loader: L,
    immediate_unload: bool,
    entries: Mutex<FxHashMap<String, Arc<Slot<T>>>>,
}

impl<T, L: ResourceLoader<T>> ResourceCache<T, L> {
    /// `immediate_unload` selects whether a refcount reaching zero unloads
    /// the value now or defers it to [`cleanup`](Self::cleanup)/
    /// [`dispose`](Self::dispose).
    pub fn new(label: &'static str, loader: L, immediate_unload: bool) -> ResourceCache<T, L> {
        ResourceCache {
            label,
            loader,
            immediate_unload,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    fn slot_for(&self, key: &str) -> Arc<Slot<T>> {
        let mut entries = self.entries.lock().unwrap();
        let slot = entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Slot::new(key, self.immediate_unload)));
        if !slot.is_alive() {
            *slot = Arc::new(Slot::new(key, self.immediate_unload));
        }
        slot.clone()
    }

    /// Cache hit acquires and returns; a miss loads under the slot's
    /// single-flight lock. A failed load returns `None` and leaves the
    /// cache untouched.
    pub fn get(&self, key: &str) -> Option<Handle<T>> {
        let slot = self.slot_for(key);
        {
            // serializes loading per key; second callers find the value
            let mut value = slot.value.lock().unwrap();
            if value.is_none() {
                match self.loader.load(&ResourceKey::parse(key)) {
                    Ok(loaded) => {
                        log::debug!("{}: loaded {}", self.label, key);
                        *value = Some(Arc::new(loaded));
                    }
                    Err(err) => {
                        log::warn!("{}: failed to load {}: {}", self.label, key, err);
                        drop(value);
                        let mut entries = self.entries.lock().unwrap();
                        if let Some(current) = entries.get(key) {
                            if Arc::ptr_eq(current, &slot) {
                                entries.remove(key);
                            }
                        }
                        return None;
                    }
                }
            }
        }
        slot.acquire();
        Some(Handle::new(&slot, key))
    }

    /// Inserts a host-produced value (decoded textures, prebuilt meshes)
    /// and returns the first handle to it.
    pub fn insert(&self, key: &str, value: T) -> Handle<T> {
        let slot = self.slot_for(key);
        *slot.value.lock().unwrap() = Some(Arc::new(value));
        slot.acquire();
        Handle::new(&slot, key)
    }

    /// Loads then immediately releases. In deferred-unload mode the
    /// zero-ref resource stays warm for the next `get`.
    pub fn preload(&self, key: &str) {
        drop(self.get(key));
    }

    pub fn is_cached(&self, key: &str) -> bool {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .map(|slot| slot.is_alive() && slot.value.lock().unwrap().is_some())
            .unwrap_or(false)
    }

    pub fn ref_count(&self, key: &str) -> u32 {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .map(|slot| slot.refs.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweeps every entry whose refcount is zero, unloading and removing
    /// it. Returns the number purged.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, slot| {
            let keep = slot.refs.load(Ordering::SeqCst) > 0;
            if !keep {
                slot.value.lock().unwrap().take();
                log::debug!("{}: purged {}", self.label, key);
            }
            keep
        });
        before - entries.len()
    }

    /// Unconditionally invalidates every handle and unloads everything.
    pub fn dispose(&self) {
        let mut entries = self.entries.lock().unwrap();
        for slot in entries.values() {
            slot.invalid.store(true, Ordering::SeqCst);
            slot.value.lock().unwrap().take();
        }
        log::debug!("{}: disposed {} entries", self.label, entries.len());
        entries.clear();
    }
}
