//! The world: exclusive owner of entities, components and the schedule.

use crate::component::{Component, ComponentSet};
use crate::entity::{EntityId, EntityMeta};
use crate::error::EcsError;
use crate::layer::{Dimension, Layer};
use crate::profiler::FrameProfile;
use crate::scene::SceneManager;
use crate::schedule::{Phase, Schedule, System, Tick};
use crate::store::ComponentStore;
use fxhash::FxHashMap;
use std::any::{type_name, TypeId};
use std::mem;

/// Observer of world mutations; the internal hook surface behind
/// component add/remove and entity destruction.
pub trait WorldObserver {
    fn on_component_added(&mut self, _id: EntityId, _type_name: &'static str) {}
    fn on_component_removed(&mut self, _id: EntityId, _type_name: &'static str) {}
    fn on_entity_destroyed(&mut self, _id: EntityId) {}
}

pub struct World {
    next_id: u64,
    entities: FxHashMap<EntityId, EntityMeta>,
    stores: FxHashMap<TypeId, ComponentStore>,
    schedule: Schedule,
    scene: SceneManager,
    observers: Vec<Box<dyn WorldObserver>>,
    /// Destructions requested while a frame sweep is running; applied once
    /// the sweep completes so every system of the frame still sees the
    /// entity.
    pending_destroy: Vec<EntityId>,
    profile: FrameProfile,
    frame: u64,
    in_frame: bool,
}

impl World {
    pub fn new() -> World {
        World {
            next_id: 1,
            entities: FxHashMap::default(),
            stores: FxHashMap::default(),
            schedule: Schedule::default(),
            scene: SceneManager::new(),
            observers: Vec::new(),
            pending_destroy: Vec::new(),
            profile: FrameProfile::default(),
            frame: 0,
            in_frame: false,
        }
    }

    //----------------------------------------------------------------------
    // entities

    /// Produces a fresh id and registers an empty, active entity.
    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, EntityMeta::new());
        id
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_active(&self, id: EntityId) -> bool {
        self.entities.get(&id).map_or(false, |m| m.active)
    }

    /// Unknown ids are a silent no-op.
    pub fn set_active(&mut self, id: EntityId, active: bool) {
        if let Some(meta) = self.entities.get_mut(&id) {
            meta.active = active;
        }
    }

    /// Destroys an entity: removes it from every index, disposing each
    /// disposable component exactly once, then releases the slot.
    ///
    /// Idempotent for unknown ids. While a frame sweep is running the
    /// destruction is deferred to the end of the sweep.
    pub fn destroy_entity(&mut self, id: EntityId) {
        if !self.entities.contains_key(&id) {
            return;
        }
        if self.in_frame {
            if !self.pending_destroy.contains(&id) {
                self.pending_destroy.push(id);
            }
        } else {
            self.destroy_now(id);
        }
    }

    fn destroy_now(&mut self, id: EntityId) {
        if self.entities.remove(&id).is_none() {
            return;
        }
        for store in self.stores.values_mut() {
            if let Some(mut component) = store.remove(id) {
                if let Some(disposable) = component.as_disposable() {
                    disposable.dispose();
                }
            }
        }
        for observer in &mut self.observers {
            observer.on_entity_destroyed(id);
        }
    }

    fn flush_destroyed(&mut self) {
        let pending = mem::take(&mut self.pending_destroy);
        for id in pending {
            self.destroy_now(id);
        }
    }

    /// Destroys every entity, disposing all disposable components.
    pub fn clear(&mut self) {
        for store in self.stores.values_mut() {
            for (_, mut component) in store.drain() {
                if let Some(disposable) = component.as_disposable() {
                    disposable.dispose();
                }
            }
        }
        self.entities.clear();
        self.pending_destroy.clear();
    }

    //----------------------------------------------------------------------
    // components

    /// Attaches `value` to `id` after verifying the component's declared
    /// dependencies are already present. A component of the same type
    /// already attached is replaced (and disposed).
    ///
    /// Unknown ids are a silent no-op; a missing dependency is a programmer
    /// error and fails fatally at the call site.
    pub fn add_component<T: Component>(&mut self, id: EntityId, value: T) -> Result<(), EcsError> {
        if !self.entities.contains_key(&id) {
            log::debug!("add_component on unknown {}", id);
            return Ok(());
        }
        for dep in value.dependencies() {
            let present = self
                .stores
                .get(&dep)
                .map_or(false, |store| store.contains(id));
            if !present {
                return Err(EcsError::DependencyMissing {
                    component: type_name::<T>(),
                    dependency: dep,
                });
            }
        }
        let store = self
            .stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| ComponentStore::new(type_name::<T>()));
        if let Some(mut old) = store.remove(id) {
            if let Some(disposable) = old.as_disposable() {
                disposable.dispose();
            }
        }
        store.insert(id, Box::new(value));
        for observer in &mut self.observers {
            observer.on_component_added(id, type_name::<T>());
        }
        Ok(())
    }

    /// Detaches and disposes the `T` on `id`; no-op (returning `false`) if
    /// absent or unknown.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        let removed = self
            .stores
            .get_mut(&TypeId::of::<T>())
            .and_then(|store| store.remove(id));
        match removed {
            Some(mut component) => {
                if let Some(disposable) = component.as_disposable() {
                    disposable.dispose();
                }
                for observer in &mut self.observers {
                    observer.on_component_removed(id, type_name::<T>());
                }
                true
            }
            None => false,
        }
    }

    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.stores
            .get(&TypeId::of::<T>())
            .map_or(false, |store| store.contains(id))
    }

    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.stores
            .get(&TypeId::of::<T>())?
            .get(id)?
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.stores
            .get_mut(&TypeId::of::<T>())?
            .get_mut(id)?
            .downcast_mut::<T>()
    }

    /// Simultaneous mutable access to two different component types on
    /// one entity (their stores are disjoint). Panics if `A` and `B` are
    /// the same type.
    pub fn get_pair_mut<A: Component, B: Component>(
        &mut self,
        id: EntityId,
    ) -> (Option<&mut A>, Option<&mut B>) {
        assert_ne!(
            TypeId::of::<A>(),
            TypeId::of::<B>(),
            "get_pair_mut needs two distinct component types"
        );
        let [store_a, store_b] = self
            .stores
            .get_disjoint_mut([&TypeId::of::<A>(), &TypeId::of::<B>()]);
        (
            store_a
                .and_then(|store| store.get_mut(id))
                .and_then(|component| component.downcast_mut::<A>()),
            store_b
                .and_then(|store| store.get_mut(id))
                .and_then(|component| component.downcast_mut::<B>()),
        )
    }

    //----------------------------------------------------------------------
    // queries

    /// Every active entity whose component set is a superset of `Q`.
    ///
    /// Cost is O(|smallest per-type index| + output): the smallest index
    /// drives the iteration, the rest are membership probes. Order is
    /// unspecified but stable within a frame.
    pub fn entities_with<Q: ComponentSet>(&self) -> Vec<EntityId> {
        self.entities_with_ids(&Q::type_ids())
    }

    /// Untyped variant of [`entities_with`](Self::entities_with).
    pub fn entities_with_ids(&self, types: &[TypeId]) -> Vec<EntityId> {
        if types.is_empty() {
            return Vec::new();
        }
        let mut stores = Vec::with_capacity(types.len());
        for ty in types {
            match self.stores.get(ty) {
                Some(store) => stores.push(store),
                None => return Vec::new(),
            }
        }
        // smallest index drives
        stores.sort_by_key(|s| s.len());
        let (driver, rest) = stores.split_first().expect("at least one store");
        driver
            .ids()
            .filter(|id| rest.iter().all(|store| store.contains(*id)))
            .filter(|id| self.is_active(*id))
            .collect()
    }

    /// Names of every component type attached to `id`, for the inspector.
    pub fn component_names(&self, id: EntityId) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .stores
            .values()
            .filter(|store| store.contains(id))
            .map(|store| store.type_name)
            .collect();
        names.sort_unstable();
        names
    }

    //----------------------------------------------------------------------
    // layer / dimension routing

    /// Layer of an entity; entities without a Layer component are WORLD_3D.
    pub fn layer_of(&self, id: EntityId) -> Layer {
        self.get::<Layer>(id).copied().unwrap_or_default()
    }

    pub fn matches_layer(&self, id: EntityId, filter: Option<Layer>) -> bool {
        match filter {
            Some(layer) => self.layer_of(id) == layer,
            None => true,
        }
    }

    /// Dimension tag of an entity; `None` means "all dimensions".
    pub fn dimension_of(&self, id: EntityId) -> Option<i32> {
        self.get::<Dimension>(id).map(|d| d.0)
    }

    /// Whether `id` is present in the scene's active dimension.
    pub fn in_active_dimension(&self, id: EntityId) -> bool {
        match (self.dimension_of(id), self.scene.active_dimension()) {
            (Some(tag), Some(active)) => tag == active,
            // untagged entities are everywhere; before the host reports a
            // dimension, everything is visible
            _ => true,
        }
    }

    //----------------------------------------------------------------------
    // systems and frame sweeps

    /// Inserts into the schedule sorted by (phase, priority); ties run in
    /// insertion order. Fires the system's `on_init`.
    pub fn add_system<S: System + 'static>(&mut self, mut system: S) {
        system.on_init(self);
        self.schedule.insert(Box::new(system));
    }

    pub fn system_count(&self) -> usize {
        self.schedule.len()
    }

    /// Runs every UPDATE system in schedule order, then applies deferred
    /// destructions. `layer` restricts systems to entities of that layer.
    pub fn update(&mut self, layer: Option<Layer>, dt: f32) {
        self.frame += 1;
        self.profile = FrameProfile {
            frame: self.frame,
            samples: Vec::new(),
        };
        self.run_phase(Phase::Update, layer, dt);
    }

    /// Runs every RENDER system in schedule order. UPDATE of a frame always
    /// completes before RENDER starts; the host drives the two in sequence.
    pub fn render(&mut self, layer: Option<Layer>) {
        self.run_phase(Phase::Render, layer, 0.0);
    }

    fn run_phase(&mut self, phase: Phase, layer: Option<Layer>, dt: f32) {
        let tick = Tick {
            dt,
            layer,
            frame: self.frame,
        };
        self.in_frame = true;
        // The schedule is detached while it runs so systems can borrow the
        // world mutably; systems registered mid-sweep land in the
        // placeholder and are absorbed afterwards.
        let mut schedule = mem::take(&mut self.schedule);
        let samples = schedule.run_phase(phase, self, &tick);
        let added = mem::replace(&mut self.schedule, schedule);
        self.schedule.absorb(added);
        self.profile.samples.extend(samples);
        self.in_frame = false;
        self.flush_destroyed();
    }

    //----------------------------------------------------------------------
    // scene, observers, profiling

    pub fn scene(&self) -> &SceneManager {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneManager {
        &mut self.scene
    }

    pub fn add_observer<O: WorldObserver + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Timings of the most recent frame, in execution order.
    pub fn last_frame_profile(&self) -> &FrameProfile {
        &self.profile
    }
}

impl Default for World {
    fn default() -> World {
        World::new()
    }
}
