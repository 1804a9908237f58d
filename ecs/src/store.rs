//! Type-erased per-type component storage.
//!
//! One store per component type: a hash map from entity id to the boxed
//! value plus a sorted id index. Queries pick the smallest index as the
//! iteration driver and filter against the rest (see
//! [`World::entities_with`](crate::World::entities_with)).

use crate::component::Component;
use crate::entity::EntityId;
use fxhash::FxHashMap;
use std::collections::BTreeSet;

pub(crate) struct ComponentStore {
    /// Human-readable type name, captured at first insert for diagnostics.
    pub(crate) type_name: &'static str,
    values: FxHashMap<EntityId, Box<dyn Component>>,
    /// Sorted membership index; iteration order is stable between mutations.
    index: BTreeSet<EntityId>,
}

impl ComponentStore {
    pub(crate) fn new(type_name: &'static str) -> ComponentStore {
        ComponentStore {
            type_name,
            values: FxHashMap::default(),
            index: BTreeSet::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: EntityId, value: Box<dyn Component>) {
        self.values.insert(id, value);
        self.index.insert(id);
    }

    /// Removes and returns the value so the caller can run disposal.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Box<dyn Component>> {
        self.index.remove(&id);
        self.values.remove(&id)
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.index.contains(&id)
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&dyn Component> {
        self.values.get(&id).map(|b| b.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut (dyn Component + 'static)> {
        self.values.get_mut(&id).map(|b| b.as_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.index.iter().copied()
    }

    /// Drains every value for disposal on world clear.
    pub(crate) fn drain(&mut self) -> Vec<(EntityId, Box<dyn Component>)> {
        self.index.clear();
        self.values.drain().collect()
    }
}
