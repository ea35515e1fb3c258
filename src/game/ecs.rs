//! # Entity-Component Store
//!
//! Entities are opaque ids; each carries at most one component per
//! [`ComponentKind`], held in a fixed slot array indexed by kind. Entities are
//! kept in id order so iteration is stable across runs.

use crate::{Component, ComponentData, ComponentKind, DelveError, DelveResult, EntityId, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Component slots of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    slots: [Option<Component>; ComponentKind::COUNT],
}

impl EntityRecord {
    fn get(&self, kind: ComponentKind) -> Option<&Component> {
        self.slots[kind.index()].as_ref()
    }

    fn get_mut(&mut self, kind: ComponentKind) -> Option<&mut Component> {
        self.slots[kind.index()].as_mut()
    }

    fn insert(&mut self, component: Component) -> Option<Component> {
        self.slots[component.kind().index()].replace(component)
    }

    fn take(&mut self, kind: ComponentKind) -> Option<Component> {
        self.slots[kind.index()].take()
    }

    fn components(&self) -> impl Iterator<Item = &Component> {
        self.slots.iter().flatten()
    }
}

/// Owner of every entity and component of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    next_id: u32,
    entities: BTreeMap<EntityId, EntityRecord>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Creates an empty store. Ids start at 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entities: BTreeMap::new(),
        }
    }

    /// Creates an entity with the given components.
    ///
    /// Later components replace earlier ones of the same kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{EntityStore, HealthComponent, ComponentKind};
    ///
    /// let mut store = EntityStore::new();
    /// let id = store.create_entity(vec![HealthComponent::new(10).into()]);
    /// assert!(store.has_component(id, ComponentKind::Health));
    /// ```
    pub fn create_entity(&mut self, components: Vec<Component>) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let mut record = EntityRecord::default();
        for component in components {
            record.insert(component);
        }
        self.entities.insert(id, record);
        id
    }

    /// Removes an entity and every component it owns.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id).is_some()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Attaches a component, returning the one it replaced.
    ///
    /// The returned value is the detach signal for the replaced component.
    pub fn add_component(
        &mut self,
        id: EntityId,
        component: impl Into<Component>,
    ) -> DelveResult<Option<Component>> {
        let record = self
            .entities
            .get_mut(&id)
            .ok_or(DelveError::UnknownEntity(id))?;
        let replaced = record.insert(component.into());
        if let Some(old) = &replaced {
            log::trace!("entity {} detached {:?}", id, old.kind());
        }
        Ok(replaced)
    }

    /// Detaches a component. Removing an absent component is a no-op.
    pub fn remove_component(&mut self, id: EntityId, kind: ComponentKind) -> Option<Component> {
        self.entities.get_mut(&id).and_then(|record| record.take(kind))
    }

    pub fn get_component(&self, id: EntityId, kind: ComponentKind) -> Option<&Component> {
        self.entities.get(&id).and_then(|record| record.get(kind))
    }

    pub fn has_component(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.get_component(id, kind).is_some()
    }

    /// Kinds of all components attached to an entity, in slot order.
    pub fn list_components(&self, id: EntityId) -> Vec<ComponentKind> {
        self.entities
            .get(&id)
            .map(|record| record.components().map(Component::kind).collect())
            .unwrap_or_default()
    }

    /// Typed read access.
    pub fn get<T: ComponentData>(&self, id: EntityId) -> Option<&T> {
        self.get_component(id, T::KIND).and_then(T::from_component)
    }

    /// Typed write access.
    pub fn get_mut<T: ComponentData>(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities
            .get_mut(&id)
            .and_then(|record| record.get_mut(T::KIND))
            .and_then(T::from_component_mut)
    }

    /// Ids of entities carrying a component kind, in ascending order.
    pub fn with_component(&self, kind: ComponentKind) -> impl Iterator<Item = EntityId> + '_ {
        self.entities
            .iter()
            .filter(move |(_, record)| record.get(kind).is_some())
            .map(|(id, _)| *id)
    }

    /// Position of an entity, if it has one.
    pub fn position_of(&self, id: EntityId) -> Option<Position> {
        self.get::<crate::PositionComponent>(id)
            .map(|component| component.position())
    }

    /// The first entity (by id) standing on `pos`.
    pub fn entity_at(&self, pos: Position) -> Option<EntityId> {
        self.with_component(ComponentKind::Position)
            .find(|&id| self.position_of(id) == Some(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AiBehaviorComponent, BehaviorClass, HealthComponent, PositionComponent};

    fn npc(store: &mut EntityStore, x: i32, y: i32) -> EntityId {
        store.create_entity(vec![
            PositionComponent::new(Position::new(x, y), 1).into(),
            HealthComponent::new(20).into(),
            AiBehaviorComponent::new(BehaviorClass::Hostile, 8).into(),
        ])
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let mut store = EntityStore::new();
        let a = npc(&mut store, 1, 1);
        let b = npc(&mut store, 2, 2);
        assert_ne!(a, b);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_add_component_replaces_and_signals() {
        let mut store = EntityStore::new();
        let id = npc(&mut store, 1, 1);

        let replaced = store.add_component(id, HealthComponent::new(99)).unwrap();
        match replaced {
            Some(Component::Health(old)) => assert_eq!(old.max(), 20),
            other => panic!("expected replaced health, got {other:?}"),
        }
        assert_eq!(store.get::<HealthComponent>(id).unwrap().max(), 99);

        let fresh = store.create_entity(Vec::new());
        assert!(store
            .add_component(fresh, HealthComponent::new(5))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_add_component_unknown_entity() {
        let mut store = EntityStore::new();
        let result = store.add_component(EntityId(77), HealthComponent::new(5));
        assert!(matches!(result, Err(DelveError::UnknownEntity(EntityId(77)))));
    }

    #[test]
    fn test_remove_missing_component_is_noop() {
        let mut store = EntityStore::new();
        let id = store.create_entity(vec![HealthComponent::new(5).into()]);
        assert!(store.remove_component(id, ComponentKind::Player).is_none());
        assert!(store.remove_component(EntityId(500), ComponentKind::Health).is_none());
        assert!(store.has_component(id, ComponentKind::Health));

        assert!(store.remove_component(id, ComponentKind::Health).is_some());
        assert!(!store.has_component(id, ComponentKind::Health));
    }

    #[test]
    fn test_list_and_query_components() {
        let mut store = EntityStore::new();
        let id = npc(&mut store, 3, 4);
        let bare = store.create_entity(Vec::new());

        assert_eq!(
            store.list_components(id),
            vec![
                ComponentKind::Position,
                ComponentKind::Health,
                ComponentKind::AiBehavior
            ]
        );
        assert!(store.list_components(bare).is_empty());
        assert_eq!(
            store.with_component(ComponentKind::AiBehavior).collect::<Vec<_>>(),
            vec![id]
        );
        assert_eq!(store.position_of(id), Some(Position::new(3, 4)));
        assert_eq!(store.entity_at(Position::new(3, 4)), Some(id));
        assert_eq!(store.entity_at(Position::new(0, 0)), None);
    }

    #[test]
    fn test_typed_mutation() {
        let mut store = EntityStore::new();
        let id = npc(&mut store, 1, 1);
        store
            .get_mut::<PositionComponent>(id)
            .unwrap()
            .set_position(Position::new(9, 9));
        assert_eq!(store.position_of(id), Some(Position::new(9, 9)));
    }

    #[test]
    fn test_destroy_entity_drops_components() {
        let mut store = EntityStore::new();
        let id = npc(&mut store, 1, 1);
        assert!(store.destroy_entity(id));
        assert!(!store.contains(id));
        assert!(store.get_component(id, ComponentKind::Health).is_none());
        assert!(!store.destroy_entity(id));
    }
}
