//! # Registry
//!
//! Entity slots, free-list recycling, and the component tables.

use super::component::{BodyRef, InputState, PlayerTag, Tint, Transform};
use super::entity::EntityId;
use super::storage::ComponentStorage;

/// Default entity capacity for the sandbox world.
pub const DEFAULT_CAPACITY: usize = 4096;

#[derive(Clone, Copy, Default)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// The entity registry: all world state the handlers and driver share.
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive_count: usize,

    /// Pose components.
    pub transforms: ComponentStorage<Transform>,
    /// Rigid-body links.
    pub bodies: ComponentStorage<BodyRef>,
    /// Player movement intents.
    pub inputs: ComponentStorage<InputState>,
    /// Display colors.
    pub tints: ComponentStorage<Tint>,
    /// Player ownership tags.
    pub players: ComponentStorage<PlayerTag>,
}

impl Registry {
    /// Creates a registry with `capacity` pre-allocated entity slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds the 16-bit wire index
    /// space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        assert!(capacity <= 0x10000, "capacity exceeds wire index space");

        Self {
            slots: vec![Slot::default(); capacity],
            free: (0..capacity as u32).rev().collect(),
            alive_count: 0,
            transforms: ComponentStorage::new(capacity),
            bodies: ComponentStorage::new(capacity),
            inputs: ComponentStorage::new(capacity),
            tints: ComponentStorage::new(capacity),
            players: ComponentStorage::new(capacity),
        }
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Spawns an entity, or `None` when capacity is exhausted.
    pub fn spawn(&mut self) -> Option<EntityId> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index as usize];
        slot.alive = true;
        self.alive_count += 1;
        Some(EntityId {
            index,
            generation: slot.generation,
        })
    }

    /// Despawns an entity and drops all of its components.
    ///
    /// Returns false for ids that are stale or were never alive.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let index = id.index as usize;
        self.slots[index].alive = false;
        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
        self.free.push(id.index);
        self.alive_count -= 1;

        self.transforms.remove(index);
        self.bodies.remove(index);
        self.inputs.remove(index);
        self.tints.remove(index);
        self.players.remove(index);
        true
    }

    /// Returns true if `id` refers to a currently-alive entity.
    #[must_use]
    pub fn is_valid(&self, id: EntityId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == id.generation)
    }

    fn live_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            let index = index as u32;
            slot.alive.then_some(EntityId {
                index,
                generation: slot.generation,
            })
        })
    }

    /// Entities carrying a rigid body.
    pub fn iter_bodies(&self) -> impl Iterator<Item = (EntityId, BodyRef)> + '_ {
        self.live_ids().filter_map(|id| {
            self.bodies
                .get(id.index as usize)
                .map(|body_ref| (id, *body_ref))
        })
    }

    /// Entities with both a body and a pending movement intent.
    pub fn iter_body_inputs(&self) -> impl Iterator<Item = (EntityId, BodyRef, InputState)> + '_ {
        self.live_ids().filter_map(|id| {
            let index = id.index as usize;
            let body_ref = self.bodies.get(index)?;
            let input = self.inputs.get(index)?;
            Some((id, *body_ref, *input))
        })
    }

    /// Entities carrying a display tint.
    pub fn iter_tints(&self) -> impl Iterator<Item = (EntityId, Tint)> + '_ {
        self.live_ids()
            .filter_map(|id| self.tints.get(id.index as usize).map(|tint| (id, *tint)))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
