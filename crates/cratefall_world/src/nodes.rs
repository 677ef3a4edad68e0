//! # Node Builders
//!
//! Canned entity+body assemblies: player avatars and the crate wall the
//! sandbox boots with.

use crate::ecs::{BodyRef, EntityId, InputState, PlayerTag, Registry, Tint, Transform};
use crate::math::{Quat, Vec3};
use crate::physics::{Motion, PhysicsWorld};

/// Player avatars: dynamic unit spheres owned by one connection.
pub mod player {
    use super::{
        BodyRef, EntityId, InputState, Motion, PhysicsWorld, PlayerTag, Registry, Tint, Transform,
        Vec3,
    };

    /// Spawn position for new avatars.
    pub const SPAWN_POS: Vec3 = Vec3::new(0.0, 5.0, 0.0);

    /// Spawns an avatar for `connection`, or `None` when the registry is
    /// full.
    pub fn spawn(
        registry: &mut Registry,
        physics: &mut PhysicsWorld,
        connection: i32,
    ) -> Option<EntityId> {
        let entity = registry.spawn()?;
        let body = physics.create_sphere(SPAWN_POS, 1.0, Motion::Dynamic);

        let index = entity.index() as usize;
        registry.players.set(index, PlayerTag { connection });
        registry.bodies.set(index, BodyRef { body });
        registry.transforms.set(
            index,
            Transform {
                position: SPAWN_POS,
                ..Transform::default()
            },
        );
        registry.inputs.set(index, InputState::default());
        registry.tints.set(
            index,
            Tint {
                r: rand::random::<f32>(),
                g: rand::random::<f32>(),
                b: rand::random::<f32>(),
                a: 1.0,
            },
        );

        tracing::info!(connection, entity = entity.to_bits(), "player avatar spawned");
        Some(entity)
    }

    /// Destroys an avatar's body and entity. Stale ids are a no-op.
    pub fn despawn(registry: &mut Registry, physics: &mut PhysicsWorld, entity: EntityId) -> bool {
        if !registry.is_valid(entity) {
            return false;
        }
        if let Some(body_ref) = registry.bodies.get(entity.index() as usize) {
            physics.destroy(body_ref.body);
        }
        registry.despawn(entity)
    }
}

/// The crate wall: a grid of dynamic unit boxes.
pub mod crates {
    use super::{BodyRef, Motion, PhysicsWorld, Quat, Registry, Tint, Transform, Vec3};

    /// Gap between crates at spawn, avoiding initial overlap jitter.
    const SPACING: f32 = 0.01;

    /// Crate edge length.
    const SIZE: f32 = 1.0;

    /// Spawns a `rows × cols × height` wall of crates starting at
    /// `origin`. Stops early if the registry fills up.
    pub fn spawn_wall(
        registry: &mut Registry,
        physics: &mut PhysicsWorld,
        origin: Vec3,
        rows: u32,
        cols: u32,
        height: u32,
    ) {
        let mut spawned = 0u32;
        for level in 0..height {
            for row in 0..rows {
                for col in 0..cols {
                    let Some(entity) = registry.spawn() else {
                        tracing::warn!(spawned, "registry full while building crate wall");
                        return;
                    };

                    #[allow(clippy::cast_precision_loss)]
                    let position = origin
                        + Vec3::new(
                            row as f32 * (SIZE + SPACING),
                            level as f32 * SIZE + SIZE * 0.5,
                            col as f32 * (SIZE + SPACING),
                        );
                    let body = physics.create_box(
                        position,
                        Vec3::new(SIZE * 0.5, SIZE * 0.5, SIZE * 0.5),
                        Motion::Dynamic,
                        Quat::IDENTITY,
                        0.9,
                        10.0,
                    );

                    let index = entity.index() as usize;
                    registry.bodies.set(index, BodyRef { body });
                    registry.transforms.set(
                        index,
                        Transform {
                            position,
                            ..Transform::default()
                        },
                    );
                    registry.tints.set(
                        index,
                        Tint {
                            r: 0.6,
                            g: 0.4,
                            b: 0.2,
                            a: 1.0,
                        },
                    );
                    spawned += 1;
                }
            }
        }
        tracing::info!(spawned, "crate wall built");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_spawn_and_despawn() {
        let mut registry = Registry::new(16);
        let mut physics = PhysicsWorld::new();

        let entity = player::spawn(&mut registry, &mut physics, 42).unwrap();
        assert!(registry.is_valid(entity));
        assert_eq!(physics.body_count(), 1);
        let index = entity.index() as usize;
        assert_eq!(registry.players.get(index).unwrap().connection, 42);
        assert!(registry.tints.has(index));
        assert!(registry.inputs.has(index));

        assert!(player::despawn(&mut registry, &mut physics, entity));
        assert!(!registry.is_valid(entity));
        assert_eq!(physics.body_count(), 0);
        assert!(!player::despawn(&mut registry, &mut physics, entity));
    }

    #[test]
    fn test_crate_wall_counts() {
        let mut registry = Registry::new(128);
        let mut physics = PhysicsWorld::new();

        crates::spawn_wall(
            &mut registry,
            &mut physics,
            Vec3::new(-5.0, 0.0, 10.0),
            10,
            1,
            5,
        );
        assert_eq!(registry.alive_count(), 50);
        assert_eq!(physics.body_count(), 50);
        assert_eq!(registry.iter_tints().count(), 50);
    }
}
