//! # Rigid-Body Integrator
//!
//! The narrow simulator contract the driver and gameplay handlers
//! consume: create and destroy bodies, apply forces, step, read poses.
//!
//! ## Model
//!
//! Semi-implicit Euler under gravity with one resolution pass per step:
//! dynamic bodies collide against static geometry and against each other
//! on the axis of least overlap, with restitution, tangential friction
//! damping, and a resting-contact cutoff so stacks settle instead of
//! jittering. Bodies whose speed stays under a threshold for a run of
//! ticks fall asleep and cost nothing until a force or contact wakes
//! them. Boxes do not tumble: orientation is fixed at creation (identity,
//! or the ramp angle for scene geometry).

use crate::math::{Quat, Vec3};

/// Downward pull applied to every dynamic body.
pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

/// Speed below which a body is considered idle.
const SLEEP_VELOCITY_EPS: f32 = 0.05;

/// Consecutive idle ticks before a body falls asleep.
const SLEEP_TICKS: u32 = 30;

/// Contact speed under which restitution is dropped (resting contact).
const RESTING_VELOCITY: f32 = 0.5;

/// Impulse speed above which a sleeping contact partner is woken.
const WAKE_VELOCITY: f32 = 0.2;

/// Handle to a body in the [`PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyId {
    index: u32,
    generation: u32,
}

impl BodyId {
    /// Invalid/null body id.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Returns true if this is the null id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }
}

/// Motion classification of a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    /// Immovable scene geometry.
    Static,
    /// Simulated body.
    Dynamic,
}

/// Collision shape of a body.
#[derive(Clone, Copy, Debug)]
pub enum Shape {
    /// Sphere of the given radius.
    Sphere {
        /// Radius in meters.
        radius: f32,
    },
    /// Axis-aligned box of the given half extents.
    Box {
        /// Half extents in meters.
        half_extents: Vec3,
    },
}

impl Shape {
    fn half_extents(self) -> Vec3 {
        match self {
            Self::Sphere { radius } => Vec3::new(radius, radius, radius),
            Self::Box { half_extents } => half_extents,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Body {
    shape: Shape,
    motion: Motion,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    force: Vec3,
    mass: f32,
    restitution: f32,
    friction: f32,
    active: bool,
    idle_ticks: u32,
}

struct BodySlot {
    generation: u32,
    body: Option<Body>,
}

/// The simulated world: slot-allocated bodies plus gravity.
pub struct PhysicsWorld {
    slots: Vec<BodySlot>,
    free: Vec<u32>,
}

impl PhysicsWorld {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, body: Body) -> BodyId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            return BodyId {
                index,
                generation: slot.generation,
            };
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(BodySlot {
            generation: 0,
            body: Some(body),
        });
        BodyId {
            index,
            generation: 0,
        }
    }

    /// Creates a sphere body. Dynamic spheres start active.
    ///
    /// Mass approximates a unit-density solid sphere, so the gameplay
    /// force scale produces sane accelerations.
    pub fn create_sphere(&mut self, position: Vec3, radius: f32, motion: Motion) -> BodyId {
        self.insert(Body {
            shape: Shape::Sphere { radius },
            motion,
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: 500.0 * radius * radius * radius,
            restitution: 0.1,
            friction: 0.5,
            active: motion == Motion::Dynamic,
            idle_ticks: 0,
        })
    }

    /// Creates a box body with explicit friction and mass.
    ///
    /// The rotation is cosmetic for static geometry (ramps); collision
    /// uses the axis-aligned extents.
    pub fn create_box(
        &mut self,
        position: Vec3,
        half_extents: Vec3,
        motion: Motion,
        rotation: Quat,
        friction: f32,
        mass: f32,
    ) -> BodyId {
        self.insert(Body {
            shape: Shape::Box { half_extents },
            motion,
            position,
            rotation,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: mass.max(f32::EPSILON),
            restitution: 0.1,
            friction,
            active: motion == Motion::Dynamic,
            idle_ticks: 0,
        })
    }

    /// Removes a body. Returns false for stale handles.
    pub fn destroy(&mut self, id: BodyId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.body = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    fn slot_mut(&mut self, id: BodyId) -> Option<&mut BodySlot> {
        let slot = self.slots.get_mut(id.index as usize)?;
        (slot.generation == id.generation && slot.body.is_some()).then_some(slot)
    }

    fn body(&self, id: BodyId) -> Option<&Body> {
        let slot = self.slots.get(id.index as usize)?;
        (slot.generation == id.generation)
            .then_some(slot.body.as_ref())
            .flatten()
    }

    fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.slot_mut(id)?.body.as_mut()
    }

    /// Number of live bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.body.is_some()).count()
    }

    /// World-space position of a body.
    #[must_use]
    pub fn position(&self, id: BodyId) -> Option<Vec3> {
        self.body(id).map(|body| body.position)
    }

    /// Orientation of a body.
    #[must_use]
    pub fn rotation(&self, id: BodyId) -> Option<Quat> {
        self.body(id).map(|body| body.rotation)
    }

    /// Teleports a body and wakes it.
    pub fn set_position(&mut self, id: BodyId, position: Vec3) {
        if let Some(body) = self.body_mut(id) {
            body.position = position;
            body.active = body.motion == Motion::Dynamic;
            body.idle_ticks = 0;
        }
    }

    /// Overwrites a body's linear velocity.
    pub fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3) {
        if let Some(body) = self.body_mut(id) {
            body.velocity = velocity;
        }
    }

    /// Accumulates a force for the next step.
    pub fn add_force(&mut self, id: BodyId, force: Vec3) {
        if let Some(body) = self.body_mut(id) {
            body.force += force;
        }
    }

    /// Wakes a sleeping dynamic body.
    pub fn activate(&mut self, id: BodyId) {
        if let Some(body) = self.body_mut(id) {
            if body.motion == Motion::Dynamic {
                body.active = true;
                body.idle_ticks = 0;
            }
        }
    }

    /// Returns true while a dynamic body is awake. Static bodies and
    /// stale handles report false.
    #[must_use]
    pub fn is_active(&self, id: BodyId) -> bool {
        self.body(id).is_some_and(|body| body.active)
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integrate(dt);
        self.resolve_collisions();
        self.update_sleep();
    }

    fn integrate(&mut self, dt: f32) {
        for slot in &mut self.slots {
            let Some(body) = slot.body.as_mut() else {
                continue;
            };
            if body.motion != Motion::Dynamic || !body.active {
                body.force = Vec3::ZERO;
                continue;
            }
            let acceleration = GRAVITY + body.force.scaled(1.0 / body.mass);
            body.velocity += acceleration.scaled(dt);
            body.position += body.velocity.scaled(dt);
            body.force = Vec3::ZERO;
        }
    }

    /// One positional-correction pass: awake dynamic bodies against
    /// static geometry, then awake dynamic pairs.
    fn resolve_collisions(&mut self) {
        let count = self.slots.len();
        for a in 0..count {
            let Some(body_a) = self.slots[a].body else {
                continue;
            };
            if body_a.motion != Motion::Dynamic || !body_a.active {
                continue;
            }
            for b in 0..count {
                if a == b {
                    continue;
                }
                let Some(body_b) = self.slots[b].body else {
                    continue;
                };
                // Dynamic pairs are resolved once, from the lower index;
                // sleeping partners are treated as immovable but can be
                // woken by a hard contact.
                if body_b.motion == Motion::Dynamic && body_b.active && b < a {
                    continue;
                }
                self.resolve_pair(a, b);
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn resolve_pair(&mut self, a: usize, b: usize) {
        let (Some(mut body_a), Some(mut body_b)) = (self.slots[a].body, self.slots[b].body)
        else {
            return;
        };

        let ext_a = body_a.shape.half_extents();
        let ext_b = body_b.shape.half_extents();
        let delta = body_a.position - body_b.position;

        let overlap_x = ext_a.x + ext_b.x - delta.x.abs();
        let overlap_y = ext_a.y + ext_b.y - delta.y.abs();
        let overlap_z = ext_a.z + ext_b.z - delta.z.abs();
        if overlap_x <= 0.0 || overlap_y <= 0.0 || overlap_z <= 0.0 {
            return;
        }

        // Minimal translation axis and outward direction for body A.
        let (axis, overlap) = if overlap_x <= overlap_y && overlap_x <= overlap_z {
            (0, overlap_x)
        } else if overlap_y <= overlap_z {
            (1, overlap_y)
        } else {
            (2, overlap_z)
        };
        let sign = match axis {
            0 => delta.x.signum(),
            1 => delta.y.signum(),
            _ => delta.z.signum(),
        };

        let b_movable =
            body_b.motion == Motion::Dynamic && body_b.active;

        // Positional correction.
        let (push_a, push_b) = if b_movable {
            (overlap * 0.5, overlap * 0.5)
        } else {
            (overlap, 0.0)
        };
        match axis {
            0 => {
                body_a.position.x += sign * push_a;
                body_b.position.x -= sign * push_b;
            }
            1 => {
                body_a.position.y += sign * push_a;
                body_b.position.y -= sign * push_b;
            }
            _ => {
                body_a.position.z += sign * push_a;
                body_b.position.z -= sign * push_b;
            }
        }

        // Velocity response along the contact axis.
        let (vn_a, vn_b) = match axis {
            0 => (body_a.velocity.x, body_b.velocity.x),
            1 => (body_a.velocity.y, body_b.velocity.y),
            _ => (body_a.velocity.z, body_b.velocity.z),
        };
        let closing = (vn_a - vn_b) * sign;
        if closing < 0.0 {
            let restitution = if closing.abs() < RESTING_VELOCITY {
                0.0
            } else {
                body_a.restitution.min(body_b.restitution)
            };

            let (new_a, new_b) = if b_movable {
                // Impulse exchange between two awake dynamic bodies.
                let inv_a = 1.0 / body_a.mass;
                let inv_b = 1.0 / body_b.mass;
                let impulse = -(1.0 + restitution) * closing / (inv_a + inv_b);
                (vn_a + sign * impulse * inv_a, vn_b - sign * impulse * inv_b)
            } else {
                // Immovable partner: reflect (or kill) A's normal speed,
                // and wake a sleeping partner on a hard hit.
                if body_b.motion == Motion::Dynamic && closing.abs() > WAKE_VELOCITY {
                    body_b.active = true;
                    body_b.idle_ticks = 0;
                }
                (-vn_a * restitution, vn_b)
            };
            match axis {
                0 => {
                    body_a.velocity.x = new_a;
                    body_b.velocity.x = new_b;
                }
                1 => {
                    body_a.velocity.y = new_a;
                    body_b.velocity.y = new_b;
                }
                _ => {
                    body_a.velocity.z = new_a;
                    body_b.velocity.z = new_b;
                }
            }

            // Tangential friction damping.
            let damp = (1.0 - body_a.friction.max(body_b.friction) * 0.2).clamp(0.0, 1.0);
            match axis {
                0 => {
                    body_a.velocity.y *= damp;
                    body_a.velocity.z *= damp;
                }
                1 => {
                    body_a.velocity.x *= damp;
                    body_a.velocity.z *= damp;
                }
                _ => {
                    body_a.velocity.x *= damp;
                    body_a.velocity.y *= damp;
                }
            }
        }

        self.slots[a].body = Some(body_a);
        self.slots[b].body = Some(body_b);
    }

    fn update_sleep(&mut self) {
        for slot in &mut self.slots {
            let Some(body) = slot.body.as_mut() else {
                continue;
            };
            if body.motion != Motion::Dynamic || !body.active {
                continue;
            }
            if body.velocity.length() < SLEEP_VELOCITY_EPS {
                body.idle_ticks += 1;
                if body.idle_ticks >= SLEEP_TICKS {
                    body.active = false;
                    body.velocity = Vec3::ZERO;
                }
            } else {
                body.idle_ticks = 0;
            }
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SIM_DT;

    fn world_with_ground() -> (PhysicsWorld, BodyId) {
        let mut world = PhysicsWorld::new();
        let ground = world.create_box(
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(100.0, 1.0, 100.0),
            Motion::Static,
            Quat::IDENTITY,
            0.9,
            0.0,
        );
        (world, ground)
    }

    fn settle(world: &mut PhysicsWorld, ticks: u32) {
        for _ in 0..ticks {
            world.step(SIM_DT);
        }
    }

    #[test]
    fn test_sphere_falls_rests_and_sleeps() {
        let (mut world, ground) = world_with_ground();
        let sphere = world.create_sphere(Vec3::new(0.0, 5.0, 0.0), 1.0, Motion::Dynamic);
        assert!(world.is_active(sphere));
        assert!(!world.is_active(ground));

        settle(&mut world, 300);

        let pos = world.position(sphere).unwrap();
        assert!((pos.y - 1.0).abs() < 0.1, "rest height was {}", pos.y);
        assert!(!world.is_active(sphere), "sphere should be asleep at rest");
    }

    #[test]
    fn test_force_wakes_and_moves() {
        let (mut world, _ground) = world_with_ground();
        let sphere = world.create_sphere(Vec3::new(0.0, 1.0, 0.0), 1.0, Motion::Dynamic);
        settle(&mut world, 300);
        assert!(!world.is_active(sphere));

        world.add_force(sphere, Vec3::new(100_000.0, 0.0, 0.0));
        world.activate(sphere);
        settle(&mut world, 10);

        let pos = world.position(sphere).unwrap();
        assert!(pos.x > 0.1, "force should displace the sphere, x={}", pos.x);
    }

    #[test]
    fn test_stacked_boxes_settle_without_overlap() {
        let (mut world, _ground) = world_with_ground();
        let half = Vec3::new(0.5, 0.5, 0.5);
        let lower = world.create_box(
            Vec3::new(0.0, 0.6, 0.0),
            half,
            Motion::Dynamic,
            Quat::IDENTITY,
            0.9,
            10.0,
        );
        let upper = world.create_box(
            Vec3::new(0.0, 1.8, 0.0),
            half,
            Motion::Dynamic,
            Quat::IDENTITY,
            0.9,
            10.0,
        );

        settle(&mut world, 600);

        let low = world.position(lower).unwrap();
        let high = world.position(upper).unwrap();
        assert!((low.y - 0.5).abs() < 0.15, "lower rest y={}", low.y);
        assert!((high.y - low.y - 1.0).abs() < 0.15, "stack gap {}", high.y - low.y);
    }

    #[test]
    fn test_destroy_invalidates_handle() {
        let mut world = PhysicsWorld::new();
        let id = world.create_sphere(Vec3::ZERO, 1.0, Motion::Dynamic);
        assert_eq!(world.body_count(), 1);
        assert!(world.destroy(id));
        assert!(!world.destroy(id));
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.position(id), None);

        let next = world.create_sphere(Vec3::ZERO, 1.0, Motion::Dynamic);
        assert_ne!(next, id);
        assert!(world.position(next).is_some());
    }

    #[test]
    fn test_teleport_resets_motion() {
        let (mut world, _ground) = world_with_ground();
        let sphere = world.create_sphere(Vec3::new(0.0, -20.0, 0.0), 1.0, Motion::Dynamic);
        world.set_position(sphere, Vec3::new(0.0, 5.0, 0.0));
        world.set_linear_velocity(sphere, Vec3::ZERO);
        assert!(world.is_active(sphere));
        assert_eq!(world.position(sphere).unwrap().y, 5.0);
    }
}
