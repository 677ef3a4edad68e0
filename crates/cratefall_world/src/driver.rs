//! # Simulation Driver
//!
//! The fixed 60 Hz thread that owns the tick: gather movement intents
//! and body handles under the registry lock, step the integrator with no
//! lock held but its own, write poses back, and publish a packed
//! snapshot of the active bodies for the world stream.
//!
//! The registry lock is never held across the physics step — the step is
//! the longest operation of the tick and command handlers on the reactor
//! workers must not stall behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;

use crate::ecs::{EntityId, Registry};
use crate::math::Vec3;
use crate::nodes::player::SPAWN_POS;
use crate::physics::{BodyId, PhysicsWorld};
use crate::{SIM_DT, SIM_HZ};

/// Force scale applied per unit of movement intent.
pub const FORCE_MAGNITUDE: f32 = 25_000.0;

/// Bodies falling below this height are respawned at [`SPAWN_POS`].
const FLOOR_Y: f32 = -10.0;

/// Packed pose record streamed for every active body each tick.
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
#[repr(C)]
pub struct BodySnapshot {
    /// Wire id of the entity (see [`EntityId::to_bits`]).
    pub entity_id: u32,
    /// Position X.
    pub x: f32,
    /// Position Y.
    pub y: f32,
    /// Position Z.
    pub z: f32,
    /// Rotation X.
    pub rx: f32,
    /// Rotation Y.
    pub ry: f32,
    /// Rotation Z.
    pub rz: f32,
    /// Rotation W.
    pub rw: f32,
}

impl BodySnapshot {
    /// Packed size in bytes.
    pub const SIZE: usize = 32;
}

/// Everything the driver thread needs.
pub struct DriverContext {
    /// The entity registry, behind the process-wide registry lock.
    pub registry: Arc<Mutex<Registry>>,
    /// The integrator, behind its own collaborator lock.
    pub physics: Arc<Mutex<PhysicsWorld>>,
    /// Cleared to stop the driver.
    pub running: Arc<AtomicBool>,
    /// Receives the packed snapshot after each tick with active bodies.
    pub publish: Box<dyn Fn(Vec<u8>) + Send + Sync>,
}

/// Runs the driver loop until `running` clears.
///
/// Same deadline shape as the broadcast pump: the deadline advances by
/// exactly one tick interval per iteration, so cadence does not drift
/// with per-tick cost.
pub fn run_driver(ctx: &DriverContext) {
    tracing::info!(hz = SIM_HZ, "simulation driver started");
    let tick_interval = Duration::from_nanos(1_000_000_000 / u64::from(SIM_HZ));
    let mut deadline = Instant::now();

    while ctx.running.load(Ordering::Relaxed) {
        deadline += tick_interval;
        step_once(ctx);

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
    tracing::info!("simulation driver stopped");
}

/// One full tick: inputs → forces → step → write-back → publish.
pub fn step_once(ctx: &DriverContext) {
    // 1. Gather intents and body handles under the registry lock.
    let (targets, moves) = {
        let registry = ctx.registry.lock();
        let targets: Vec<(EntityId, BodyId)> = registry
            .iter_bodies()
            .map(|(entity, body_ref)| (entity, body_ref.body))
            .collect();
        let moves: Vec<(BodyId, f32, f32)> = registry
            .iter_body_inputs()
            .filter(|(_, _, input)| input.dx != 0.0 || input.dz != 0.0)
            .map(|(_, body_ref, input)| (body_ref.body, input.dx, input.dz))
            .collect();
        (targets, moves)
    };

    // 2. Advance the integrator; the registry lock is released.
    let poses = {
        let mut physics = ctx.physics.lock();
        for (body, dx, dz) in moves {
            physics.add_force(body, Vec3::new(dx * FORCE_MAGNITUDE, 0.0, dz * FORCE_MAGNITUDE));
            physics.activate(body);
        }
        physics.step(SIM_DT);

        let mut poses = Vec::with_capacity(targets.len());
        for (entity, body) in targets {
            let Some(mut position) = physics.position(body) else {
                continue;
            };
            if position.y < FLOOR_Y {
                physics.set_position(body, SPAWN_POS);
                physics.set_linear_velocity(body, Vec3::ZERO);
                position = SPAWN_POS;
            }
            let Some(rotation) = physics.rotation(body) else {
                continue;
            };
            poses.push((entity, position, rotation, physics.is_active(body)));
        }
        poses
    };

    // 3. Write poses back and snapshot the active bodies.
    let mut payload: Vec<BodySnapshot> = Vec::new();
    {
        let mut registry = ctx.registry.lock();
        for (entity, position, rotation, active) in poses {
            if !registry.is_valid(entity) {
                continue;
            }
            if let Some(transform) = registry.transforms.get_mut(entity.index() as usize) {
                transform.position = position;
                transform.rotation = rotation;
            }
            // Only bodies the integrator still considers active are
            // streamed; settled stacks cost no bandwidth.
            if active {
                payload.push(BodySnapshot {
                    entity_id: entity.to_bits(),
                    x: position.x,
                    y: position.y,
                    z: position.z,
                    rx: rotation.x,
                    ry: rotation.y,
                    rz: rotation.z,
                    rw: rotation.w,
                });
            }
        }
    }

    // 4. Publish outside both locks.
    if !payload.is_empty() {
        (ctx.publish)(bytemuck::cast_slice(&payload).to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::InputState;
    use crate::math::Quat;
    use crate::nodes::player;
    use crate::physics::Motion;

    fn test_context() -> (DriverContext, Arc<Mutex<Vec<Vec<u8>>>>) {
        let registry = Arc::new(Mutex::new(Registry::new(64)));
        let physics = Arc::new(Mutex::new(PhysicsWorld::new()));
        physics.lock().create_box(
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(100.0, 1.0, 100.0),
            Motion::Static,
            Quat::IDENTITY,
            0.9,
            0.0,
        );

        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        let ctx = DriverContext {
            registry,
            physics,
            running: Arc::new(AtomicBool::new(true)),
            publish: Box::new(move |bytes| sink.lock().push(bytes)),
        };
        (ctx, published)
    }

    #[test]
    fn test_snapshot_size() {
        assert_eq!(std::mem::size_of::<BodySnapshot>(), BodySnapshot::SIZE);
    }

    #[test]
    fn test_falling_body_is_streamed_then_settles_silent() {
        let (ctx, published) = test_context();
        let entity = {
            let mut registry = ctx.registry.lock();
            let mut physics = ctx.physics.lock();
            player::spawn(&mut registry, &mut physics, 1).unwrap()
        };

        step_once(&ctx);
        {
            let frames = published.lock();
            assert_eq!(frames.len(), 1, "falling avatar should be streamed");
            let records: &[BodySnapshot] = bytemuck::cast_slice(&frames[0]);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].entity_id, entity.to_bits());
        }

        // Let it land and fall asleep; publishes then stop.
        for _ in 0..400 {
            step_once(&ctx);
        }
        let count_settled = published.lock().len();
        step_once(&ctx);
        assert_eq!(published.lock().len(), count_settled, "asleep world stays silent");

        // Transform was mirrored back near the rest height.
        let registry = ctx.registry.lock();
        let transform = registry.transforms.get(entity.index() as usize).unwrap();
        assert!((transform.position.y - 1.0).abs() < 0.1);
    }

    #[test]
    fn test_input_applies_force() {
        let (ctx, _published) = test_context();
        let entity = {
            let mut registry = ctx.registry.lock();
            let mut physics = ctx.physics.lock();
            player::spawn(&mut registry, &mut physics, 1).unwrap()
        };
        // Land first.
        for _ in 0..400 {
            step_once(&ctx);
        }

        ctx.registry.lock().inputs.set(
            entity.index() as usize,
            InputState {
                dx: 1.0,
                dy: 0.0,
                dz: 0.0,
            },
        );
        for _ in 0..30 {
            step_once(&ctx);
        }

        let registry = ctx.registry.lock();
        let transform = registry.transforms.get(entity.index() as usize).unwrap();
        assert!(
            transform.position.x > 0.5,
            "avatar should drift under input, x={}",
            transform.position.x
        );
    }

    #[test]
    fn test_fallen_body_respawns() {
        let (ctx, _published) = test_context();
        let entity = {
            let mut registry = ctx.registry.lock();
            let mut physics = ctx.physics.lock();
            player::spawn(&mut registry, &mut physics, 1).unwrap()
        };
        let body = ctx
            .registry
            .lock()
            .bodies
            .get(entity.index() as usize)
            .unwrap()
            .body;
        ctx.physics.lock().set_position(body, Vec3::new(50.0, -30.0, 0.0));

        step_once(&ctx);

        let pos = ctx.physics.lock().position(body).unwrap();
        assert_eq!(pos.x, SPAWN_POS.x);
        assert!((pos.y - SPAWN_POS.y).abs() < 0.5);
    }
}
