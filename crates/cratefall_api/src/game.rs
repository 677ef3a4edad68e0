//! # Gameplay Routes
//!
//! The sandbox endpoints: asset manifest, entity metadata, join, move,
//! and the world-state stream, plus the disconnect hook that reclaims a
//! subscriber's avatar.
//!
//! ## Locking
//!
//! Handlers take the collaborator locks in the documented order —
//! connection map, then physics, then registry — and never hold any of
//! them across I/O. The world-stream producer touches only the snapshot
//! slot (try-read), so it can never stall the pump behind the
//! simulation writer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use cratefall_server::{ConnectionId, Server, ServerError, SharedSnapshot};
use cratefall_world::ecs::InputState;
use cratefall_world::nodes::player;
use cratefall_world::{EntityId, PhysicsWorld, Registry};

use crate::payloads::{EntityMetadata, MoveRequest};

/// Which avatar each connection owns. Hook-local lock, taken before the
/// physics and registry locks.
type ConnectionMap = Arc<Mutex<HashMap<i32, EntityId>>>;

/// Registers `A` (assets), `E` (metadata), `J` (join), `M` (move), the
/// `W` world stream, and the avatar-reclaim disconnect hook.
///
/// # Errors
///
/// Propagates registration failures (reserved/colliding ids, started
/// server).
pub fn register_game_routes(
    server: &mut Server,
    registry: Arc<Mutex<Registry>>,
    physics: Arc<Mutex<PhysicsWorld>>,
    scene_json: String,
    snapshot: Arc<SharedSnapshot>,
) -> Result<(), ServerError> {
    let connections: ConnectionMap = Arc::new(Mutex::new(HashMap::new()));

    server.register_command(b'A', "GetAssets", 0, "", "json", move |_conn, _body| {
        scene_json.clone().into_bytes()
    })?;

    let meta_registry = Arc::clone(&registry);
    server.register_command(
        b'E',
        "GetEntitiesInfo",
        0,
        "",
        "metadata[]",
        move |_conn, _body| {
            let registry = meta_registry.lock();
            let metas: Vec<EntityMetadata> = registry
                .iter_tints()
                .map(|(entity, tint)| EntityMetadata {
                    entity_id: entity.to_bits(),
                    r: tint.r,
                    g: tint.g,
                    b: tint.b,
                    a: tint.a,
                })
                .collect();
            bytemuck::cast_slice(&metas).to_vec()
        },
    )?;

    let join_registry = Arc::clone(&registry);
    let join_physics = Arc::clone(&physics);
    let join_connections = Arc::clone(&connections);
    server.register_command(
        b'J',
        "JoinGame",
        0,
        "",
        "metadata",
        move |conn, _body| {
            let mut physics = join_physics.lock();
            let mut registry = join_registry.lock();
            let Some(entity) = player::spawn(&mut registry, &mut physics, conn.0) else {
                tracing::warn!(conn = conn.0, "join rejected: world is full");
                return Vec::new();
            };

            join_connections.lock().insert(conn.0, entity);

            let tint = registry
                .tints
                .get(entity.index() as usize)
                .copied()
                .expect("fresh avatar has a tint");
            let meta = EntityMetadata {
                entity_id: entity.to_bits(),
                r: tint.r,
                g: tint.g,
                b: tint.b,
                a: tint.a,
            };
            bytemuck::bytes_of(&meta).to_vec()
        },
    )?;

    let move_registry = Arc::clone(&registry);
    let move_connections = Arc::clone(&connections);
    server.register_command(
        b'M',
        "MoveEntity",
        4,
        "u32:entity|f32:x|f32:y|f32:z",
        "u32:status",
        move |conn, body| {
            if body.len() < MoveRequest::SIZE {
                return 0u32.to_le_bytes().to_vec();
            }
            let request: MoveRequest = bytemuck::pod_read_unaligned(&body[..MoveRequest::SIZE]);
            let entity = EntityId::from_bits(request.entity_id);

            // A connection may only steer its own avatar.
            {
                let connections = move_connections.lock();
                if let Some(owned) = connections.get(&conn.0) {
                    if *owned != entity {
                        tracing::warn!(conn = conn.0, "unauthorized move attempt");
                        return 0u32.to_le_bytes().to_vec();
                    }
                }
            }

            let mut registry = move_registry.lock();
            if !registry.is_valid(entity) {
                return 0u32.to_le_bytes().to_vec();
            }
            registry.inputs.set(
                entity.index() as usize,
                InputState {
                    dx: request.x,
                    dy: request.y,
                    dz: request.z,
                },
            );
            1u32.to_le_bytes().to_vec()
        },
    )?;

    server.register_stream(
        b'W',
        "WorldStream",
        32,
        "world_state",
        move || snapshot.try_read().unwrap_or_default(),
    )?;

    // Reclaim the avatar when the pump evicts its subscriber.
    server.on_disconnect(move |conn: ConnectionId| {
        let Some(entity) = connections.lock().remove(&conn.0) else {
            return;
        };
        tracing::info!(conn = conn.0, entity = entity.to_bits(), "reclaiming avatar");
        let mut physics = physics.lock();
        let mut registry = registry.lock();
        player::despawn(&mut registry, &mut physics, entity);
    })?;

    Ok(())
}
