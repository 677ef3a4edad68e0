//! # Component Types
//!
//! The component set the gameplay handlers and the simulation driver work
//! with. Plain data; behavior lives in the driver and the integrator.

use crate::math::{Quat, Vec3};
use crate::physics::BodyId;

/// World-space pose mirrored back from the integrator each tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transform {
    /// Position.
    pub position: Vec3,
    /// Orientation.
    pub rotation: Quat,
}

/// Link to the entity's rigid body.
#[derive(Clone, Copy, Debug)]
pub struct BodyRef {
    /// Handle into the physics world.
    pub body: BodyId,
}

/// Latest movement intent received from the owning client.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    /// Desired X force direction.
    pub dx: f32,
    /// Desired Y force direction (unused by the driver, kept on the wire).
    pub dy: f32,
    /// Desired Z force direction.
    pub dz: f32,
}

/// Display color streamed to clients as entity metadata.
#[derive(Clone, Copy, Debug)]
pub struct Tint {
    /// Red, 0..=1.
    pub r: f32,
    /// Green, 0..=1.
    pub g: f32,
    /// Blue, 0..=1.
    pub b: f32,
    /// Alpha, 0..=1.
    pub a: f32,
}

/// Marks a player avatar and records the owning connection handle.
#[derive(Clone, Copy, Debug)]
pub struct PlayerTag {
    /// Raw connection handle (file descriptor) that owns this avatar.
    pub connection: i32,
}
