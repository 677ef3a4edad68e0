//! # Cratefall World
//!
//! The world-side collaborators consumed by the server core through
//! narrow contracts:
//!
//! - **Entity registry** ([`ecs`]): generational-index entity storage with
//!   per-component tables, accessed under one process-wide registry lock.
//! - **Rigid-body integrator** ([`physics`]): spheres and boxes under
//!   gravity with static-geometry collision, force application, and a
//!   sleep policy; `step(dt)` advances everything.
//! - **Scene manager** ([`scene`]): JSON scene files describing the static
//!   world (ground, ramps, boxes) plus the raw text served to clients as
//!   an asset manifest.
//! - **Node builders** ([`nodes`]): player avatars and the crate wall.
//! - **Simulation driver** ([`driver`]): the fixed 60 Hz thread that
//!   gathers inputs, steps the integrator outside the registry lock, and
//!   publishes packed snapshots of the active bodies.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod driver;
pub mod ecs;
pub mod error;
pub mod math;
pub mod nodes;
pub mod physics;
pub mod scene;

pub use driver::{run_driver, BodySnapshot, DriverContext};
pub use ecs::{EntityId, Registry};
pub use error::WorldError;
pub use math::{Quat, Vec3};
pub use physics::{BodyId, Motion, PhysicsWorld, Shape};
pub use scene::SceneManager;

/// Simulation cadence shared with the broadcast pump (ticks per second).
pub const SIM_HZ: u32 = 60;

/// Fixed timestep fed to the integrator each tick.
pub const SIM_DT: f32 = 1.0 / SIM_HZ as f32;
