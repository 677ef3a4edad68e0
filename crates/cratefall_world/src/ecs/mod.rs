//! # Entity Registry
//!
//! A compact generational-index ECS: entities are slot indices with
//! generation counters, components live in per-type tables indexed by
//! slot. All storage is pre-allocated at construction; spawn and despawn
//! recycle slots without allocating.
//!
//! Concurrency is external by design: every caller — command handlers
//! and the simulation driver alike — goes through one process-wide
//! registry mutex. The registry itself is single-threaded data.

mod component;
mod entity;
mod registry;
mod storage;

pub use component::{BodyRef, InputState, PlayerTag, Tint, Transform};
pub use entity::EntityId;
pub use registry::Registry;
pub use storage::ComponentStorage;
