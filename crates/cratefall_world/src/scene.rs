//! # Scene Manager
//!
//! Loads the static world layout from a JSON scene file and instantiates
//! it in the integrator. The raw JSON text is kept verbatim: the asset
//! manifest endpoint serves it to clients so they can build the same
//! scene visually.

use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::math::{Quat, Vec3};
use crate::physics::{Motion, PhysicsWorld};

fn default_half_extent() -> f32 {
    1.0
}

/// Immovable floor slab.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GroundNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Center position `[x, y, z]`.
    #[serde(default)]
    pub position: [f32; 3],
    /// Half extent along X.
    #[serde(default = "default_half_extent")]
    pub half_extent_x: f32,
    /// Half extent along Y.
    #[serde(default = "default_half_extent")]
    pub half_extent_y: f32,
    /// Half extent along Z.
    #[serde(default = "default_half_extent")]
    pub half_extent_z: f32,
}

/// Box obstacle, static by default.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BoxNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Center position `[x, y, z]`.
    #[serde(default)]
    pub position: [f32; 3],
    /// Half extent along X.
    #[serde(default = "default_half_extent")]
    pub half_extent_x: f32,
    /// Half extent along Y.
    #[serde(default = "default_half_extent")]
    pub half_extent_y: f32,
    /// Half extent along Z.
    #[serde(default = "default_half_extent")]
    pub half_extent_z: f32,
    /// Simulated when true, scenery when false.
    #[serde(default)]
    pub is_dynamic: bool,
}

/// Inclined static slab.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RampNode {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Center position `[x, y, z]`.
    #[serde(default)]
    pub position: [f32; 3],
    /// Half extent along X.
    #[serde(default = "default_half_extent")]
    pub half_extent_x: f32,
    /// Half extent along Y.
    #[serde(default = "default_half_extent")]
    pub half_extent_y: f32,
    /// Half extent along Z.
    #[serde(default = "default_half_extent")]
    pub half_extent_z: f32,
    /// Incline about the X axis, degrees.
    #[serde(default)]
    pub angle_x_degrees: f32,
}

/// One entry of the scene's `nodes` array, discriminated by `type`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SceneNode {
    /// Floor slab.
    Ground(GroundNode),
    /// Box obstacle.
    Box(BoxNode),
    /// Inclined slab.
    Ramp(RampNode),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct SceneFile {
    nodes: Vec<SceneNode>,
}

/// Parsed scene plus the raw JSON served as the asset manifest.
pub struct SceneManager {
    raw_json: String,
    file: SceneFile,
}

impl SceneManager {
    /// Loads and parses a scene file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid scene JSON.
    pub fn load_from_file(path: &str) -> Result<Self, WorldError> {
        let raw = std::fs::read_to_string(path).map_err(|source| WorldError::SceneRead {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(raw)
    }

    /// Parses a scene from JSON text.
    ///
    /// # Errors
    ///
    /// Fails when the text is not valid scene JSON.
    pub fn from_json(raw_json: String) -> Result<Self, WorldError> {
        let file: SceneFile = serde_json::from_str(&raw_json)?;
        tracing::info!(nodes = file.nodes.len(), "scene configuration parsed");
        Ok(Self { raw_json, file })
    }

    /// Built-in fallback: a bare 200×200 ground plane.
    #[must_use]
    pub fn fallback() -> Self {
        let raw = serde_json::json!({
            "nodes": [{
                "type": "Ground",
                "name": "fallback-ground",
                "position": [0.0, -1.0, 0.0],
                "half_extent_x": 100.0,
                "half_extent_y": 1.0,
                "half_extent_z": 100.0,
            }]
        })
        .to_string();
        Self::from_json(raw).expect("fallback scene is well-formed")
    }

    /// Raw manifest text, exactly as loaded.
    #[must_use]
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }

    /// Parsed nodes in file order.
    #[must_use]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.file.nodes
    }

    /// Instantiates every node in the integrator.
    pub fn create_all(&self, physics: &mut PhysicsWorld) {
        for node in &self.file.nodes {
            match node {
                SceneNode::Ground(ground) => {
                    physics.create_box(
                        Vec3::new(ground.position[0], ground.position[1], ground.position[2]),
                        Vec3::new(
                            ground.half_extent_x,
                            ground.half_extent_y,
                            ground.half_extent_z,
                        ),
                        Motion::Static,
                        Quat::IDENTITY,
                        0.9,
                        0.0,
                    );
                    tracing::debug!(name = %ground.name, "created ground node");
                }
                SceneNode::Box(node) => {
                    let motion = if node.is_dynamic {
                        Motion::Dynamic
                    } else {
                        Motion::Static
                    };
                    physics.create_box(
                        Vec3::new(node.position[0], node.position[1], node.position[2]),
                        Vec3::new(node.half_extent_x, node.half_extent_y, node.half_extent_z),
                        motion,
                        Quat::IDENTITY,
                        0.8,
                        if node.is_dynamic { 10.0 } else { 0.0 },
                    );
                    tracing::debug!(name = %node.name, dynamic = node.is_dynamic, "created box node");
                }
                SceneNode::Ramp(ramp) => {
                    physics.create_box(
                        Vec3::new(ramp.position[0], ramp.position[1], ramp.position[2]),
                        Vec3::new(ramp.half_extent_x, ramp.half_extent_y, ramp.half_extent_z),
                        Motion::Static,
                        Quat::from_rotation_x(ramp.angle_x_degrees.to_radians()),
                        0.9,
                        0.0,
                    );
                    tracing::debug!(name = %ramp.name, "created ramp node");
                }
            }
        }
    }
}
