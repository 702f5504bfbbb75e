//! Scene state consumed by the renderer.
//!
//! - First-person camera shared by every render pipeline
//! - Transform component
//! - Entity registry read during command recording

pub mod camera;
pub mod registry;
pub mod transform;

pub use camera::{Camera, FirstPersonCamera};
pub use registry::{Entity, MeshId, MeshRenderer, Registry, SceneError};
pub use transform::Transform;
