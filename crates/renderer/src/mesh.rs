//! GPU meshes referenced by [`MeshRenderer`](sable_scene::MeshRenderer) components.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use sable_rhi::buffer::{Buffer, BufferUsage};
use sable_rhi::device::Device;
use sable_rhi::vertex::Vertex;
use sable_rhi::{RhiError, RhiResult};
use sable_scene::MeshId;

/// Vertex and index buffers of one mesh.
pub struct GpuMesh {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
}

impl GpuMesh {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_buffer.len()
    }
}

/// Meshes uploaded so far, keyed by id.
#[derive(Default)]
pub struct MeshLibrary {
    meshes: BTreeMap<MeshId, GpuMesh>,
    next_id: u32,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload a triangle list.
    ///
    /// # Errors
    ///
    /// Empty input, an index outside `vertices`, or buffer allocation failure.
    pub fn upload(
        &mut self,
        device: &Arc<Device>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> RhiResult<MeshId> {
        validate_mesh(vertices, indices)?;

        let vertex_buffer = Buffer::with_data(device.clone(), BufferUsage::Vertex, vertices)?;
        let index_buffer = Buffer::with_data(device.clone(), BufferUsage::Index, indices)?;

        let id = MeshId(self.next_id);
        self.next_id += 1;
        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                index_buffer,
            },
        );
        debug!(
            "Uploaded mesh {:?}: {} vertices, {} indices",
            id,
            vertices.len(),
            indices.len()
        );
        Ok(id)
    }

    pub fn get(&self, id: MeshId) -> Option<&GpuMesh> {
        self.meshes.get(&id)
    }

    /// Drop a mesh. The GPU must not be using it.
    pub fn remove(&mut self, id: MeshId) -> bool {
        self.meshes.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}

fn validate_mesh(vertices: &[Vertex], indices: &[u32]) -> RhiResult<()> {
    if vertices.is_empty() || indices.is_empty() {
        return Err(RhiError::PipelineError(String::from("mesh has no geometry")));
    }
    if indices.len() % 3 != 0 {
        return Err(RhiError::PipelineError(format!(
            "mesh index count {} is not a triangle list",
            indices.len()
        )));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(RhiError::PipelineError(format!(
            "mesh index {} out of range for {} vertices",
            bad,
            vertices.len()
        )));
    }
    Ok(())
}

/// Axis-aligned cube centered on the origin with edge length `size`.
///
/// Four vertices per face so each face keeps a flat normal; faces wind
/// counter-clockwise seen from outside.
pub fn cube(size: f32, color: Vec3) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    // (normal, u axis, v axis) with u x v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + u * su + v * sv) * h;
            vertices.push(Vertex::new(position, normal, color));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let (vertices, indices) = cube(1.0, Vec3::ONE);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(validate_mesh(&vertices, &indices).is_ok());
    }

    #[test]
    fn test_cube_bounds() {
        let (vertices, _) = cube(2.0, Vec3::ONE);
        for v in &vertices {
            assert!(v.position.abs().max_element() <= 1.0 + 1e-6);
            assert!((v.position.abs().max_element() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let (vertices, indices) = cube(1.0, Vec3::ONE);
        for tri in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| vertices[tri[i] as usize]);
            let face_normal = (b.position - a.position).cross(c.position - a.position);
            assert!(face_normal.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn test_validate_rejects_bad_meshes() {
        let (vertices, _) = cube(1.0, Vec3::ONE);
        assert!(validate_mesh(&[], &[0, 1, 2]).is_err());
        assert!(validate_mesh(&vertices, &[0, 1]).is_err());
        assert!(validate_mesh(&vertices, &[0, 1, 24]).is_err());
    }

    #[test]
    fn test_empty_library() {
        let library = MeshLibrary::new();
        assert!(library.is_empty());
        assert!(library.get(MeshId(0)).is_none());
    }
}
