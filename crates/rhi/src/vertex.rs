//! Vertex layout shared by mesh uploads and the geometry pipeline.

use std::mem::offset_of;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved mesh vertex.
///
/// | location | field    | format            |
/// |----------|----------|-------------------|
/// | 0        | position | `R32G32B32_SFLOAT` |
/// | 1        | normal   | `R32G32B32_SFLOAT` |
/// | 2        | color    | `R32G32B32_SFLOAT` |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        let attribute = |location, offset: usize| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset as u32,
        };
        [
            attribute(0, offset_of!(Vertex, position)),
            attribute(1, offset_of!(Vertex, normal)),
            attribute(2, offset_of!(Vertex, color)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // 3 x Vec3 = 36 bytes, no padding
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
    }

    #[test]
    fn test_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 36);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_offsets() {
        let attrs = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        let locations: Vec<u32> = attrs.iter().map(|a| a.location).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(locations, vec![0, 1, 2]);
    }

    #[test]
    fn test_vertex_is_pod() {
        let v = Vertex::new(Vec3::X, Vec3::Y, Vec3::ONE);
        let bytes = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 36);
    }
}
