//! Vertex format and quad geometry
//!
//! A vertex is a 2D position followed by an RGB color, matching the inputs of
//! `quad.vert`. Indices are `u16`.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use std::mem;

/// Vertex data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub pos: [f32; 2],
    /// Linear RGB color
    pub color: [f32; 3],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(pos: [f32; 2], color: [f32; 3]) -> Self {
        Self { pos, color }
    }

    /// Byte stride of one vertex
    pub const STRIDE: usize = mem::size_of::<Self>();

    /// Vertex buffer binding at slot 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(Self::STRIDE as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attributes: location 0 = position (vec2), location 1 = color (vec3)
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(mem::size_of::<[f32; 2]>() as u32)
                .build(),
        ]
    }
}

/// Corners of the demo quad, counter-clockwise from top left
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
];

/// Two triangles covering the quad
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(Vertex::STRIDE, 20);
        assert_eq!(Vertex::binding_description().stride, 20);
    }

    #[test]
    fn test_color_attribute_follows_position() {
        let [pos, color] = Vertex::attribute_descriptions();
        assert_eq!(pos.offset, 0);
        assert_eq!(color.offset, 8);
        assert_eq!(color.location, 1);
    }

    #[test]
    fn test_quad_indices_reference_every_corner() {
        for corner in 0..QUAD_VERTICES.len() as u16 {
            assert!(QUAD_INDICES.contains(&corner));
        }
        assert!(QUAD_INDICES.iter().all(|&i| usize::from(i) < QUAD_VERTICES.len()));
    }
}
