//! Vertex data structures and input descriptions.
//!
//! Two formats cover the demo's draw calls:
//! - [`ColorVertex`] for the forward scene pass (position + color)
//! - [`BlitVertex`] for the full-screen blit strip (clip-space position
//!   only; the fragment shader derives texture coordinates)

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Vertex with position and color for the forward scene pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ColorVertex {
    /// Position in clip space.
    pub position: Vec3,
    /// RGB color.
    pub color: Vec3,
}

impl ColorVertex {
    /// Creates a new colored vertex.
    #[inline]
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Vertex input binding description for binding 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Vertex attribute descriptions: position at location 0, color at 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
        ]
    }
}

/// Vertex carrying only a clip-space position, for the blit strip.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct BlitVertex {
    /// Position in clip space.
    pub position: Vec4,
}

impl BlitVertex {
    /// Creates a new blit vertex.
    #[inline]
    pub const fn new(position: Vec4) -> Self {
        Self { position }
    }

    /// A triangle strip covering the whole viewport.
    pub const FULLSCREEN_STRIP: [BlitVertex; 4] = [
        BlitVertex::new(Vec4::new(-1.0, -1.0, 0.0, 1.0)),
        BlitVertex::new(Vec4::new(1.0, -1.0, 0.0, 1.0)),
        BlitVertex::new(Vec4::new(-1.0, 1.0, 0.0, 1.0)),
        BlitVertex::new(Vec4::new(1.0, 1.0, 0.0, 1.0)),
    ];

    /// Vertex input binding description for binding 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Vertex attribute descriptions: position at location 0.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 1] {
        [vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32A32_SFLOAT,
            offset: 0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_vertex_layout() {
        // Vec3 + Vec3 = 24 bytes
        assert_eq!(std::mem::size_of::<ColorVertex>(), 24);

        let binding = ColorVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let attrs = ColorVertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_blit_vertex_layout() {
        assert_eq!(std::mem::size_of::<BlitVertex>(), 16);

        let binding = BlitVertex::binding_description();
        assert_eq!(binding.stride, 16);

        let attrs = BlitVertex::attribute_descriptions();
        assert_eq!(attrs[0].format, vk::Format::R32G32B32A32_SFLOAT);
    }

    #[test]
    fn test_fullscreen_strip_covers_clip_space() {
        let strip = BlitVertex::FULLSCREEN_STRIP;
        assert_eq!(strip.len(), 4);
        for v in &strip {
            assert!(v.position.x.abs() == 1.0 && v.position.y.abs() == 1.0);
            assert_eq!(v.position.w, 1.0);
        }
    }

    #[test]
    fn test_vertex_pod_cast() {
        let v = ColorVertex::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 24);

        let back: &ColorVertex = bytemuck::from_bytes(bytes);
        assert_eq!(back.position, v.position);
        assert_eq!(back.color, v.color);
    }
}
