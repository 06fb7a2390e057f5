use std::f32::consts::TAU;

use glam::Vec3;

use crate::{BufferData, BufferDescriptor};

const COMPONENTS_PER_VERTEX: u32 = 3;
const MIN_SEGMENTS: u16 = 3;
const BODY_RADIUS: f32 = 0.3;
const BODY_HALF_LENGTH: f32 = 1.0;

/// Small procedural stand-in for an entity mesh.
///
/// A spindle: a nose point, one ring of body vertices, and a tail point,
/// oriented along +z. Positions are three scalars per vertex.
#[derive(Clone, Debug, PartialEq)]
pub struct ProxyMesh {
    vertices: Vec<f32>,
    indices: Vec<u16>,
}

impl ProxyMesh {
    /// Builds a spindle whose body ring has `segments` vertices (at least three).
    #[must_use]
    pub fn fish(segments: u16) -> Self {
        let segments = segments.clamp(MIN_SEGMENTS, u16::MAX - 2);
        let nose = 0u16;
        let tail = segments + 1;

        let ring = (0..segments).map(|segment| {
            let angle = TAU * f32::from(segment) / f32::from(segments);
            Vec3::new(angle.cos(), angle.sin(), 0.0) * BODY_RADIUS
        });
        let vertices: Vec<f32> = std::iter::once(Vec3::Z * BODY_HALF_LENGTH)
            .chain(ring)
            .chain(std::iter::once(Vec3::NEG_Z * BODY_HALF_LENGTH))
            .flat_map(|position| position.to_array())
            .collect();

        let mut indices = Vec::with_capacity(usize::from(segments) * 6);
        for segment in 0..segments {
            let current = 1 + segment;
            let next = 1 + (segment + 1) % segments;
            indices.extend_from_slice(&[nose, current, next]);
            indices.extend_from_slice(&[tail, next, current]);
        }

        Self { vertices, indices }
    }

    /// Descriptor uploading the vertex positions.
    #[must_use]
    pub fn vertex_descriptor(&self) -> BufferDescriptor<'_> {
        BufferDescriptor {
            components_per_element: COMPONENTS_PER_VERTEX,
            data: BufferData::Vertices(&self.vertices),
        }
    }

    /// Descriptor uploading the triangle list.
    #[must_use]
    pub fn index_descriptor(&self) -> BufferDescriptor<'_> {
        BufferDescriptor {
            components_per_element: 1,
            data: BufferData::Indices(&self.indices),
        }
    }

    /// Number of vertices in the mesh.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / COMPONENTS_PER_VERTEX as usize
    }

    /// Number of indices in the triangle list.
    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}
