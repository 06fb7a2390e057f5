#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for GPUMark backends.
//!
//! The frame orchestrator only talks to storage and draw submission through
//! [`InstanceBackend`]. Concrete backends decide how instance uniforms are
//! stored and how superseded storage is retired; the orchestrator only
//! guarantees call order within a frame.

mod clock;
mod fps;
mod mesh;

use anyhow::Result as AnyResult;
use gpumark_core::{CameraRig, CategoryId, EntityPose, GlobalClock};

pub use clock::{FixedStepClock, FrameClock, WallClock};
pub use fps::{FpsCounter, FpsMetrics};
pub use mesh::ProxyMesh;

/// Byte stride between instance uniform blocks sharing one arena.
pub const DYNAMIC_OFFSET_STRIDE: u64 = 256;

/// Optional features a backend may offer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Whether the backend can draw one entity at a time.
    pub per_entity_draw: bool,
    /// Whether instance uniforms may share one arena addressed by offsets.
    pub dynamic_buffer_offset: bool,
}

/// Opaque identifier of a buffer created by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(u32);

impl BufferHandle {
    /// Creates a new handle with the provided backend-specific value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the backend-specific value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Contents uploaded when creating a buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BufferData<'a> {
    /// Vertex attributes.
    Vertices(&'a [f32]),
    /// Triangle list indices.
    Indices(&'a [u16]),
}

impl BufferData<'_> {
    /// Reports whether the buffer holds indices.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Indices(_))
    }

    /// Number of scalar values in the buffer.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Vertices(values) => values.len(),
            Self::Indices(values) => values.len(),
        }
    }

    /// Reports whether the buffer holds no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameters for [`InstanceBackend::create_buffer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferDescriptor<'a> {
    /// Scalars making up a single element.
    pub components_per_element: u32,
    /// Contents uploaded into the buffer.
    pub data: BufferData<'a>,
}

/// Per-frame values shared by every draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameView {
    /// Number of ticks applied since the session started.
    pub frame_index: u64,
    /// Global clock for the frame.
    pub clock: GlobalClock,
    /// Camera placement for the frame.
    pub camera: CameraRig,
}

/// Uniform block written for one entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceUniforms {
    /// Category the entity belongs to.
    pub category: CategoryId,
    /// Index of the entity within its category.
    pub index: u32,
    /// Position of the entity in the population-wide instance storage.
    pub slot: u32,
    /// Animated pose for the frame.
    pub pose: EntityPose,
}

/// Contiguous run of instance slots submitted by one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawRange {
    /// First instance slot drawn.
    pub first_slot: u32,
    /// Number of instances drawn.
    pub count: u32,
}

impl DrawRange {
    /// Range covering exactly one slot.
    #[must_use]
    pub const fn single(slot: u32) -> Self {
        Self {
            first_slot: slot,
            count: 1,
        }
    }

    /// One past the last slot drawn.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.first_slot as u64 + self.count as u64
    }
}

/// Storage and draw submission services consumed by the frame orchestrator.
///
/// Within a frame the orchestrator calls, in order: `realloc_resource` (only
/// when the population changed), `begin_frame`, the instance updates and
/// draws for the selected mode, then `present`. Any error is fatal to the
/// frame.
pub trait InstanceBackend {
    /// Optional features this backend offers.
    fn capabilities(&self) -> BackendCapabilities;

    /// Uploads an immutable vertex or index buffer.
    fn create_buffer(&mut self, descriptor: BufferDescriptor<'_>) -> AnyResult<BufferHandle>;

    /// Resizes instance storage from `old_total` to `new_total` entities.
    ///
    /// Must not return until the new storage is safe to write. Storage that
    /// the device may still reference is retired by the backend itself.
    fn realloc_resource(
        &mut self,
        old_total: u32,
        new_total: u32,
        dynamic_offset: bool,
    ) -> AnyResult<()>;

    /// Starts a frame.
    fn begin_frame(&mut self, view: &FrameView) -> AnyResult<()>;

    /// Writes the uniform block of one entity.
    fn update_per_instance_uniforms(&mut self, uniforms: &InstanceUniforms) -> AnyResult<()>;

    /// Uploads every uniform written since `begin_frame` in one transfer.
    fn flush_instance_data(&mut self) -> AnyResult<()>;

    /// Opens the render pass that subsequent draws record into.
    fn begin_render_pass(&mut self) -> AnyResult<()>;

    /// Draws `instances` using the mesh whose index buffer is `mesh`.
    fn draw(&mut self, mesh: BufferHandle, instances: DrawRange) -> AnyResult<()>;

    /// Finishes and submits the frame.
    fn present(&mut self) -> AnyResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_data_reports_kind_and_length() {
        let indices = [0u16, 1, 2];
        let data = BufferData::Indices(&indices);
        assert!(data.is_index());
        assert_eq!(data.len(), 3);

        let vertices: [f32; 0] = [];
        let data = BufferData::Vertices(&vertices);
        assert!(!data.is_index());
        assert!(data.is_empty());
    }

    #[test]
    fn draw_range_end_does_not_overflow() {
        let range = DrawRange {
            first_slot: u32::MAX,
            count: u32::MAX,
        };
        assert_eq!(range.end(), 2 * u64::from(u32::MAX));
        assert_eq!(DrawRange::single(4).end(), 5);
    }
}
