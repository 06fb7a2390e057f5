#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless reference backend for GPUMark.
//!
//! The backend keeps instance uniforms in plain memory, which makes it usable
//! in tests and on machines without a GPU. It still enforces the contracts a
//! real device would: writes beyond the realized capacity fail, draws must
//! reference index buffers inside an open render pass, and storage replaced
//! by a reallocation stays alive until the configured number of frames in
//! flight has been presented.

use std::{
    collections::{hash_map::DefaultHasher, VecDeque},
    hash::{Hash, Hasher},
};

use anyhow::{anyhow, bail, ensure, Result as AnyResult};
use gpumark_core::{CategoryId, EntityPose};
use gpumark_rendering::{
    BackendCapabilities, BufferDescriptor, BufferHandle, DrawRange, FrameView, InstanceBackend,
    InstanceUniforms, DYNAMIC_OFFSET_STRIDE,
};

/// Instance budget of a default backend.
pub const DEFAULT_MAX_INSTANCES: u32 = 1 << 24;

/// Tunables of the headless backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Frames presented before superseded storage is released.
    pub frames_in_flight: u32,
    /// Largest entity total the instance arena may hold.
    pub max_instances: u32,
    /// Capabilities advertised to the orchestrator.
    pub capabilities: BackendCapabilities,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            max_instances: DEFAULT_MAX_INSTANCES,
            capabilities: BackendCapabilities {
                per_entity_draw: true,
                dynamic_buffer_offset: true,
            },
        }
    }
}

/// Counters describing a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Instance uniform blocks written.
    pub uniform_updates: u64,
    /// Uniform uploads issued through `flush_instance_data`.
    pub flushes: u64,
    /// Draw calls submitted.
    pub draw_calls: u64,
    /// Instances covered by all draws.
    pub instances_drawn: u64,
    /// Indices submitted across all draws, counting every instance.
    pub indices_submitted: u64,
}

/// Layout of the live instance storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageLayout {
    /// Entities the storage can hold.
    pub capacity: u32,
    /// Whether uniforms share one arena addressed by offsets.
    pub dynamic_offset: bool,
}

impl StorageLayout {
    /// Bytes the storage occupies, or zero when each instance owns a binding.
    #[must_use]
    pub const fn arena_bytes(&self) -> u64 {
        if self.dynamic_offset {
            self.capacity as u64 * DYNAMIC_OFFSET_STRIDE
        } else {
            0
        }
    }

    /// Separate uniform bindings, or one when the arena is shared.
    #[must_use]
    pub const fn bindings(&self) -> u32 {
        if self.dynamic_offset {
            1
        } else {
            self.capacity
        }
    }
}

/// Uniform block stored for one instance slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceRecord {
    /// Category that wrote the slot.
    pub category: CategoryId,
    /// Index within the category that wrote the slot.
    pub index: u32,
    /// Pose written.
    pub pose: EntityPose,
    /// Frame in which the slot was last written.
    pub frame_index: u64,
}

#[derive(Clone, Copy, Debug)]
struct StoredBuffer {
    elements: u64,
    is_index: bool,
}

#[derive(Clone, Debug)]
struct RetiredStorage {
    layout: StorageLayout,
    release_after: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    Closed,
    Open,
    RenderPass,
}

/// In-memory implementation of [`InstanceBackend`].
#[derive(Debug)]
pub struct HeadlessBackend {
    config: HeadlessConfig,
    buffers: Vec<StoredBuffer>,
    layout: StorageLayout,
    instances: Vec<Option<InstanceRecord>>,
    retired: VecDeque<RetiredStorage>,
    released: u64,
    reallocations: u64,
    state: FrameState,
    frame_index: u64,
    frames_presented: u64,
    current: FrameStats,
    last: FrameStats,
    frame_hasher: DefaultHasher,
    fingerprint: u64,
}

impl HeadlessBackend {
    /// Creates a backend with no storage.
    #[must_use]
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            buffers: Vec::new(),
            layout: StorageLayout {
                capacity: 0,
                dynamic_offset: false,
            },
            instances: Vec::new(),
            retired: VecDeque::new(),
            released: 0,
            reallocations: 0,
            state: FrameState::Closed,
            frame_index: 0,
            frames_presented: 0,
            current: FrameStats::default(),
            last: FrameStats::default(),
            frame_hasher: DefaultHasher::new(),
            fingerprint: 0,
        }
    }

    /// Layout of the live instance storage.
    #[must_use]
    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    /// Uniform block stored in `slot`, if it has been written.
    #[must_use]
    pub fn instance(&self, slot: u32) -> Option<&InstanceRecord> {
        self.instances.get(slot as usize).and_then(Option::as_ref)
    }

    /// Counters of the most recently presented frame.
    #[must_use]
    pub fn last_frame(&self) -> FrameStats {
        self.last
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Number of times storage has been resized.
    #[must_use]
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Superseded storage that is still waiting for in-flight frames.
    #[must_use]
    pub fn retired_storage(&self) -> usize {
        self.retired.len()
    }

    /// Superseded storage released so far.
    #[must_use]
    pub fn released_storage(&self) -> u64 {
        self.released
    }

    /// Bytes still held by superseded arenas.
    #[must_use]
    pub fn retired_bytes(&self) -> u64 {
        self.retired
            .iter()
            .map(|retired| retired.layout.arena_bytes())
            .sum()
    }

    /// Hash over every uniform and draw presented so far.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    fn release_completed(&mut self) {
        while let Some(front) = self.retired.front() {
            if front.release_after > self.frames_presented {
                break;
            }
            let _ = self.retired.pop_front();
            self.released += 1;
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl InstanceBackend for HeadlessBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.config.capabilities
    }

    fn create_buffer(&mut self, descriptor: BufferDescriptor<'_>) -> AnyResult<BufferHandle> {
        ensure!(
            descriptor.components_per_element > 0,
            "buffer elements must have at least one component"
        );
        let components = descriptor.components_per_element as usize;
        let len = descriptor.data.len();
        ensure!(
            len % components == 0,
            "buffer of {len} values is not a whole number of {components}-component elements"
        );

        let handle = u32::try_from(self.buffers.len())
            .map(BufferHandle::new)
            .map_err(|_| anyhow!("buffer handle space exhausted"))?;
        self.buffers.push(StoredBuffer {
            elements: (len / components) as u64,
            is_index: descriptor.data.is_index(),
        });
        Ok(handle)
    }

    fn realloc_resource(
        &mut self,
        old_total: u32,
        new_total: u32,
        dynamic_offset: bool,
    ) -> AnyResult<()> {
        ensure!(
            self.state == FrameState::Closed,
            "storage cannot be resized while a frame is being recorded"
        );
        ensure!(
            old_total == self.layout.capacity,
            "storage holds {} entities but the caller expected {old_total}",
            self.layout.capacity
        );

        ensure!(
            new_total <= self.config.max_instances,
            "failed to allocate instance storage for {new_total} entities (budget {})",
            self.config.max_instances
        );
        let slots = usize::try_from(new_total)
            .map_err(|_| anyhow!("{new_total} entities exceed addressable storage"))?;
        let mut instances = Vec::new();
        instances.try_reserve_exact(slots).map_err(|_| {
            anyhow!("failed to allocate instance storage for {new_total} entities")
        })?;
        instances.resize(slots, None);

        let previous = self.layout;
        self.layout = StorageLayout {
            capacity: new_total,
            dynamic_offset,
        };
        self.instances = instances;
        self.reallocations += 1;
        if previous.capacity > 0 {
            self.retired.push_back(RetiredStorage {
                layout: previous,
                release_after: self.frames_presented + u64::from(self.config.frames_in_flight),
            });
        }
        self.release_completed();
        Ok(())
    }

    fn begin_frame(&mut self, view: &FrameView) -> AnyResult<()> {
        ensure!(
            self.state == FrameState::Closed,
            "frame {} began before the previous frame was presented",
            view.frame_index
        );
        self.state = FrameState::Open;
        self.frame_index = view.frame_index;
        self.current = FrameStats::default();
        self.frame_hasher = DefaultHasher::new();
        view.frame_index.hash(&mut self.frame_hasher);
        view.clock.clock.to_bits().hash(&mut self.frame_hasher);
        for value in view.camera.eye.to_array() {
            value.to_bits().hash(&mut self.frame_hasher);
        }
        Ok(())
    }

    fn update_per_instance_uniforms(&mut self, uniforms: &InstanceUniforms) -> AnyResult<()> {
        if self.state == FrameState::Closed {
            bail!("instance uniforms written outside a frame");
        }
        let capacity = self.layout.capacity;
        let slot = self
            .instances
            .get_mut(uniforms.slot as usize)
            .ok_or_else(|| {
                anyhow!(
                    "instance slot {} exceeds storage for {capacity} entities",
                    uniforms.slot
                )
            })?;
        *slot = Some(InstanceRecord {
            category: uniforms.category,
            index: uniforms.index,
            pose: uniforms.pose,
            frame_index: self.frame_index,
        });

        self.current.uniform_updates += 1;
        let pose = &uniforms.pose;
        uniforms.slot.hash(&mut self.frame_hasher);
        for value in pose
            .head
            .to_array()
            .into_iter()
            .chain(pose.tail.to_array())
            .chain(pose.axis.to_array())
        {
            value.to_bits().hash(&mut self.frame_hasher);
        }
        pose.scale.to_bits().hash(&mut self.frame_hasher);
        pose.tail_phase.to_bits().hash(&mut self.frame_hasher);
        Ok(())
    }

    fn flush_instance_data(&mut self) -> AnyResult<()> {
        ensure!(
            self.state == FrameState::Open,
            "instance data must be flushed after begin_frame and before the render pass"
        );
        self.current.flushes += 1;
        Ok(())
    }

    fn begin_render_pass(&mut self) -> AnyResult<()> {
        ensure!(
            self.state == FrameState::Open,
            "render pass opened outside a frame or twice"
        );
        self.state = FrameState::RenderPass;
        Ok(())
    }

    fn draw(&mut self, mesh: BufferHandle, instances: DrawRange) -> AnyResult<()> {
        ensure!(
            self.state == FrameState::RenderPass,
            "draw submitted outside a render pass"
        );
        let buffer = self
            .buffers
            .get(mesh.get() as usize)
            .ok_or_else(|| anyhow!("unknown buffer handle {}", mesh.get()))?;
        ensure!(
            buffer.is_index,
            "buffer {} is not an index buffer",
            mesh.get()
        );
        ensure!(
            instances.end() <= u64::from(self.layout.capacity),
            "draw of slots {}..{} exceeds storage for {} entities",
            instances.first_slot,
            instances.end(),
            self.layout.capacity
        );

        self.current.draw_calls += 1;
        self.current.instances_drawn += u64::from(instances.count);
        self.current.indices_submitted += buffer.elements * u64::from(instances.count);
        mesh.hash(&mut self.frame_hasher);
        instances.first_slot.hash(&mut self.frame_hasher);
        instances.count.hash(&mut self.frame_hasher);
        Ok(())
    }

    fn present(&mut self) -> AnyResult<()> {
        ensure!(
            self.state != FrameState::Closed,
            "present called without an open frame"
        );
        self.state = FrameState::Closed;
        self.frames_presented += 1;
        self.last = self.current;

        let frame_hash = self.frame_hasher.finish();
        let mut hasher = DefaultHasher::new();
        self.fingerprint.hash(&mut hasher);
        frame_hash.hash(&mut hasher);
        self.fingerprint = hasher.finish();

        self.release_completed();
        Ok(())
    }
}
