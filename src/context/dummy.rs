//! Dummy render context for testing and development.
//!
//! This context doesn't perform actual GPU operations but provides a valid
//! implementation of the capability surface, with enough instrumentation for
//! tests to observe allocation, disposal and binding traffic without GPU
//! hardware.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{StreamOutError, StreamOutResult};
use crate::layout::OutputLayout;
use crate::types::BufferDescriptor;

use super::{
    BufferHandle, ContextId, GeometryHandle, RenderContext, StreamOutputBinding, TargetHandle,
};

/// Dummy render context.
///
/// Handles are minted from a per-context counter and tracked in live sets so
/// tests can assert that every allocation is eventually released. Allocation
/// failures can be forced with [`DummyContext::set_fail_buffers`] and
/// [`DummyContext::set_fail_geometry`].
pub struct DummyContext {
    id: ContextId,
    name: String,
    next_handle: AtomicU64,
    live_buffers: Mutex<HashSet<BufferHandle>>,
    live_geometries: Mutex<HashSet<GeometryHandle>>,
    created_buffer_sizes: Mutex<Vec<u64>>,
    last_stream_bindings: Mutex<Vec<StreamOutputBinding>>,
    buffers_created: AtomicUsize,
    buffers_disposed: AtomicUsize,
    stream_binds: AtomicUsize,
    stream_unbinds: AtomicUsize,
    render_target_sets: AtomicUsize,
    fail_buffers: AtomicBool,
    geometry_budget: AtomicIsize,
}

impl DummyContext {
    /// Create a new dummy context with a process-unique id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ContextId::next(),
            name: name.into(),
            next_handle: AtomicU64::new(1),
            live_buffers: Mutex::new(HashSet::new()),
            live_geometries: Mutex::new(HashSet::new()),
            created_buffer_sizes: Mutex::new(Vec::new()),
            last_stream_bindings: Mutex::new(Vec::new()),
            buffers_created: AtomicUsize::new(0),
            buffers_disposed: AtomicUsize::new(0),
            stream_binds: AtomicUsize::new(0),
            stream_unbinds: AtomicUsize::new(0),
            render_target_sets: AtomicUsize::new(0),
            fail_buffers: AtomicBool::new(false),
            geometry_budget: AtomicIsize::new(isize::MAX),
        }
    }

    fn mint(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Force every subsequent buffer allocation to fail.
    pub fn set_fail_buffers(&self, fail: bool) {
        self.fail_buffers.store(fail, Ordering::Relaxed);
    }

    /// Force every subsequent vertex-geometry creation to fail.
    pub fn set_fail_geometry(&self, fail: bool) {
        let budget = if fail { 0 } else { isize::MAX };
        self.geometry_budget.store(budget, Ordering::Relaxed);
    }

    /// Allow exactly `remaining` more vertex-geometry creations, then fail.
    pub fn set_geometry_budget(&self, remaining: usize) {
        self.geometry_budget
            .store(remaining as isize, Ordering::Relaxed);
    }

    /// Number of buffers currently alive (created and not yet disposed).
    pub fn live_buffer_count(&self) -> usize {
        self.live_buffers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of vertex-geometry views currently alive.
    pub fn live_geometry_count(&self) -> usize {
        self.live_geometries.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Total number of buffers ever created on this context.
    pub fn buffers_created(&self) -> usize {
        self.buffers_created.load(Ordering::Relaxed)
    }

    /// Total number of buffers ever disposed on this context.
    pub fn buffers_disposed(&self) -> usize {
        self.buffers_disposed.load(Ordering::Relaxed)
    }

    /// Byte sizes of every buffer created, in creation order.
    pub fn created_buffer_sizes(&self) -> Vec<u64> {
        self.created_buffer_sizes
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Number of `set_stream_output_targets(Some(..))` calls.
    pub fn stream_bind_count(&self) -> usize {
        self.stream_binds.load(Ordering::Relaxed)
    }

    /// Number of `set_stream_output_targets(None)` calls.
    pub fn stream_unbind_count(&self) -> usize {
        self.stream_unbinds.load(Ordering::Relaxed)
    }

    /// Number of `set_render_targets` calls.
    pub fn render_target_set_count(&self) -> usize {
        self.render_target_sets.load(Ordering::Relaxed)
    }

    /// The bindings passed to the most recent stream-output bind call.
    pub fn last_stream_bindings(&self) -> Vec<StreamOutputBinding> {
        self.last_stream_bindings
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }
}

impl RenderContext for DummyContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> StreamOutResult<BufferHandle> {
        if self.fail_buffers.load(Ordering::Relaxed) {
            return Err(StreamOutError::DeviceResource(format!(
                "context '{}' refused buffer allocation",
                self.name
            )));
        }
        if descriptor.size == 0 {
            return Err(StreamOutError::DeviceResource(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let handle = BufferHandle::from_raw(self.mint());
        if let Ok(mut live) = self.live_buffers.lock() {
            live.insert(handle);
        }
        if let Ok(mut sizes) = self.created_buffer_sizes.lock() {
            sizes.push(descriptor.size);
        }
        self.buffers_created.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "DummyContext '{}': created buffer {:?} (size: {})",
            self.name,
            descriptor.label,
            descriptor.size
        );
        Ok(handle)
    }

    fn create_vertex_geometry(
        &self,
        buffer: BufferHandle,
        layout: &OutputLayout,
        vertex_size: u32,
    ) -> StreamOutResult<GeometryHandle> {
        if self.geometry_budget.load(Ordering::Relaxed) <= 0 {
            return Err(StreamOutError::DeviceResource(format!(
                "context '{}' refused vertex view creation",
                self.name
            )));
        }
        if self.geometry_budget.load(Ordering::Relaxed) != isize::MAX {
            self.geometry_budget.fetch_sub(1, Ordering::Relaxed);
        }
        let known = self
            .live_buffers
            .lock()
            .map(|live| live.contains(&buffer))
            .unwrap_or(false);
        if !known {
            return Err(StreamOutError::DeviceResource(format!(
                "unknown buffer handle {}",
                buffer.raw()
            )));
        }

        let handle = GeometryHandle::from_raw(self.mint());
        if let Ok(mut live) = self.live_geometries.lock() {
            live.insert(handle);
        }

        log::trace!(
            "DummyContext '{}': created vertex geometry over buffer {} ({} elements, stride {})",
            self.name,
            buffer.raw(),
            layout.len(),
            vertex_size
        );
        Ok(handle)
    }

    fn dispose_buffer(&self, buffer: BufferHandle) {
        let removed = self
            .live_buffers
            .lock()
            .map(|mut live| live.remove(&buffer))
            .unwrap_or(false);
        if removed {
            self.buffers_disposed.fetch_add(1, Ordering::Relaxed);
            log::trace!("DummyContext '{}': disposed buffer {}", self.name, buffer.raw());
        } else {
            log::warn!(
                "DummyContext '{}': disposing unknown buffer {}",
                self.name,
                buffer.raw()
            );
        }
    }

    fn dispose_geometry(&self, geometry: GeometryHandle) {
        let removed = self
            .live_geometries
            .lock()
            .map(|mut live| live.remove(&geometry))
            .unwrap_or(false);
        if !removed {
            log::warn!(
                "DummyContext '{}': disposing unknown geometry {}",
                self.name,
                geometry.raw()
            );
        }
    }

    fn set_render_targets(&self, targets: &[TargetHandle]) {
        self.render_target_sets.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "DummyContext '{}': set {} render target(s)",
            self.name,
            targets.len()
        );
    }

    fn set_stream_output_targets(&self, bindings: Option<&[StreamOutputBinding]>) {
        match bindings {
            Some(bindings) => {
                self.stream_binds.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut last) = self.last_stream_bindings.lock() {
                    *last = bindings.to_vec();
                }
                log::trace!(
                    "DummyContext '{}': bound {} stream-output target(s)",
                    self.name,
                    bindings.len()
                );
            }
            None => {
                self.stream_unbinds.fetch_add(1, Ordering::Relaxed);
                log::trace!("DummyContext '{}': unbound stream-output targets", self.name);
            }
        }
    }
}

impl std::fmt::Debug for DummyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("live_buffers", &self.live_buffer_count())
            .finish()
    }
}

// Ensure DummyContext is Send + Sync
static_assertions::assert_impl_all!(DummyContext: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_create_and_dispose_buffer() {
        let context = DummyContext::new("test");
        let handle = context
            .create_buffer(&BufferDescriptor::new(1024, BufferUsage::stream_out_capture()))
            .unwrap();
        assert_eq!(context.live_buffer_count(), 1);

        context.dispose_buffer(handle);
        assert_eq!(context.live_buffer_count(), 0);
        assert_eq!(context.buffers_disposed(), 1);
    }

    #[test]
    fn test_zero_size_buffer_fails() {
        let context = DummyContext::new("test");
        let result = context.create_buffer(&BufferDescriptor::new(0, BufferUsage::RAW));
        assert!(result.is_err());
    }

    #[test]
    fn test_forced_allocation_failure() {
        let context = DummyContext::new("test");
        context.set_fail_buffers(true);
        let result =
            context.create_buffer(&BufferDescriptor::new(64, BufferUsage::stream_out_capture()));
        assert!(matches!(result, Err(StreamOutError::DeviceResource(_))));
    }

    #[test]
    fn test_geometry_requires_known_buffer() {
        let context = DummyContext::new("test");
        let result = context.create_vertex_geometry(
            BufferHandle::from_raw(999),
            &OutputLayout::new(),
            12,
        );
        assert!(result.is_err());
    }
}
