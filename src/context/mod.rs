//! Render context capability layer.
//!
//! This module defines the narrow capability surface the capture system
//! requires from a GPU device context: buffer and vertex-view creation,
//! disposal, and output-stage binding. The concrete GPU API behind a context
//! is opaque; hosts implement [`RenderContext`] over whatever device objects
//! they own.
//!
//! # Available Contexts
//!
//! - [`DummyContext`]: no-op instrumented context for testing and development
//!
//! Each distinct context is an independent resource scope. Nothing allocated
//! against one context is ever shared with another; the capture system shards
//! all of its state by [`ContextId`].

pub mod dummy;

pub use dummy::DummyContext;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StreamOutResult;
use crate::layout::OutputLayout;
use crate::types::BufferDescriptor;

/// Identifier of a render context.
///
/// `ContextId` is the unit of resource sharding: caches and published output
/// handles are keyed by it. Hosts must hand out a distinct id per device
/// context; [`ContextId::next`] provides process-unique values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a process-unique context id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Create an id from a raw value chosen by the host.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to a GPU buffer owned by a render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    /// Create a handle from a raw value chosen by the context.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to a vertex-geometry view over a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(u64);

impl GeometryHandle {
    /// Create a handle from a raw value chosen by the context.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to a color render target view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u64);

impl TargetHandle {
    /// Create a handle from a raw value chosen by the context.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One stream-output target binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamOutputBinding {
    /// Buffer the output stage writes into.
    pub buffer: BufferHandle,
    /// Byte offset at which writing starts.
    pub offset: u32,
}

impl StreamOutputBinding {
    /// Create a binding.
    pub fn new(buffer: BufferHandle, offset: u32) -> Self {
        Self { buffer, offset }
    }
}

/// Capability trait over a GPU device context.
///
/// All methods take `&self`; implementations use interior mutability where
/// needed. Callers guarantee that a single context is never driven from two
/// threads at once (single-threaded cooperative scheduling), so pipeline
/// state calls (`set_render_targets`, `set_stream_output_targets`) need no
/// internal ordering beyond program order.
pub trait RenderContext: Send + Sync {
    /// Get the sharding identity of this context.
    fn id(&self) -> ContextId;

    /// Get a human-readable context name for logging.
    fn name(&self) -> &str;

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StreamOutError::DeviceResource`](crate::StreamOutError::DeviceResource)
    /// if the device refuses the allocation.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> StreamOutResult<BufferHandle>;

    /// Create a vertex-geometry view interpreting `buffer` according to
    /// `layout` with the given vertex stride.
    ///
    /// # Errors
    ///
    /// Returns [`StreamOutError::DeviceResource`](crate::StreamOutError::DeviceResource)
    /// if the view cannot be created (unknown buffer, invalid format
    /// combination).
    fn create_vertex_geometry(
        &self,
        buffer: BufferHandle,
        layout: &OutputLayout,
        vertex_size: u32,
    ) -> StreamOutResult<GeometryHandle>;

    /// Release a buffer.
    fn dispose_buffer(&self, buffer: BufferHandle);

    /// Release a vertex-geometry view.
    fn dispose_geometry(&self, geometry: GeometryHandle);

    /// Bind color render targets on the immediate context. An empty slice
    /// unbinds every target.
    fn set_render_targets(&self, targets: &[TargetHandle]);

    /// Bind stream-output targets on the immediate context, in slot order.
    /// `None` unbinds them.
    fn set_stream_output_targets(&self, bindings: Option<&[StreamOutputBinding]>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_ids_are_unique() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_handle_roundtrip() {
        let handle = BufferHandle::from_raw(42);
        assert_eq!(handle.raw(), 42);
        assert_eq!(handle, BufferHandle::from_raw(42));
    }
}
