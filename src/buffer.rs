//! Stream-output capture buffer.
//!
//! A [`StreamOutBuffer`] owns one raw GPU buffer written by the geometry
//! pipeline's output stage, plus a vertex-geometry view interpreting it. The
//! pair shares a lifetime: both are created together and disposed together,
//! never independently.

use crate::context::{BufferHandle, GeometryHandle, RenderContext};
use crate::error::{StreamOutError, StreamOutResult};
use crate::layout::OutputLayout;
use crate::types::{BufferDescriptor, BufferUsage};

/// One stream-output capture buffer and its derived vertex-geometry view.
pub struct StreamOutBuffer {
    buffer: BufferHandle,
    geometry: GeometryHandle,
    vertex_size: u32,
    element_capacity: u32,
    layout: OutputLayout,
    disposed: bool,
}

impl StreamOutBuffer {
    /// Allocate a capture buffer of `vertex_size * element_count` bytes on
    /// the given context and derive its vertex-geometry view.
    ///
    /// # Errors
    ///
    /// Returns [`StreamOutError::Configuration`] if `vertex_size` or
    /// `element_count` is zero, and [`StreamOutError::DeviceResource`] if the
    /// context refuses either allocation. On a view failure the raw buffer is
    /// released before the error is returned.
    pub fn create(
        context: &dyn RenderContext,
        vertex_size: u32,
        element_count: u32,
        layout: OutputLayout,
    ) -> StreamOutResult<Self> {
        if vertex_size == 0 {
            return Err(StreamOutError::Configuration(
                "vertex size must be positive".to_string(),
            ));
        }
        if element_count == 0 {
            return Err(StreamOutError::Configuration(
                "element count must be positive".to_string(),
            ));
        }

        let byte_size = u64::from(vertex_size) * u64::from(element_count);
        let descriptor = BufferDescriptor::new(byte_size, BufferUsage::stream_out_capture());

        let buffer = context.create_buffer(&descriptor)?;
        let geometry = match context.create_vertex_geometry(buffer, &layout, vertex_size) {
            Ok(geometry) => geometry,
            Err(err) => {
                // The pair is all-or-nothing; don't leak the raw buffer.
                context.dispose_buffer(buffer);
                return Err(err);
            }
        };

        log::trace!(
            "created stream-out buffer on context '{}': {} x {} bytes, {} layout element(s)",
            context.name(),
            element_count,
            vertex_size,
            layout.len()
        );

        Ok(Self {
            buffer,
            geometry,
            vertex_size,
            element_capacity: element_count,
            layout,
            disposed: false,
        })
    }

    /// Handle of the raw buffer.
    pub fn raw_buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// Handle of the vertex-geometry view.
    pub fn vertex_geometry(&self) -> GeometryHandle {
        self.geometry
    }

    /// Size in bytes of one captured vertex.
    pub fn vertex_size(&self) -> u32 {
        self.vertex_size
    }

    /// Number of vertices the buffer can hold.
    pub fn element_capacity(&self) -> u32 {
        self.element_capacity
    }

    /// Total buffer size in bytes.
    pub fn byte_size(&self) -> u64 {
        u64::from(self.vertex_size) * u64::from(self.element_capacity)
    }

    /// Layout the vertex-geometry view interprets the buffer with.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Whether this buffer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release both GPU resources.
    ///
    /// # Errors
    ///
    /// Disposing the same buffer twice is a programming error and returns
    /// [`StreamOutError::InvalidState`], consistently (never a silent no-op).
    pub fn dispose(&mut self, context: &dyn RenderContext) -> StreamOutResult<()> {
        if self.disposed {
            return Err(StreamOutError::InvalidState(
                "stream-out buffer disposed twice".to_string(),
            ));
        }

        context.dispose_geometry(self.geometry);
        context.dispose_buffer(self.buffer);
        self.disposed = true;
        Ok(())
    }
}

impl std::fmt::Debug for StreamOutBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOutBuffer")
            .field("buffer", &self.buffer)
            .field("geometry", &self.geometry)
            .field("vertex_size", &self.vertex_size)
            .field("element_capacity", &self.element_capacity)
            .field("disposed", &self.disposed)
            .finish()
    }
}

// Ensure StreamOutBuffer is Send + Sync
static_assertions::assert_impl_all!(StreamOutBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DummyContext;
    use crate::layout::OutputElement;

    fn test_layout() -> OutputLayout {
        OutputLayout::new().with_element(OutputElement::position())
    }

    #[test]
    fn test_create_allocates_pair() {
        let context = DummyContext::new("test");
        let buffer = StreamOutBuffer::create(&context, 12, 512, test_layout()).unwrap();

        assert_eq!(buffer.byte_size(), 12 * 512);
        assert_eq!(context.live_buffer_count(), 1);
        assert_eq!(context.live_geometry_count(), 1);
        assert_eq!(context.created_buffer_sizes(), vec![12 * 512]);
    }

    #[test]
    fn test_zero_vertex_size_fails() {
        let context = DummyContext::new("test");
        let result = StreamOutBuffer::create(&context, 0, 512, test_layout());
        assert!(matches!(result, Err(StreamOutError::Configuration(_))));
        assert_eq!(context.live_buffer_count(), 0);
    }

    #[test]
    fn test_zero_element_count_fails() {
        let context = DummyContext::new("test");
        let result = StreamOutBuffer::create(&context, 12, 0, test_layout());
        assert!(matches!(result, Err(StreamOutError::Configuration(_))));
    }

    #[test]
    fn test_view_failure_releases_raw_buffer() {
        let context = DummyContext::new("test");
        context.set_fail_geometry(true);

        let result = StreamOutBuffer::create(&context, 12, 512, test_layout());
        assert!(result.is_err());
        assert_eq!(context.live_buffer_count(), 0);
        assert_eq!(context.live_geometry_count(), 0);
    }

    #[test]
    fn test_dispose_releases_both() {
        let context = DummyContext::new("test");
        let mut buffer = StreamOutBuffer::create(&context, 12, 64, test_layout()).unwrap();

        buffer.dispose(&context).unwrap();
        assert!(buffer.is_disposed());
        assert_eq!(context.live_buffer_count(), 0);
        assert_eq!(context.live_geometry_count(), 0);
    }

    #[test]
    fn test_double_dispose_is_an_error() {
        let context = DummyContext::new("test");
        let mut buffer = StreamOutBuffer::create(&context, 12, 64, test_layout()).unwrap();

        buffer.dispose(&context).unwrap();
        let result = buffer.dispose(&context);
        assert!(matches!(result, Err(StreamOutError::InvalidState(_))));
    }
}
