//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be written by the geometry pipeline's stream-output stage.
        const STREAM_OUTPUT = 1 << 2;
        /// Buffer contents can be read back as raw/structured data.
        const RAW = 1 << 3;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 4;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 5;
        /// Buffer is mappable for CPU read access.
        const MAP_READ = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl BufferUsage {
    /// Usage carried by every stream-output capture buffer: written by the
    /// stream-output stage, readable as raw data, re-bindable as vertex input.
    pub fn stream_out_capture() -> Self {
        Self::STREAM_OUTPUT | Self::RAW | Self::VERTEX
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
