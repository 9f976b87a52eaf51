//! Common types and descriptors for capture resources.
//!
//! This module contains the usage flags and descriptor structs used when
//! asking a render context for GPU buffers.

mod buffer;

pub use buffer::{BufferDescriptor, BufferUsage};
