//! # streamout-capture
//!
//! Lifecycle and per-frame orchestration of GPU stream-output capture
//! buffers: buffers written directly by the geometry pipeline's output stage
//! and readable afterward as raw or structured data.
//!
//! The crate provides:
//! - [`StreamOutRenderer`] - the frame coordinator multiplexing up to four
//!   capture buffer slots across independent render contexts
//! - [`RenderContext`] - the capability trait hosts implement over their GPU
//!   device contexts (a [`DummyContext`] is included for testing)
//! - [`OutputLayout`] - captured vertex layout description and per-slot
//!   partitioning
//! - [`RendererHost`] / [`Queryable`] - the scheduler-facing capability
//!   surface
//!
//! # Frame cycle
//!
//! ```
//! use std::sync::Arc;
//! use streamout_capture::{
//!     DummyContext, OutputElement, OutputLayout, RenderContext, StreamOutConfig,
//!     StreamOutRenderer,
//! };
//!
//! let mut renderer = StreamOutRenderer::with_config(
//!     StreamOutConfig::new()
//!         .with_buffer_count(2)
//!         .with_layout(OutputLayout::new().with_element(OutputElement::position())),
//! );
//! let context: Arc<dyn RenderContext> = Arc::new(DummyContext::new("main"));
//!
//! // Each frame:
//! renderer.evaluate(1);
//! renderer.update(&context)?;
//! renderer.render(&context)?;
//!
//! // At teardown:
//! renderer.dispose();
//! # Ok::<(), streamout_capture::StreamOutError>(())
//! ```

pub mod buffer;
mod cache;
pub mod context;
pub mod error;
pub mod host;
pub mod layout;
pub mod renderer;
pub mod resource;
pub mod settings;
pub mod types;

// Re-export main types for convenience
pub use buffer::StreamOutBuffer;
pub use context::{
    BufferHandle, ContextId, DummyContext, GeometryHandle, RenderContext, StreamOutputBinding,
    TargetHandle,
};
pub use error::{StreamOutError, StreamOutResult};
pub use host::{QueryEventListener, Queryable, RenderLayer, RendererHost};
pub use layout::{ElementFormat, OutputElement, OutputLayout};
pub use renderer::{SlotOutput, StreamOutConfig, StreamOutRenderer};
pub use resource::ContextKeyed;
pub use settings::RenderSettings;
pub use types::{BufferDescriptor, BufferUsage};

/// Maximum number of buffer slots a renderer manages simultaneously.
pub const MAX_BUFFER_SLOTS: usize = 4;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the stream-output capture subsystem.
///
/// Optional; the only effect is a log line for host diagnostics.
pub fn init() {
    log::info!("streamout-capture v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_renderer_creation() {
        let renderer = StreamOutRenderer::new();
        assert_eq!(renderer.slot_count(), 0);
        assert_eq!(renderer.tracked_context_count(), 0);
    }
}
