//! Host-facing capability traits.
//!
//! An external frame scheduler drives the capture renderer through
//! [`RendererHost`]: Evaluate once per frame on the renderer itself, then
//! Update/Render per participating context, then Destroy at teardown or
//! device-loss time. [`Queryable`] exposes the renderer's begin/end query
//! hooks to downstream consumers. [`RenderLayer`] is the upstream input the
//! renderer captures, and [`QueryEventListener`] the optional telemetry sink.

use std::sync::Arc;

use crate::context::RenderContext;
use crate::error::StreamOutResult;
use crate::settings::RenderSettings;

/// Upstream renderable input.
///
/// The capture renderer does not know or care what a layer draws, only that
/// it executes while stream-output targets are bound.
pub trait RenderLayer: Send + Sync {
    /// Draw everything this layer holds on the given context.
    fn render_all(&self, context: &Arc<dyn RenderContext>, settings: &RenderSettings);
}

/// Telemetry sink for GPU timing queries around a capture pass.
///
/// At most one listener is registered at a time; both hooks are invoked
/// synchronously inline, only around an actual enabled pass.
pub trait QueryEventListener: Send + Sync {
    /// Called immediately before the capture pass is recorded.
    fn on_begin_query(&self, context: &Arc<dyn RenderContext>);

    /// Called immediately after the capture pass is recorded.
    fn on_end_query(&self, context: &Arc<dyn RenderContext>);
}

/// Per-context lifecycle capability driven by the frame scheduler.
pub trait RendererHost {
    /// Whether this renderer currently produces output when rendered.
    fn is_enabled(&self) -> bool;

    /// Make sure GPU resources for the context exist and match the current
    /// configuration. Idempotent within a frame.
    fn update(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()>;

    /// Execute the capture pass on the context. Idempotent within a frame.
    fn render(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()>;

    /// Tear down the context's GPU resources. With `force` clear, a renderer
    /// configured to keep buffers in memory retains them.
    fn destroy(&mut self, context: &Arc<dyn RenderContext>, force: bool);
}

/// Access to the begin/end query hooks of a query-capable renderer.
pub trait Queryable {
    /// Register the listener, replacing any previous one.
    fn set_query_listener(&mut self, listener: Arc<dyn QueryEventListener>);

    /// Remove the registered listener, if any.
    fn clear_query_listener(&mut self);

    /// Whether a listener is currently registered.
    fn has_query_listener(&self) -> bool;
}
