//! Stream-output capture renderer.
//!
//! [`StreamOutRenderer`] orchestrates up to [`MAX_BUFFER_SLOTS`] capture
//! buffer slots across any number of independent render contexts. Each frame
//! the external scheduler drives one cycle:
//!
//! 1. [`evaluate`](StreamOutRenderer::evaluate) once: resolve the slot count,
//!    diff the configuration against the previous frame, and reset per-frame
//!    idempotency flags.
//! 2. [`update`](StreamOutRenderer::update) per context: lazily (re)allocate
//!    that context's buffer set when the configuration changed or no buffers
//!    exist yet.
//! 3. [`render`](StreamOutRenderer::render) per context: bind the buffers as
//!    stream-output targets, run the upstream layer through a pass-through
//!    capture pass, unbind.
//! 4. [`destroy`](StreamOutRenderer::destroy) per context at teardown or
//!    device loss, and [`dispose`](StreamOutRenderer::dispose) when the
//!    renderer itself goes away.
//!
//! Update and Render are idempotent per context per frame, so a scheduler
//! that visits the renderer through several graph paths performs the work
//! only once. Render defensively runs Update first if the scheduler arrived
//! out of order.

use std::sync::Arc;

use crate::cache::{ResourceCache, SlotPlan};
use crate::context::{BufferHandle, ContextId, GeometryHandle, RenderContext};
use crate::error::StreamOutResult;
use crate::host::{QueryEventListener, Queryable, RenderLayer, RendererHost};
use crate::layout::OutputLayout;
use crate::resource::ContextKeyed;
use crate::settings::RenderSettings;
use crate::MAX_BUFFER_SLOTS;

/// Default size in bytes of one captured vertex (a float3 position).
pub const DEFAULT_VERTEX_SIZE: u32 = 12;

/// Default number of vertices a capture buffer holds.
pub const DEFAULT_ELEMENT_COUNT: u32 = 512;

/// Configuration of a [`StreamOutRenderer`].
///
/// The per-slot vectors (`vertex_sizes`, `element_counts`,
/// `layout_element_counts`) are indexed per buffer slot with cyclic wrap, so
/// a one-element vector applies the same value to every slot. An empty
/// vector falls back to the built-in default.
///
/// Changes take effect at the next [`evaluate`](StreamOutRenderer::evaluate)
/// call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutConfig {
    /// Number of buffer slots. Clamped to `[0, 4]` at evaluation time.
    pub buffer_count: i32,
    /// Size in bytes of one captured vertex, per slot.
    pub vertex_sizes: Vec<u32>,
    /// Capacity in vertices of each buffer, per slot.
    pub element_counts: Vec<u32>,
    /// Layout of the captured output.
    pub layout: OutputLayout,
    /// Number of layout elements each slot consumes; `-1` is the sentinel
    /// for "all" (see [`OutputLayout::partition`]).
    pub layout_element_counts: Vec<i32>,
    /// Whether the capture pass actually executes.
    pub enabled: bool,
    /// Keep buffers alive through non-forced Destroy calls.
    pub keep_in_memory: bool,
}

impl Default for StreamOutConfig {
    fn default() -> Self {
        Self {
            buffer_count: 1,
            vertex_sizes: vec![DEFAULT_VERTEX_SIZE],
            element_counts: vec![DEFAULT_ELEMENT_COUNT],
            layout: OutputLayout::new(),
            layout_element_counts: vec![-1],
            enabled: true,
            keep_in_memory: false,
        }
    }
}

impl StreamOutConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of buffer slots.
    pub fn with_buffer_count(mut self, buffer_count: i32) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    /// Set a single vertex size applied to every slot.
    pub fn with_vertex_size(mut self, vertex_size: u32) -> Self {
        self.vertex_sizes = vec![vertex_size];
        self
    }

    /// Set per-slot vertex sizes.
    pub fn with_vertex_sizes(mut self, vertex_sizes: Vec<u32>) -> Self {
        self.vertex_sizes = vertex_sizes;
        self
    }

    /// Set a single element count applied to every slot.
    pub fn with_element_count(mut self, element_count: u32) -> Self {
        self.element_counts = vec![element_count];
        self
    }

    /// Set per-slot element counts.
    pub fn with_element_counts(mut self, element_counts: Vec<u32>) -> Self {
        self.element_counts = element_counts;
        self
    }

    /// Set the output layout.
    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the per-slot layout element counts.
    pub fn with_layout_element_counts(mut self, counts: Vec<i32>) -> Self {
        self.layout_element_counts = counts;
        self
    }

    /// Enable or disable the capture pass.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Keep buffers alive through non-forced Destroy calls.
    pub fn with_keep_in_memory(mut self, keep_in_memory: bool) -> Self {
        self.keep_in_memory = keep_in_memory;
        self
    }
}

/// Snapshot of the allocation-relevant configuration, diffed each Evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfigSnapshot {
    vertex_sizes: Vec<u32>,
    element_counts: Vec<u32>,
    layout: OutputLayout,
    layout_element_counts: Vec<i32>,
}

impl ConfigSnapshot {
    fn of(config: &StreamOutConfig) -> Self {
        Self {
            vertex_sizes: config.vertex_sizes.clone(),
            element_counts: config.element_counts.clone(),
            layout: config.layout.clone(),
            layout_element_counts: config.layout_element_counts.clone(),
        }
    }
}

/// Published handles of one buffer slot, keyed by render context.
#[derive(Debug, Clone, Default)]
pub struct SlotOutput {
    geometry: ContextKeyed<GeometryHandle>,
    raw_buffer: ContextKeyed<BufferHandle>,
}

impl SlotOutput {
    /// Per-context vertex-geometry handles for this slot.
    pub fn geometry(&self) -> &ContextKeyed<GeometryHandle> {
        &self.geometry
    }

    /// Per-context raw-buffer handles for this slot.
    pub fn raw_buffer(&self) -> &ContextKeyed<BufferHandle> {
        &self.raw_buffer
    }

    fn remove(&mut self, context: ContextId) {
        self.geometry.remove(context);
        self.raw_buffer.remove(context);
    }

    fn clear(&mut self) {
        self.geometry.clear();
        self.raw_buffer.clear();
    }
}

/// Captures transformed geometry from an upstream layer into readable raw
/// buffers, one set per render context.
pub struct StreamOutRenderer {
    config: StreamOutConfig,
    previous: Option<ConfigSnapshot>,
    slot_count: usize,
    invalidate: bool,
    outputs: Vec<SlotOutput>,
    cache: ResourceCache,
    layer: Option<Arc<dyn RenderLayer>>,
    query_listener: Option<Arc<dyn QueryEventListener>>,
}

impl StreamOutRenderer {
    /// Create a renderer with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StreamOutConfig::default())
    }

    /// Create a renderer with the given configuration.
    pub fn with_config(config: StreamOutConfig) -> Self {
        Self {
            config,
            previous: None,
            slot_count: 0,
            invalidate: false,
            outputs: Vec::new(),
            cache: ResourceCache::new(),
            layer: None,
            query_listener: None,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &StreamOutConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next
    /// [`evaluate`](Self::evaluate).
    pub fn set_config(&mut self, config: StreamOutConfig) {
        self.config = config;
    }

    /// Connect the upstream layer whose output is captured.
    pub fn connect_layer(&mut self, layer: Arc<dyn RenderLayer>) {
        self.layer = Some(layer);
    }

    /// Disconnect the upstream layer. Subsequent renders capture nothing.
    pub fn disconnect_layer(&mut self) {
        self.layer = None;
    }

    /// Whether an upstream layer is connected.
    pub fn is_layer_connected(&self) -> bool {
        self.layer.is_some()
    }

    /// Resolved number of active buffer slots.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Whether the capture pass executes when rendered.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether the current GPU resources are stale relative to the current
    /// configuration and will be rebuilt by the next Update.
    pub fn is_invalidated(&self) -> bool {
        self.invalidate
    }

    /// Number of render contexts this renderer currently tracks.
    pub fn tracked_context_count(&self) -> usize {
        self.cache.len()
    }

    /// Published output handles for a slot.
    pub fn output(&self, slot: usize) -> Option<&SlotOutput> {
        self.outputs.get(slot)
    }

    /// Published outputs of every active slot, in slot order.
    pub fn outputs(&self) -> &[SlotOutput] {
        &self.outputs
    }

    /// Per-context vertex-geometry handles for a slot.
    pub fn geometry_output(&self, slot: usize) -> Option<&ContextKeyed<GeometryHandle>> {
        self.outputs.get(slot).map(|s| s.geometry())
    }

    /// Per-context raw-buffer handles for a slot.
    pub fn raw_buffer_output(&self, slot: usize) -> Option<&ContextKeyed<BufferHandle>> {
        self.outputs.get(slot).map(|s| s.raw_buffer())
    }

    /// Begin a frame: resolve the slot count, diff the configuration and
    /// reset the per-frame idempotency flags.
    ///
    /// `spread_size` is the host's input spread size; zero means no upstream
    /// configuration is present and the renderer collapses to zero slots.
    ///
    /// A slot-count change retires every buffer on every tracked context
    /// immediately, before any Update runs.
    pub fn evaluate(&mut self, spread_size: usize) {
        let snapshot = ConfigSnapshot::of(&self.config);
        self.invalidate = match &self.previous {
            Some(previous) => *previous != snapshot,
            None => false,
        };
        self.previous = Some(snapshot);

        let requested = if spread_size == 0 {
            0
        } else {
            self.config.buffer_count
        };
        let slot_count = requested.clamp(0, MAX_BUFFER_SLOTS as i32) as usize;

        if slot_count != self.slot_count {
            log::debug!(
                "stream-out slot count changed from {} to {}, retiring all buffers",
                self.slot_count,
                slot_count
            );
            self.cache.dispose_all_buffers();
            for slot in &mut self.outputs {
                slot.clear();
            }
            self.invalidate = true;
        }
        self.slot_count = slot_count;

        // Placeholder outputs for newly exposed slots; existing slots keep
        // their published handles until the next rebuild.
        self.outputs.resize_with(slot_count, SlotOutput::default);

        if self.invalidate {
            // Contexts the scheduler skips this frame must not keep buffers
            // built from the old configuration.
            self.cache.mark_all_stale();
        }

        self.cache.reset_frame_flags();
    }

    /// Make sure the context's buffer set exists and matches the current
    /// configuration. No-op with zero slots, and at most one allocation pass
    /// per context per frame.
    ///
    /// # Errors
    ///
    /// Propagates partitioning and allocation failures. On failure the
    /// context is left buffer-less, never half-allocated.
    pub fn update(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()> {
        if self.slot_count == 0 {
            return Ok(());
        }
        if self.cache.is_updated(context.id()) {
            return Ok(());
        }

        let plans = self.slot_plans()?;
        let rebuilt = self.cache.ensure_updated(context, &plans, self.invalidate)?;
        if rebuilt {
            self.publish(context.id());
        }
        self.cache.mark_updated(context.id());
        Ok(())
    }

    /// Execute the capture pass on the context.
    ///
    /// Runs Update first if the scheduler hasn't yet this frame. No-op with
    /// zero slots, without a connected layer, or when the context was already
    /// rendered this frame. When disabled, the bind/draw/unbind sequence and
    /// the query hooks are skipped but the context still counts as rendered.
    pub fn render(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()> {
        if self.slot_count == 0 {
            return Ok(());
        }

        // Just in case the scheduler reaches Render before Update.
        if !self.cache.is_updated(context.id()) {
            if let Err(err) = self.update(context) {
                log::warn!(
                    "stream-out update failed during render on context '{}': {err}",
                    context.name()
                );
                return Ok(());
            }
        }

        if self.layer.is_none() {
            return Ok(());
        }
        if self.cache.is_rendered(context.id()) {
            return Ok(());
        }

        if self.config.enabled {
            let Some(bindings) = self.cache.stream_bindings(context.id()) else {
                log::warn!(
                    "stream-out buffers missing on context '{}', skipping capture",
                    context.name()
                );
                return Ok(());
            };

            if let Some(listener) = &self.query_listener {
                listener.on_begin_query(context);
            }

            // Capture runs with no raster target bound.
            context.set_render_targets(&[]);
            context.set_stream_output_targets(Some(&bindings));

            let settings = RenderSettings::capture();
            if let Some(layer) = &self.layer {
                layer.render_all(context, &settings);
            }

            context.set_stream_output_targets(None);

            if let Some(listener) = &self.query_listener {
                listener.on_end_query(context);
            }
        }

        self.cache.mark_rendered(context.id());
        Ok(())
    }

    /// Tear down the context's buffers and drop its published handles.
    ///
    /// With `force` clear, a renderer configured with
    /// [`keep_in_memory`](StreamOutConfig::keep_in_memory) retains the
    /// buffers to avoid reallocation churn on the next frame.
    pub fn destroy(&mut self, context: &Arc<dyn RenderContext>, force: bool) {
        let id = context.id();
        if self.cache.destroy(id, force, self.config.keep_in_memory) {
            for slot in &mut self.outputs {
                slot.remove(id);
            }
            log::debug!(
                "destroyed stream-out buffers on context '{}'",
                context.name()
            );
        }
    }

    /// Tear down everything on every tracked context, ignoring
    /// `keep_in_memory`. Total and best-effort: disposal problems are logged,
    /// never raised.
    pub fn dispose(&mut self) {
        self.cache.clear();
        for slot in &mut self.outputs {
            slot.clear();
        }
    }

    fn slot_plans(&self) -> StreamOutResult<Vec<SlotPlan>> {
        let counts: Vec<i32> = (0..self.slot_count)
            .map(|slot| spread(&self.config.layout_element_counts, slot, -1))
            .collect();
        let layouts = self.config.layout.partition(self.slot_count, &counts)?;

        Ok(layouts
            .into_iter()
            .enumerate()
            .map(|(slot, layout)| SlotPlan {
                vertex_size: spread(&self.config.vertex_sizes, slot, DEFAULT_VERTEX_SIZE),
                element_count: spread(&self.config.element_counts, slot, DEFAULT_ELEMENT_COUNT),
                layout,
            })
            .collect())
    }

    fn publish(&mut self, id: ContextId) {
        for (slot, buffer, geometry) in self.cache.slot_handles(id) {
            if let Some(output) = self.outputs.get_mut(slot) {
                output.raw_buffer.set(id, buffer);
                output.geometry.set(id, geometry);
            }
        }
    }
}

impl Default for StreamOutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererHost for StreamOutRenderer {
    fn is_enabled(&self) -> bool {
        StreamOutRenderer::is_enabled(self)
    }

    fn update(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()> {
        StreamOutRenderer::update(self, context)
    }

    fn render(&mut self, context: &Arc<dyn RenderContext>) -> StreamOutResult<()> {
        StreamOutRenderer::render(self, context)
    }

    fn destroy(&mut self, context: &Arc<dyn RenderContext>, force: bool) {
        StreamOutRenderer::destroy(self, context, force)
    }
}

impl Queryable for StreamOutRenderer {
    fn set_query_listener(&mut self, listener: Arc<dyn QueryEventListener>) {
        self.query_listener = Some(listener);
    }

    fn clear_query_listener(&mut self) {
        self.query_listener = None;
    }

    fn has_query_listener(&self) -> bool {
        self.query_listener.is_some()
    }
}

impl std::fmt::Debug for StreamOutRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOutRenderer")
            .field("slot_count", &self.slot_count)
            .field("invalidate", &self.invalidate)
            .field("tracked_contexts", &self.cache.len())
            .field("layer_connected", &self.layer.is_some())
            .finish()
    }
}

/// Index a per-slot value vector with cyclic wrap, falling back to a default
/// when the vector is empty.
fn spread<T: Copy>(values: &[T], index: usize, fallback: T) -> T {
    if values.is_empty() {
        fallback
    } else {
        values[index % values.len()]
    }
}

// Ensure StreamOutRenderer is Send + Sync
static_assertions::assert_impl_all!(StreamOutRenderer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OutputElement;

    #[test]
    fn test_spread_indexing() {
        assert_eq!(spread(&[12u32, 16], 0, 0), 12);
        assert_eq!(spread(&[12u32, 16], 1, 0), 16);
        assert_eq!(spread(&[12u32, 16], 2, 0), 12);
        assert_eq!(spread::<u32>(&[], 3, 99), 99);
    }

    #[test]
    fn test_snapshot_diff() {
        let config = StreamOutConfig::default();
        let a = ConfigSnapshot::of(&config);
        let b = ConfigSnapshot::of(&config.clone().with_vertex_size(16));
        let c = ConfigSnapshot::of(&config);

        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_snapshot_sees_layout_content() {
        let base = StreamOutConfig::default()
            .with_layout(OutputLayout::new().with_element(OutputElement::position()));
        let changed = base.clone().with_layout(
            OutputLayout::new().with_element(OutputElement::normal(0)),
        );

        assert_ne!(ConfigSnapshot::of(&base), ConfigSnapshot::of(&changed));
    }

    #[test]
    fn test_config_builders() {
        let config = StreamOutConfig::new()
            .with_buffer_count(3)
            .with_vertex_sizes(vec![12, 16])
            .with_element_count(128)
            .with_layout_element_counts(vec![2, -1])
            .with_enabled(false)
            .with_keep_in_memory(true);

        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.vertex_sizes, vec![12, 16]);
        assert_eq!(config.element_counts, vec![128]);
        assert!(!config.enabled);
        assert!(config.keep_in_memory);
    }

    #[test]
    fn test_fresh_renderer_has_no_slots() {
        let renderer = StreamOutRenderer::new();
        assert_eq!(renderer.slot_count(), 0);
        assert!(!renderer.is_invalidated());
        assert!(renderer.outputs().is_empty());
    }
}
