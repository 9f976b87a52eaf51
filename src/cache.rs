//! Per-context stream-out buffer cache.
//!
//! The cache owns the decision of whether to (re)allocate capture buffers for
//! a render context, and holds the live buffers. One entry exists per context
//! the renderer has been asked to operate on; entries are created lazily on
//! first use and never proactively.

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::StreamOutBuffer;
use crate::context::{BufferHandle, ContextId, GeometryHandle, RenderContext, StreamOutputBinding};
use crate::error::StreamOutResult;
use crate::layout::OutputLayout;
use crate::MAX_BUFFER_SLOTS;

/// Allocation plan for one buffer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotPlan {
    pub vertex_size: u32,
    pub element_count: u32,
    pub layout: OutputLayout,
}

/// Cache entry for one render context.
pub(crate) struct ContextEntry {
    context: Arc<dyn RenderContext>,
    buffers: [Option<StreamOutBuffer>; MAX_BUFFER_SLOTS],
    updated_this_frame: bool,
    rendered_this_frame: bool,
    /// Buffers no longer match the configuration they were built from.
    /// Set when an invalidation frame passes this context by, so the next
    /// Update still rebuilds.
    stale: bool,
}

impl ContextEntry {
    fn new(context: Arc<dyn RenderContext>) -> Self {
        Self {
            context,
            buffers: std::array::from_fn(|_| None),
            updated_this_frame: false,
            rendered_this_frame: false,
            stale: false,
        }
    }

    fn has_buffers(&self) -> bool {
        self.buffers.iter().any(|slot| slot.is_some())
    }

    /// Dispose every buffer held by this entry. Empty slots are skipped, so
    /// repeated calls are harmless.
    fn dispose_buffers(&mut self) {
        for slot in self.buffers.iter_mut() {
            if let Some(mut buffer) = slot.take() {
                if let Err(err) = buffer.dispose(self.context.as_ref()) {
                    log::warn!(
                        "failed to dispose stream-out buffer on context '{}': {err}",
                        self.context.name()
                    );
                }
            }
        }
    }

    /// Replace the buffer set with freshly allocated buffers, one per plan.
    ///
    /// Allocation is all-or-nothing for the entry: on failure every buffer
    /// created so far is released and the entry is left buffer-less.
    fn rebuild(&mut self, plans: &[SlotPlan]) -> StreamOutResult<()> {
        self.dispose_buffers();

        let mut fresh = Vec::with_capacity(plans.len());
        for (slot, plan) in plans.iter().enumerate() {
            match StreamOutBuffer::create(
                self.context.as_ref(),
                plan.vertex_size,
                plan.element_count,
                plan.layout.clone(),
            ) {
                Ok(buffer) => fresh.push(buffer),
                Err(err) => {
                    log::warn!(
                        "stream-out allocation failed on context '{}' slot {slot}: {err}",
                        self.context.name()
                    );
                    for mut buffer in fresh {
                        if let Err(err) = buffer.dispose(self.context.as_ref()) {
                            log::warn!(
                                "failed to roll back stream-out buffer on context '{}': {err}",
                                self.context.name()
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        for (slot, buffer) in fresh.into_iter().enumerate() {
            self.buffers[slot] = Some(buffer);
        }
        self.stale = false;
        Ok(())
    }
}

/// Cache of stream-out buffers, sharded by render context identity.
pub(crate) struct ResourceCache {
    entries: HashMap<ContextId, ContextEntry>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Number of tracked contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reset every entry's per-frame flags. Runs at the start of Evaluate.
    pub fn reset_frame_flags(&mut self) {
        for entry in self.entries.values_mut() {
            entry.updated_this_frame = false;
            entry.rendered_this_frame = false;
        }
    }

    /// Mark every entry's buffers as no longer matching the configuration.
    /// Contexts the scheduler skips this frame rebuild on their next Update.
    pub fn mark_all_stale(&mut self) {
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
    }

    pub fn is_updated(&self, id: ContextId) -> bool {
        self.entries
            .get(&id)
            .map(|e| e.updated_this_frame)
            .unwrap_or(false)
    }

    pub fn mark_updated(&mut self, id: ContextId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.updated_this_frame = true;
        }
    }

    pub fn is_rendered(&self, id: ContextId) -> bool {
        self.entries
            .get(&id)
            .map(|e| e.rendered_this_frame)
            .unwrap_or(false)
    }

    pub fn mark_rendered(&mut self, id: ContextId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.rendered_this_frame = true;
        }
    }

    /// Make sure the context has a buffer set matching `plans`.
    ///
    /// No-op when buffers already exist and nothing was invalidated. Returns
    /// whether a rebuild happened, so the caller can republish handles.
    pub fn ensure_updated(
        &mut self,
        context: &Arc<dyn RenderContext>,
        plans: &[SlotPlan],
        invalidate: bool,
    ) -> StreamOutResult<bool> {
        let entry = self
            .entries
            .entry(context.id())
            .or_insert_with(|| ContextEntry::new(Arc::clone(context)));

        if !invalidate && !entry.stale && entry.has_buffers() {
            return Ok(false);
        }

        entry.rebuild(plans)?;
        Ok(true)
    }

    /// Raw-buffer and vertex-geometry handles per populated slot, in slot order.
    pub fn slot_handles(&self, id: ContextId) -> Vec<(usize, BufferHandle, GeometryHandle)> {
        let Some(entry) = self.entries.get(&id) else {
            return Vec::new();
        };
        entry
            .buffers
            .iter()
            .enumerate()
            .filter_map(|(slot, buffer)| {
                buffer
                    .as_ref()
                    .map(|b| (slot, b.raw_buffer(), b.vertex_geometry()))
            })
            .collect()
    }

    /// Stream-output bindings for the context's buffers, all at byte offset 0,
    /// in slot order. `None` when the context holds no buffers.
    pub fn stream_bindings(&self, id: ContextId) -> Option<Vec<StreamOutputBinding>> {
        let entry = self.entries.get(&id)?;
        let bindings: Vec<_> = entry
            .buffers
            .iter()
            .flatten()
            .map(|b| StreamOutputBinding::new(b.raw_buffer(), 0))
            .collect();
        if bindings.is_empty() {
            None
        } else {
            Some(bindings)
        }
    }

    /// Tear down the context's buffers and forget the entry.
    ///
    /// With `keep_in_memory` set and `force` clear, the entry survives intact
    /// to avoid reallocation churn. Returns whether the entry was dropped.
    pub fn destroy(&mut self, id: ContextId, force: bool, keep_in_memory: bool) -> bool {
        if !force && keep_in_memory {
            return false;
        }
        if let Some(mut entry) = self.entries.remove(&id) {
            entry.dispose_buffers();
            true
        } else {
            false
        }
    }

    /// Dispose every buffer on every tracked context, keeping the entries.
    /// Runs when the slot count changes.
    pub fn dispose_all_buffers(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dispose_buffers();
        }
    }

    /// Dispose everything and drop all entries. Runs at renderer teardown.
    pub fn clear(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dispose_buffers();
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DummyContext;
    use crate::layout::OutputElement;

    fn plans(n: usize) -> Vec<SlotPlan> {
        (0..n)
            .map(|_| SlotPlan {
                vertex_size: 12,
                element_count: 64,
                layout: OutputLayout::new().with_element(OutputElement::position()),
            })
            .collect()
    }

    fn context() -> (Arc<DummyContext>, Arc<dyn RenderContext>) {
        let dummy = Arc::new(DummyContext::new("cache-test"));
        let dyn_ctx: Arc<dyn RenderContext> = dummy.clone();
        (dummy, dyn_ctx)
    }

    #[test]
    fn test_ensure_updated_allocates_once() {
        let (dummy, ctx) = context();
        let mut cache = ResourceCache::new();

        let rebuilt = cache.ensure_updated(&ctx, &plans(2), false).unwrap();
        assert!(rebuilt);
        assert_eq!(dummy.live_buffer_count(), 2);

        // No invalidation, buffers exist: nothing happens.
        let rebuilt = cache.ensure_updated(&ctx, &plans(2), false).unwrap();
        assert!(!rebuilt);
        assert_eq!(dummy.buffers_created(), 2);
    }

    #[test]
    fn test_invalidate_replaces_buffers() {
        let (dummy, ctx) = context();
        let mut cache = ResourceCache::new();

        cache.ensure_updated(&ctx, &plans(2), false).unwrap();
        let before = cache.slot_handles(ctx.id());

        cache.ensure_updated(&ctx, &plans(2), true).unwrap();
        let after = cache.slot_handles(ctx.id());

        assert_ne!(before, after);
        assert_eq!(dummy.live_buffer_count(), 2);
        assert_eq!(dummy.buffers_disposed(), 2);
    }

    #[test]
    fn test_failed_rebuild_leaves_no_buffers() {
        let (dummy, ctx) = context();
        let mut cache = ResourceCache::new();

        // First slot allocates fully, the second slot's view fails: the
        // rebuild must roll the first slot back.
        dummy.set_geometry_budget(1);
        let result = cache.ensure_updated(&ctx, &plans(2), false);

        assert!(result.is_err());
        assert!(cache.slot_handles(ctx.id()).is_empty());
        assert_eq!(dummy.live_buffer_count(), 0);
        assert_eq!(dummy.live_geometry_count(), 0);

        // The context recovers once allocation works again.
        dummy.set_fail_geometry(false);
        cache.ensure_updated(&ctx, &plans(2), false).unwrap();
        assert_eq!(dummy.live_buffer_count(), 2);
    }

    #[test]
    fn test_stale_entries_rebuild_without_invalidation() {
        let (dummy, ctx) = context();
        let mut cache = ResourceCache::new();

        cache.ensure_updated(&ctx, &plans(1), false).unwrap();
        cache.mark_all_stale();

        let rebuilt = cache.ensure_updated(&ctx, &plans(1), false).unwrap();
        assert!(rebuilt);
        assert_eq!(dummy.buffers_created(), 2);

        // A successful rebuild clears the marker.
        let rebuilt = cache.ensure_updated(&ctx, &plans(1), false).unwrap();
        assert!(!rebuilt);
    }

    #[test]
    fn test_destroy_honors_keep_in_memory() {
        let (dummy, ctx) = context();
        let mut cache = ResourceCache::new();
        cache.ensure_updated(&ctx, &plans(1), false).unwrap();

        assert!(!cache.destroy(ctx.id(), false, true));
        assert_eq!(dummy.live_buffer_count(), 1);

        assert!(cache.destroy(ctx.id(), true, true));
        assert_eq!(dummy.live_buffer_count(), 0);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_frame_flags() {
        let (_dummy, ctx) = context();
        let mut cache = ResourceCache::new();
        cache.ensure_updated(&ctx, &plans(1), false).unwrap();

        assert!(!cache.is_updated(ctx.id()));
        cache.mark_updated(ctx.id());
        cache.mark_rendered(ctx.id());
        assert!(cache.is_updated(ctx.id()));
        assert!(cache.is_rendered(ctx.id()));

        cache.reset_frame_flags();
        assert!(!cache.is_updated(ctx.id()));
        assert!(!cache.is_rendered(ctx.id()));
    }
}
