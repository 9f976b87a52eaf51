//! Output layout descriptions for captured geometry.
//!
//! An [`OutputLayout`] is an ordered list of [`OutputElement`]s describing how
//! the bytes written by the stream-output stage map to named vertex
//! components. A single layout can be shared by every buffer slot, or split
//! into contiguous per-slot sub-layouts via [`OutputLayout::partition`].
//!
//! Elements are immutable values. Partitioning consumes them strictly by
//! ordinal position; their content is never inspected.
//!
//! # Example
//!
//! ```
//! use streamout_capture::{OutputElement, OutputLayout};
//!
//! let layout = OutputLayout::new()
//!     .with_element(OutputElement::position())
//!     .with_element(OutputElement::normal(12))
//!     .with_element(OutputElement::texcoord0(24));
//!
//! assert_eq!(layout.len(), 3);
//! assert_eq!(layout.vertex_stride(), 32);
//! ```

use crate::error::{StreamOutError, StreamOutResult};

/// Format of a captured vertex component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit signed integer.
    Int,
    /// Two 32-bit signed integers.
    Int2,
    /// Three 32-bit signed integers.
    Int3,
    /// Four 32-bit signed integers.
    Int4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Two 32-bit unsigned integers.
    Uint2,
    /// Three 32-bit unsigned integers.
    Uint3,
    /// Four 32-bit unsigned integers.
    Uint4,
}

impl ElementFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Float2 | Self::Int2 | Self::Uint2 => 8,
            Self::Float3 | Self::Int3 | Self::Uint3 => 12,
            Self::Float4 | Self::Int4 | Self::Uint4 => 16,
        }
    }
}

/// A single element of an output layout.
///
/// Describes one named component of a captured vertex: its shader semantic,
/// data format, source buffer slot and byte offset within the vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputElement {
    /// Shader semantic name (e.g. `POSITION`, `TEXCOORD`).
    pub semantic: String,
    /// Index distinguishing repeated semantics (`TEXCOORD0`, `TEXCOORD1`, ...).
    pub semantic_index: u32,
    /// Data format of this element.
    pub format: ElementFormat,
    /// Buffer slot this element is written to.
    pub buffer_slot: u32,
    /// Byte offset within the vertex.
    pub byte_offset: u32,
}

impl OutputElement {
    /// Create a new output element at buffer slot 0.
    pub fn new(semantic: impl Into<String>, format: ElementFormat, byte_offset: u32) -> Self {
        Self {
            semantic: semantic.into(),
            semantic_index: 0,
            format,
            buffer_slot: 0,
            byte_offset,
        }
    }

    /// Create a `POSITION` element (float3) at offset 0.
    pub fn position() -> Self {
        Self::new("POSITION", ElementFormat::Float3, 0)
    }

    /// Create a `NORMAL` element (float3) at the given offset.
    pub fn normal(byte_offset: u32) -> Self {
        Self::new("NORMAL", ElementFormat::Float3, byte_offset)
    }

    /// Create a `TEXCOORD` element (float2) at the given offset.
    pub fn texcoord0(byte_offset: u32) -> Self {
        Self::new("TEXCOORD", ElementFormat::Float2, byte_offset)
    }

    /// Set the semantic index.
    pub fn with_semantic_index(mut self, semantic_index: u32) -> Self {
        self.semantic_index = semantic_index;
        self
    }

    /// Set the buffer slot.
    pub fn at_slot(mut self, buffer_slot: u32) -> Self {
        self.buffer_slot = buffer_slot;
        self
    }

    /// Size in bytes of this element's data.
    pub fn size(&self) -> u32 {
        self.format.size()
    }
}

/// Ordered description of how captured bytes map to vertex components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct OutputLayout {
    elements: Vec<OutputElement>,
    label: Option<String>,
}

impl OutputLayout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element.
    pub fn with_element(mut self, element: OutputElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check whether the layout has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get all elements in order.
    pub fn elements(&self) -> &[OutputElement] {
        &self.elements
    }

    /// Get an element by ordinal position.
    pub fn element(&self, index: usize) -> Option<&OutputElement> {
        self.elements.get(index)
    }

    /// Get the layout label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Sum of the element sizes, in bytes.
    pub fn vertex_stride(&self) -> u32 {
        self.elements.iter().map(|e| e.size()).sum()
    }

    /// Split this layout into one sub-layout per buffer slot.
    ///
    /// `per_slot_counts[i]` is the number of consecutive elements slot `i`
    /// consumes; missing entries default to the sentinel `-1`.
    ///
    /// - If every entry is `-1`, each slot receives a copy of the entire
    ///   layout (independent captures of the same vertex shape, not a split).
    /// - Otherwise elements are consumed left to right from a shared cursor.
    ///   A negative count for a slot takes all remaining elements.
    ///
    /// # Errors
    ///
    /// Returns [`StreamOutError::OutOfRange`] if a slot requests more
    /// elements than remain. Overruns are never silently truncated.
    pub fn partition(
        &self,
        slot_count: usize,
        per_slot_counts: &[i32],
    ) -> StreamOutResult<Vec<OutputLayout>> {
        if slot_count == 0 {
            return Ok(Vec::new());
        }

        let resolved = |slot: usize| per_slot_counts.get(slot).copied().unwrap_or(-1);

        if (0..slot_count).all(|slot| resolved(slot) == -1) {
            return Ok((0..slot_count).map(|_| self.clone()).collect());
        }

        let mut parts = Vec::with_capacity(slot_count);
        let mut cursor = 0usize;
        for slot in 0..slot_count {
            let count = resolved(slot);
            let take = if count < 0 {
                self.elements.len() - cursor
            } else {
                count as usize
            };

            if cursor + take > self.elements.len() {
                return Err(StreamOutError::OutOfRange {
                    slot,
                    requested: take,
                    offset: cursor,
                    available: self.elements.len(),
                });
            }

            parts.push(OutputLayout {
                elements: self.elements[cursor..cursor + take].to_vec(),
                label: self.label.clone(),
            });
            cursor += take;
        }

        Ok(parts)
    }
}

impl FromIterator<OutputElement> for OutputLayout {
    fn from_iter<I: IntoIterator<Item = OutputElement>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_of(n: usize) -> OutputLayout {
        (0..n)
            .map(|i| {
                OutputElement::new("TEXCOORD", ElementFormat::Float4, (i * 16) as u32)
                    .with_semantic_index(i as u32)
            })
            .collect()
    }

    #[test]
    fn test_element_format_size() {
        assert_eq!(ElementFormat::Float.size(), 4);
        assert_eq!(ElementFormat::Float3.size(), 12);
        assert_eq!(ElementFormat::Uint4.size(), 16);
    }

    #[test]
    fn test_vertex_stride() {
        let layout = OutputLayout::new()
            .with_element(OutputElement::position())
            .with_element(OutputElement::normal(12))
            .with_element(OutputElement::texcoord0(24));
        assert_eq!(layout.vertex_stride(), 32);
    }

    #[test]
    fn test_partition_full_layout_per_slot() {
        let layout = layout_of(3);
        let parts = layout.partition(2, &[-1, -1]).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 3);
        assert_eq!(parts[0], layout);
        assert_eq!(parts[1], layout);
    }

    #[test]
    fn test_partition_split() {
        let layout = layout_of(5);
        let parts = layout.partition(2, &[2, 3]).unwrap();

        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 3);
        assert_eq!(parts[0].element(0), layout.element(0));
        assert_eq!(parts[0].element(1), layout.element(1));
        assert_eq!(parts[1].element(0), layout.element(2));
        assert_eq!(parts[1].element(2), layout.element(4));
    }

    #[test]
    fn test_partition_negative_takes_remainder() {
        let layout = layout_of(5);
        let parts = layout.partition(2, &[2, -1]).unwrap();

        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 3);
        assert_eq!(parts[1].element(0), layout.element(2));
    }

    #[test]
    fn test_partition_out_of_range() {
        let layout = layout_of(3);
        let err = layout.partition(2, &[2, 5]).unwrap_err();

        assert_eq!(
            err,
            StreamOutError::OutOfRange {
                slot: 1,
                requested: 5,
                offset: 2,
                available: 3,
            }
        );
    }

    #[test]
    fn test_partition_zero_slots() {
        let layout = layout_of(3);
        assert!(layout.partition(0, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_partition_missing_counts_default_to_sentinel() {
        // One explicit count, the second slot takes the remainder.
        let layout = layout_of(4);
        let parts = layout.partition(2, &[1]).unwrap();
        assert_eq!(parts[0].len(), 1);
        assert_eq!(parts[1].len(), 3);
    }
}
