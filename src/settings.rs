//! Render settings for capture passes.

use glam::Mat4;

use crate::context::TargetHandle;

/// Per-pass render configuration handed to the upstream layer.
///
/// A capture pass is a pass-through, not a visual pass: geometry flows
/// through the pipeline unprojected and lands in the bound stream-output
/// buffers instead of a raster target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// View transform.
    pub view: Mat4,
    /// Projection transform.
    pub projection: Mat4,
    /// Combined view-projection transform.
    pub view_projection: Mat4,
    /// Index of the viewport to render into.
    pub viewport_index: u32,
    /// Number of active viewports.
    pub viewport_count: u32,
    /// Logical render width.
    pub render_width: u32,
    /// Logical render height.
    pub render_height: u32,
    /// Logical render depth.
    pub render_depth: u32,
    /// Raster target, absent for capture passes.
    pub back_buffer: Option<TargetHandle>,
}

impl RenderSettings {
    /// Settings for a pass-through capture pass: identity transforms, a
    /// 1x1x1 logical viewport and no back buffer.
    pub fn capture() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            viewport_index: 0,
            viewport_count: 1,
            render_width: 1,
            render_height: 1,
            render_depth: 1,
            back_buffer: None,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_settings_are_identity() {
        let settings = RenderSettings::capture();
        assert_eq!(settings.view, Mat4::IDENTITY);
        assert_eq!(settings.view_projection, Mat4::IDENTITY);
        assert_eq!(
            (settings.render_width, settings.render_height, settings.render_depth),
            (1, 1, 1)
        );
        assert!(settings.back_buffer.is_none());
    }
}
