//! Viewport size derivation and quality scale clamping.

use crate::surface::Canvas;

/// Lowest accepted quality scale.
pub const MIN_QUALITY_SCALE: f32 = 0.25;

/// Highest accepted quality scale.
pub const MAX_QUALITY_SCALE: f32 = 1.0;

/// Clamp a requested quality scale into `[MIN_QUALITY_SCALE, MAX_QUALITY_SCALE]`.
///
/// NaN falls back to full quality.
pub fn clamp_quality_scale(scale: f32) -> f32 {
    if scale.is_nan() {
        return MAX_QUALITY_SCALE;
    }
    scale.clamp(MIN_QUALITY_SCALE, MAX_QUALITY_SCALE)
}

/// Render resolution handed to passes and history factories.
///
/// Equality is exact on all four fields; a history resource is rebuilt
/// whenever the stored size differs in any of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramegraphSize {
    /// Width in pixels, at least 1.
    pub width: u32,
    /// Height in pixels, at least 1.
    pub height: u32,
    /// Device pixel ratio multiplied by the quality scale.
    pub pixel_ratio: f32,
    /// Quality scale this size was derived with.
    pub scale: f32,
}

impl FramegraphSize {
    /// Derive the size from canvas layout dimensions.
    ///
    /// Width and height are `floor(client * scale)` clamped to at least 1,
    /// so a detached or collapsed canvas yields a 1x1 size instead of failing.
    pub fn from_canvas(canvas: &dyn Canvas, scale: f32) -> Self {
        Self::from_dimensions(
            canvas.client_width(),
            canvas.client_height(),
            canvas.device_pixel_ratio(),
            scale,
        )
    }

    /// Derive the size from raw layout dimensions.
    pub fn from_dimensions(
        client_width: f32,
        client_height: f32,
        device_pixel_ratio: f32,
        scale: f32,
    ) -> Self {
        Self {
            width: scaled_extent(client_width, scale),
            height: scaled_extent(client_height, scale),
            pixel_ratio: device_pixel_ratio * scale,
            scale,
        }
    }

    /// Number of physical pixels covered by the render target.
    pub fn physical_extent(&self) -> (u32, u32) {
        (
            scaled_extent(self.width as f32, self.pixel_ratio),
            scaled_extent(self.height as f32, self.pixel_ratio),
        )
    }
}

fn scaled_extent(extent: f32, scale: f32) -> u32 {
    let value = (extent * scale).floor();
    if value.is_finite() && value >= 1.0 {
        value as u32
    } else {
        1
    }
}
