use crate::canvas::{CssSize, PixelSize};

/// Caps applied when turning a canvas layout size into a pixel buffer size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingLimits {
    pub max_pixel_ratio: f64,
    /// Only previews cap their layout width.
    pub max_css_width: Option<f64>,
}

impl SizingLimits {
    pub const PREVIEW: Self = Self {
        max_pixel_ratio: 1.5,
        max_css_width: Some(640.0),
    };

    pub const FULL: Self = Self {
        max_pixel_ratio: 2.0,
        max_css_width: None,
    };
}

/// Computes the backing buffer size for a canvas.
///
/// A zero layout width falls back to the width cap, a zero layout height to
/// 16:9 of the effective width. Both dimensions are at least one pixel.
pub fn backing_size(css: CssSize, device_pixel_ratio: f64, limits: SizingLimits) -> PixelSize {
    let layout_width = sanitize(css.width);
    let layout_height = sanitize(css.height);

    let max_width = limits.max_css_width.unwrap_or(layout_width);
    let width = if layout_width > 0.0 {
        layout_width
    } else {
        max_width
    }
    .min(max_width);
    let height = if layout_height > 0.0 {
        layout_height
    } else {
        width * 9.0 / 16.0
    };

    let ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    }
    .min(limits.max_pixel_ratio);

    PixelSize::new(to_pixels(width * ratio), to_pixels(height * ratio))
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn to_pixels(value: f64) -> u32 {
    (value.floor().min(u32::MAX as f64) as u32).max(1)
}
