use crate::error::{invalid, RenderResult};
use crate::renderer::{in_range, source_coordinate, Anchor, DisplayRect};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub columns: usize,
    pub rows: usize,
}

/// Zoom in display pixels per image pixel; pan as a fraction of the viewport size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Where the whole image lands in the viewport, possibly off-screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRect {
    pub x0: i64,
    pub y0: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub anchor: Anchor,
    pub image_rect: ImageRect,
    /// Viewport pixels whose source sample lies inside the image.
    pub display: DisplayRect,
}

pub fn fit_zoom(image: ImageSize, viewport: ViewportSize) -> RenderResult<f64> {
    if image.columns == 0 || image.rows == 0 {
        return Err(invalid(format!(
            "cannot fit an empty {}x{} image",
            image.columns, image.rows
        )));
    }
    let horizontal = viewport.width as f64 / image.columns as f64;
    let vertical = viewport.height as f64 / image.rows as f64;
    Ok(horizontal.min(vertical))
}

/// Centres the zoomed image in the viewport, shifts it by the pan, and clips
/// it to the viewport. `None` means no part of the image is visible.
pub fn layout(
    image: ImageSize,
    viewport: ViewportSize,
    view: ViewState,
) -> RenderResult<Option<Placement>> {
    if image.columns == 0 || image.rows == 0 {
        return Err(invalid(format!(
            "image size {}x{} must be non-empty",
            image.columns, image.rows
        )));
    }
    if !view.zoom.is_finite() || view.zoom <= 0.0 {
        return Err(invalid(format!(
            "zoom must be finite and positive, got {}",
            view.zoom
        )));
    }
    if !view.pan_x.is_finite() || !view.pan_y.is_finite() {
        return Err(invalid(format!(
            "pan ({}, {}) must be finite",
            view.pan_x, view.pan_y
        )));
    }

    let image_width = (image.columns as f64 * view.zoom).round();
    let image_height = (image.rows as f64 * view.zoom).round();
    let origin_x =
        ((viewport.width as f64 - image_width) / 2.0 + view.pan_x * viewport.width as f64).round();
    let origin_y = ((viewport.height as f64 - image_height) / 2.0
        + view.pan_y * viewport.height as f64)
        .round();

    let image_rect = ImageRect {
        x0: origin_x as i64,
        y0: origin_y as i64,
        width: image_width as i64,
        height: image_height as i64,
    };

    let columns = visible_span(origin_x, image.columns, view.zoom, viewport.width);
    let rows = visible_span(origin_y, image.rows, view.zoom, viewport.height);
    let (Some((x0, x1)), Some((y0, y1))) = (columns, rows) else {
        log::debug!("image {image_rect:?} lies outside {viewport:?}");
        return Ok(None);
    };

    let placement = Placement {
        anchor: Anchor::new(origin_x, origin_y),
        image_rect,
        display: DisplayRect::new(x0, y0, x1, y1),
    };
    log::debug!("layout {placement:?}");
    Ok(Some(placement))
}

fn visible_span(origin: f64, extent: usize, zoom: f64, viewport: usize) -> Option<(usize, usize)> {
    let start = origin.ceil().max(0.0);
    let end = (origin + extent as f64 * zoom).ceil().min(viewport as f64);
    if start >= end {
        return None;
    }

    // Settle float edge cases against the renderer's own sampling rule.
    let mut start = start as usize;
    let mut end = end as usize;
    while start < end && !in_range(source_coordinate(start, origin, zoom), extent) {
        start += 1;
    }
    while end > start && !in_range(source_coordinate(end - 1, origin, zoom), extent) {
        end -= 1;
    }
    (start < end).then_some((start, end))
}
