use egui::{Color32, ColorImage};

use crate::error::{invalid, RenderResult};
use crate::renderer::{render, RenderRequest, SamplePolicy};
use crate::table::WindowTable;
use crate::viewport::{layout, ImageSize, Placement, ViewState, ViewportSize};
use crate::window::{Rescale, WindowLimits};

pub const BACKGROUND: Color32 = Color32::BLACK;

/// Borrowed view of one decoded grayscale slice.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a, S> {
    pub columns: usize,
    pub rows: usize,
    pub pixels: &'a [S],
    pub rescale: Rescale,
}

impl<'a, S> Frame<'a, S> {
    pub fn new(columns: usize, rows: usize, pixels: &'a [S], rescale: Rescale) -> RenderResult<Self> {
        let expected = columns
            .checked_mul(rows)
            .ok_or_else(|| invalid("frame size overflows"))?;
        if expected == 0 {
            return Err(invalid(format!("frame size {columns}x{rows} must be non-empty")));
        }
        if pixels.len() != expected {
            return Err(invalid(format!(
                "frame holds {} samples, {columns}x{rows} needs {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            columns,
            rows,
            pixels,
            rescale,
        })
    }

    pub fn size(&self) -> ImageSize {
        ImageSize {
            columns: self.columns,
            rows: self.rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingParameters {
    pub window_center: f64,
    pub window_width: f64,
    pub invert: bool,
    pub view: ViewState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    Rendered(Placement),
    OutOfView,
}

/// Renders whole frames into a viewport-sized canvas, keeping the window
/// table between calls while the window width and polarity stay the same.
#[derive(Debug, Default)]
pub struct FrameRenderer {
    table: Option<WindowTable>,
    scratch: Vec<Color32>,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&WindowTable> {
        self.table.as_ref()
    }

    pub fn render<S>(
        &mut self,
        frame: &Frame<'_, S>,
        params: &RenderingParameters,
        viewport: ViewportSize,
        out: &mut [Color32],
    ) -> RenderResult<RenderOutcome>
    where
        S: Copy + Into<f64> + Sync,
    {
        let canvas_len = viewport
            .width
            .checked_mul(viewport.height)
            .ok_or_else(|| invalid("viewport size overflows"))?;
        if out.len() != canvas_len {
            return Err(invalid(format!(
                "canvas holds {} pixels, viewport {}x{} needs {canvas_len}",
                out.len(),
                viewport.width,
                viewport.height
            )));
        }

        let limits = WindowLimits::from_center_width(params.window_center, params.window_width)?;
        let placement = layout(frame.size(), viewport, params.view)?;
        self.prepare_table(&limits, params.invert)?;
        let Some(table) = self.table.as_ref() else {
            return Err(invalid("window table was not built"));
        };

        let Some(placement) = placement else {
            log::warn!(
                "{}x{} frame is out of the {}x{} viewport at {:?}",
                frame.columns,
                frame.rows,
                viewport.width,
                viewport.height,
                params.view
            );
            out.fill(BACKGROUND);
            return Ok(RenderOutcome::OutOfView);
        };

        let display = placement.display;
        self.scratch.clear();
        self.scratch.resize(display.len(), BACKGROUND);
        let request = RenderRequest {
            table,
            samples: frame.pixels,
            slice_width: frame.columns,
            anchor: placement.anchor,
            display,
            zoom: params.view.zoom,
            limits,
            rescale: frame.rescale,
            policy: SamplePolicy::Reject,
        };
        render(&request, &mut self.scratch)?;

        out.fill(BACKGROUND);
        let width = display.width();
        for (row, pixels) in self.scratch.chunks_exact(width).enumerate() {
            let start = (display.y0 + row) * viewport.width + display.x0;
            out[start..start + width].copy_from_slice(pixels);
        }

        Ok(RenderOutcome::Rendered(placement))
    }

    pub fn render_color_image<S>(
        &mut self,
        frame: &Frame<'_, S>,
        params: &RenderingParameters,
        viewport: ViewportSize,
    ) -> RenderResult<ColorImage>
    where
        S: Copy + Into<f64> + Sync,
    {
        let len = viewport
            .width
            .checked_mul(viewport.height)
            .ok_or_else(|| invalid("viewport size overflows"))?;
        let mut pixels = vec![BACKGROUND; len];
        self.render(frame, params, viewport, &mut pixels)?;
        Ok(ColorImage {
            size: [viewport.width, viewport.height],
            pixels,
        })
    }

    fn prepare_table(&mut self, limits: &WindowLimits, invert: bool) -> RenderResult<()> {
        let width = limits.width();
        let reusable = self
            .table
            .as_ref()
            .is_some_and(|table| table.is_compatible(width, invert));

        if reusable {
            log::trace!("reusing window table width={width} invert={invert}");
        } else {
            log::debug!("building window table width={width} invert={invert}");
            self.table = Some(WindowTable::new(width, invert)?);
        }
        Ok(())
    }
}
