use egui::{Color32, ColorImage};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{invalid, RenderError, RenderResult};
use crate::table::WindowTable;
use crate::window::{Rescale, WindowLimits};

/// Display coordinate where image pixel (0, 0) begins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Half-open display rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl DisplayRect {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn len(&self) -> usize {
        self.width().saturating_mul(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What to do with display pixels whose source sample lies outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplePolicy {
    /// Fail the whole call before anything is written.
    #[default]
    Reject,
    /// Paint those pixels with a fixed gray level.
    Fill(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a, S> {
    pub table: &'a WindowTable,
    pub samples: &'a [S],
    pub slice_width: usize,
    pub anchor: Anchor,
    pub display: DisplayRect,
    pub zoom: f64,
    pub limits: WindowLimits,
    pub rescale: Rescale,
    pub policy: SamplePolicy,
}

#[derive(Debug, Clone, Copy)]
struct SourceGeometry {
    columns: usize,
    rows: usize,
}

/// Windows, levels and resamples `request.samples` into `out`, one pixel per
/// display coordinate in row-major order.
///
/// Every argument is checked before the first write, so on error `out` is untouched.
pub fn render<S>(request: &RenderRequest<'_, S>, out: &mut [Color32]) -> RenderResult<()>
where
    S: Copy + Into<f64> + Sync,
{
    let Some(geometry) = validate(request, out.len())? else {
        return Ok(());
    };

    log::trace!(
        "render {}x{} at ({}, {}) zoom={} window=[{}, {})",
        request.display.width(),
        request.display.height(),
        request.display.x0,
        request.display.y0,
        request.zoom,
        request.limits.left,
        request.limits.right
    );

    #[cfg(feature = "parallel")]
    {
        if request.display.len() >= crate::config::parallel_min_pixels() {
            render_parallel(request, geometry, out);
            return Ok(());
        }
    }

    render_serial(request, geometry, out);
    Ok(())
}

pub fn render_into_vec<S>(request: &RenderRequest<'_, S>) -> RenderResult<Vec<Color32>>
where
    S: Copy + Into<f64> + Sync,
{
    let len = request
        .display
        .width()
        .checked_mul(request.display.height())
        .ok_or_else(|| invalid("display rect size overflows"))?;
    let mut pixels = vec![Color32::BLACK; len];
    render(request, &mut pixels)?;
    Ok(pixels)
}

pub fn into_color_image(display: DisplayRect, pixels: Vec<Color32>) -> RenderResult<ColorImage> {
    if pixels.len() != display.len() {
        return Err(invalid(format!(
            "{} pixels do not fill a {}x{} image",
            pixels.len(),
            display.width(),
            display.height()
        )));
    }

    Ok(ColorImage {
        size: [display.width(), display.height()],
        pixels,
    })
}

/// Source coordinate sampled by display pixel `display`: `(display - anchor) / zoom`
/// truncated toward negative infinity, so pixels left of or above the anchor
/// never fold onto row or column 0.
#[inline]
pub fn source_coordinate(display: usize, anchor: f64, zoom: f64) -> i64 {
    ((display as f64 - anchor) / zoom).floor() as i64
}

fn validate<S>(
    request: &RenderRequest<'_, S>,
    out_len: usize,
) -> RenderResult<Option<SourceGeometry>> {
    let display = request.display;
    if display.x1 < display.x0 || display.y1 < display.y0 {
        return Err(invalid(format!(
            "display rect [{}, {}) x [{}, {}) has negative extent",
            display.x0, display.x1, display.y0, display.y1
        )));
    }

    let expected = display
        .width()
        .checked_mul(display.height())
        .ok_or_else(|| invalid("display rect size overflows"))?;
    if out_len != expected {
        return Err(invalid(format!(
            "output buffer holds {} pixels, display rect needs {}",
            out_len, expected
        )));
    }

    if !request.zoom.is_finite() || request.zoom <= 0.0 {
        return Err(invalid(format!(
            "zoom must be finite and positive, got {}",
            request.zoom
        )));
    }
    if !request.anchor.x.is_finite() || !request.anchor.y.is_finite() {
        return Err(invalid(format!(
            "anchor ({}, {}) must be finite",
            request.anchor.x, request.anchor.y
        )));
    }
    if !request.rescale.is_finite() {
        return Err(invalid(format!(
            "rescale slope {} and intercept {} must be finite",
            request.rescale.slope, request.rescale.intercept
        )));
    }

    if request.slice_width == 0 {
        return Err(invalid("slice width must be greater than zero"));
    }
    if request.samples.len() % request.slice_width != 0 {
        return Err(invalid(format!(
            "raw buffer of {} samples is not a whole number of {}-sample rows",
            request.samples.len(),
            request.slice_width
        )));
    }
    let geometry = SourceGeometry {
        columns: request.slice_width,
        rows: request.samples.len() / request.slice_width,
    };

    if request.table.len() != request.limits.width() as usize {
        return Err(invalid(format!(
            "window table has {} entries, window [{}, {}) needs {}",
            request.table.len(),
            request.limits.left,
            request.limits.right,
            request.limits.width()
        )));
    }

    if display.is_empty() {
        return Ok(None);
    }

    if request.policy == SamplePolicy::Reject {
        check_corners(request, geometry)?;
    }

    Ok(Some(geometry))
}

// The display-to-source mapping is monotone on each axis, so the extreme rows
// and columns bound every sample the loop will read.
fn check_corners<S>(request: &RenderRequest<'_, S>, geometry: SourceGeometry) -> RenderResult<()> {
    let display = request.display;
    let xs = [display.x0, display.x1 - 1];
    let ys = [display.y0, display.y1 - 1];

    for &y in &ys {
        for &x in &xs {
            let sx = source_coordinate(x, request.anchor.x, request.zoom);
            let sy = source_coordinate(y, request.anchor.y, request.zoom);
            if !in_range(sx, geometry.columns) || !in_range(sy, geometry.rows) {
                return Err(RenderError::SampleOutOfBounds {
                    x: x as i64,
                    y: y as i64,
                    index: sy
                        .saturating_mul(geometry.columns as i64)
                        .saturating_add(sx),
                    len: request.samples.len(),
                });
            }
        }
    }
    Ok(())
}

#[inline]
pub(crate) fn in_range(coordinate: i64, extent: usize) -> bool {
    coordinate >= 0 && (coordinate as u64) < extent as u64
}

fn render_serial<S>(request: &RenderRequest<'_, S>, geometry: SourceGeometry, out: &mut [Color32])
where
    S: Copy + Into<f64>,
{
    let width = request.display.width();
    for (row, row_out) in out.chunks_mut(width).enumerate() {
        render_row(request, geometry, request.display.y0 + row, row_out);
    }
}

#[cfg(feature = "parallel")]
fn render_parallel<S>(request: &RenderRequest<'_, S>, geometry: SourceGeometry, out: &mut [Color32])
where
    S: Copy + Into<f64> + Sync,
{
    log::debug!(
        "rendering {} pixels on {} rayon threads",
        out.len(),
        rayon::current_num_threads()
    );
    let width = request.display.width();
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, row_out)| {
            render_row(request, geometry, request.display.y0 + row, row_out);
        });
}

fn render_row<S>(
    request: &RenderRequest<'_, S>,
    geometry: SourceGeometry,
    y: usize,
    row_out: &mut [Color32],
) where
    S: Copy + Into<f64>,
{
    let fill = match request.policy {
        SamplePolicy::Fill(intensity) => Color32::from_gray(intensity),
        SamplePolicy::Reject => Color32::BLACK,
    };

    let sy = source_coordinate(y, request.anchor.y, request.zoom);
    if !in_range(sy, geometry.rows) {
        row_out.fill(fill);
        return;
    }
    let row_start = sy as usize * geometry.columns;
    let source_row = &request.samples[row_start..row_start + geometry.columns];

    for (offset, pixel) in row_out.iter_mut().enumerate() {
        let sx = source_coordinate(request.display.x0 + offset, request.anchor.x, request.zoom);
        *pixel = if in_range(sx, geometry.columns) {
            let value = request.rescale.apply(source_row[sx as usize].into());
            Color32::from_gray(window_intensity(request.table, request.limits, value))
        } else {
            fill
        };
    }
}

const BELOW_WINDOW: u8 = 0;
const ABOVE_WINDOW: u8 = u8::MAX;

// Values outside the window saturate the same way whatever the table holds.
#[inline]
fn window_intensity(table: &WindowTable, limits: WindowLimits, value: i64) -> u8 {
    if value < limits.left {
        BELOW_WINDOW
    } else if value >= limits.right {
        ABOVE_WINDOW
    } else {
        table
            .get((value - limits.left) as usize)
            .unwrap_or(ABOVE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        table: &'a WindowTable,
        samples: &'a [i32],
        slice_width: usize,
        display: DisplayRect,
        zoom: f64,
        limits: WindowLimits,
    ) -> RenderRequest<'a, i32> {
        RenderRequest {
            table,
            samples,
            slice_width,
            anchor: Anchor::new(display.x0 as f64, display.y0 as f64),
            display,
            zoom,
            limits,
            rescale: Rescale::IDENTITY,
            policy: SamplePolicy::Reject,
        }
    }

    fn grays(pixels: &[Color32]) -> Vec<u8> {
        pixels
            .iter()
            .map(|pixel| {
                assert_eq!(pixel.r(), pixel.g());
                assert_eq!(pixel.g(), pixel.b());
                assert_eq!(pixel.a(), 255);
                pixel.r()
            })
            .collect()
    }

    #[test]
    fn value_inside_window_uses_table_offset() {
        let limits = WindowLimits::new(100, 200).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [150];
        let req = request(&table, &samples, 1, DisplayRect::new(0, 0, 1, 1), 1.0, limits);

        let pixels = render_into_vec(&req).expect("render");
        assert_eq!(grays(&pixels), vec![table.entries()[50]]);
        assert_eq!(pixels[0], Color32::from_gray(128));
    }

    #[test]
    fn values_outside_window_saturate() {
        let limits = WindowLimits::new(100, 200).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [-5000, 99, 100, 199, 200, 5000];
        let req = request(&table, &samples, 6, DisplayRect::new(0, 0, 6, 1), 1.0, limits);

        let pixels = render_into_vec(&req).expect("render");
        assert_eq!(grays(&pixels), vec![0, 0, 0, 253, 255, 255]);
    }

    #[test]
    fn inverted_table_keeps_window_clamp() {
        let limits = WindowLimits::new(0, 10).expect("limits");
        let table = WindowTable::for_limits(&limits, true).expect("table");
        let samples = [-1, 0, 9, 10];
        let req = request(&table, &samples, 4, DisplayRect::new(0, 0, 4, 1), 1.0, limits);

        let pixels = render_into_vec(&req).expect("render");
        assert_eq!(grays(&pixels), vec![0, 255, 25, 255]);
    }

    #[test]
    fn clamp_ignores_table_contents_for_both_polarities() {
        let limits = WindowLimits::new(100, 200).expect("limits");
        let samples = [i32::MIN, -5, 99, 150, 200, 201, i32::MAX];
        for invert in [false, true] {
            let flat = WindowTable::from_entries(vec![77; 100], invert);
            let ramp = WindowTable::for_limits(&limits, invert).expect("table");
            for table in [&flat, &ramp] {
                let req = request(table, &samples, 7, DisplayRect::new(0, 0, 7, 1), 1.0, limits);
                let pixels = grays(&render_into_vec(&req).expect("render"));
                assert_eq!(pixels[..3], [0, 0, 0], "invert {invert}");
                assert_eq!(pixels[3], table.entries()[50], "invert {invert}");
                assert_eq!(pixels[4..], [255, 255, 255], "invert {invert}");
            }
        }
    }

    #[test]
    fn identity_transform_reproduces_lookup() {
        let limits = WindowLimits::new(-50, 150).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let rescale = Rescale::new(2.0, -30.0);
        let (columns, rows) = (7usize, 5usize);
        let samples: Vec<i32> = (0..(columns * rows) as i32).map(|v| v * 3 - 20).collect();

        let display = DisplayRect::new(12, 4, 12 + columns, 4 + rows);
        let mut req = request(&table, &samples, columns, display, 1.0, limits);
        req.rescale = rescale;

        let pixels = render_into_vec(&req).expect("render");
        let expected: Vec<u8> = samples
            .iter()
            .map(|&raw| window_intensity(&table, limits, rescale.apply(raw.into())))
            .collect();
        assert_eq!(grays(&pixels), expected);
    }

    #[test]
    fn zoom_in_replicates_samples() {
        let limits = WindowLimits::new(0, 256).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [0, 64, 128, 192];
        let req = request(&table, &samples, 2, DisplayRect::new(0, 0, 4, 4), 2.0, limits);

        let pixels = grays(&render_into_vec(&req).expect("render"));
        assert_eq!(
            pixels,
            vec![
                0, 0, 64, 64, //
                0, 0, 64, 64, //
                128, 128, 192, 192, //
                128, 128, 192, 192,
            ]
        );
    }

    #[test]
    fn zoom_out_skips_samples_from_anchor() {
        let limits = WindowLimits::new(0, 256).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples: Vec<i32> = (0..16).map(|v| v * 16).collect();
        let req = request(&table, &samples, 4, DisplayRect::new(0, 0, 2, 2), 0.5, limits);

        let pixels = grays(&render_into_vec(&req).expect("render"));
        // Display pixels 0 and 1 read source columns/rows 0 and 2.
        assert_eq!(pixels, vec![0, 32, 128, 160]);
    }

    #[test]
    fn fractional_anchor_truncates_toward_image_origin() {
        let limits = WindowLimits::new(0, 256).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [0, 64, 128];
        let mut req = request(&table, &samples, 3, DisplayRect::new(0, 0, 4, 1), 1.0, limits);
        req.anchor = Anchor::new(0.5, 0.0);
        req.policy = SamplePolicy::Fill(9);

        let pixels = grays(&render_into_vec(&req).expect("render"));
        assert_eq!(pixels, vec![9, 0, 64, 128]);
    }

    #[test]
    fn overflowing_display_rect_is_rejected() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [0; 4];
        let req = request(&table, &samples, 2, DisplayRect::new(0, 0, usize::MAX, 2), 1.0, limits);

        assert!(matches!(
            render_into_vec(&req),
            Err(RenderError::InvalidArgument(_))
        ));
    }

    #[test]
    fn output_size_must_match_display_rect() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [0; 16];
        let req = request(&table, &samples, 4, DisplayRect::new(0, 0, 4, 4), 1.0, limits);

        let mut short = vec![Color32::RED; 15];
        assert!(matches!(
            render(&req, &mut short),
            Err(RenderError::InvalidArgument(_))
        ));
        assert!(short.iter().all(|pixel| *pixel == Color32::RED));

        let mut exact = vec![Color32::RED; 16];
        render(&req, &mut exact).expect("render");
        assert!(exact.iter().all(|pixel| *pixel == Color32::from_gray(0)));
    }

    #[test]
    fn invalid_arguments_fail_before_writing() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let mismatched = WindowTable::new(5, false).expect("table");
        let samples = [0; 16];
        let base = request(&table, &samples, 4, DisplayRect::new(0, 0, 2, 2), 1.0, limits);

        let cases = [
            RenderRequest { zoom: 0.0, ..base },
            RenderRequest { zoom: -1.0, ..base },
            RenderRequest { zoom: f64::NAN, ..base },
            RenderRequest { slice_width: 0, ..base },
            RenderRequest { slice_width: 3, ..base },
            RenderRequest { table: &mismatched, ..base },
            RenderRequest { anchor: Anchor::new(f64::INFINITY, 0.0), ..base },
            RenderRequest { rescale: Rescale::new(f64::NAN, 0.0), ..base },
        ];
        for case in cases {
            let mut out = vec![Color32::RED; 4];
            assert!(matches!(
                render(&case, &mut out),
                Err(RenderError::InvalidArgument(_))
            ));
            assert!(out.iter().all(|pixel| *pixel == Color32::RED));
        }

        let inverted = RenderRequest {
            display: DisplayRect::new(2, 0, 1, 1),
            ..base
        };
        assert!(render(&inverted, &mut []).is_err());
    }

    #[test]
    fn out_of_bounds_sample_is_rejected_atomically() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [1; 4];
        let mut req = request(&table, &samples, 2, DisplayRect::new(0, 0, 3, 2), 1.0, limits);
        req.anchor = Anchor::new(0.0, 0.0);

        let mut out = vec![Color32::RED; 6];
        let err = render(&req, &mut out).expect_err("column 2 is outside the image");
        assert_eq!(
            err,
            RenderError::SampleOutOfBounds {
                x: 2,
                y: 0,
                index: 2,
                len: 4
            }
        );
        assert!(out.iter().all(|pixel| *pixel == Color32::RED));

        req.anchor = Anchor::new(1.0, 0.0);
        assert!(matches!(
            render(&req, &mut out),
            Err(RenderError::SampleOutOfBounds { x: 0, y: 0, .. })
        ));
    }

    #[test]
    fn fill_policy_paints_pixels_outside_image() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [3; 4];
        let mut req = request(&table, &samples, 2, DisplayRect::new(0, 0, 4, 3), 1.0, limits);
        req.anchor = Anchor::new(1.0, 0.0);
        req.policy = SamplePolicy::Fill(7);

        let pixels = grays(&render_into_vec(&req).expect("render"));
        let inside = table.entries()[3];
        assert_eq!(
            pixels,
            vec![
                7, inside, inside, 7, //
                7, inside, inside, 7, //
                7, 7, 7, 7,
            ]
        );
    }

    #[test]
    fn empty_display_writes_nothing() {
        let limits = WindowLimits::new(0, 4).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples = [0; 4];
        let req = request(&table, &samples, 2, DisplayRect::new(3, 3, 3, 9), 1.0, limits);

        assert!(render_into_vec(&req).expect("render").is_empty());
    }

    #[test]
    fn repeated_renders_are_identical() {
        let limits = WindowLimits::from_center_width(500.0, 700.0).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples: Vec<i32> = (0..64 * 48).map(|v| (v * 37) % 1200).collect();
        let mut req = request(&table, &samples, 64, DisplayRect::new(0, 0, 100, 75), 1.5, limits);
        req.anchor = Anchor::new(2.0, 1.0);
        req.policy = SamplePolicy::Fill(0);

        let first = render_into_vec(&req).expect("render");
        let second = render_into_vec(&req).expect("render");
        assert_eq!(first.len(), 100 * 75);
        assert_eq!(first, second);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_and_serial_paths_agree() {
        let limits = WindowLimits::new(-200, 900).expect("limits");
        let table = WindowTable::for_limits(&limits, true).expect("table");
        let samples: Vec<i32> = (0..97 * 61).map(|v| (v * 13) % 1400 - 300).collect();
        let mut req = request(&table, &samples, 97, DisplayRect::new(5, 3, 180, 120), 1.7, limits);
        req.anchor = Anchor::new(-4.5, 2.25);
        req.rescale = Rescale::new(0.9, 12.0);
        req.policy = SamplePolicy::Fill(30);
        let geometry = SourceGeometry { columns: 97, rows: 61 };

        let mut serial = vec![Color32::BLACK; req.display.len()];
        let mut parallel = vec![Color32::BLACK; req.display.len()];
        render_serial(&req, geometry, &mut serial);
        render_parallel(&req, geometry, &mut parallel);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn accepts_narrow_sample_types() {
        let limits = WindowLimits::new(0, 100).expect("limits");
        let table = WindowTable::for_limits(&limits, false).expect("table");
        let samples: [i16; 2] = [-1, 50];
        let req = RenderRequest {
            table: &table,
            samples: &samples[..],
            slice_width: 2,
            anchor: Anchor::default(),
            display: DisplayRect::new(0, 0, 2, 1),
            zoom: 1.0,
            limits,
            rescale: Rescale::IDENTITY,
            policy: SamplePolicy::Reject,
        };

        let pixels = grays(&render_into_vec(&req).expect("render"));
        assert_eq!(pixels, vec![0, 128]);
    }

    #[test]
    fn color_image_takes_display_size() {
        let display = DisplayRect::new(2, 1, 5, 3);
        let image = into_color_image(display, vec![Color32::WHITE; 6]).expect("image");
        assert_eq!(image.size, [3, 2]);
        assert!(into_color_image(display, vec![Color32::WHITE; 5]).is_err());
    }
}
