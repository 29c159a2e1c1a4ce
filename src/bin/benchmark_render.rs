use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use perspecta_render::frame::BACKGROUND;
use perspecta_render::{
    config, fit_zoom, Frame, FrameRenderer, ImageSize, RenderOutcome, RenderingParameters,
    Rescale, ViewState, ViewportSize,
};

#[derive(Debug, Clone, PartialEq)]
struct BenchmarkArgs {
    columns: usize,
    rows: usize,
    viewport: ViewportSize,
    zoom: Option<f64>,
    iterations: usize,
    threads: Option<usize>,
}

impl Default for BenchmarkArgs {
    fn default() -> Self {
        Self {
            columns: 512,
            rows: 512,
            viewport: ViewportSize {
                width: 1280,
                height: 820,
            },
            zoom: None,
            iterations: 200,
            threads: None,
        }
    }
}

fn main() -> Result<()> {
    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    let args = match parse_args(&cli_args) {
        Ok(args) => args,
        Err(err) => bail!("{err}\n{}", usage()),
    };

    configure_threads(args.threads.or_else(config::configured_render_threads))?;

    let pixels = synthetic_ct_slice(args.columns, args.rows);
    let frame = Frame::new(
        args.columns,
        args.rows,
        &pixels,
        Rescale::new(1.0, -1024.0),
    )
    .context("Could not build synthetic frame")?;

    let image = ImageSize {
        columns: args.columns,
        rows: args.rows,
    };
    let zoom = match args.zoom {
        Some(zoom) => zoom,
        None => fit_zoom(image, args.viewport).context("Could not fit image to viewport")?,
    };

    let mut renderer = FrameRenderer::new();
    let mut canvas = vec![BACKGROUND; args.viewport.width * args.viewport.height];
    let mut timings = Vec::with_capacity(args.iterations);

    for iteration in 0..args.iterations {
        // Sweep the window level so both the cached and rebuilt table paths are timed.
        let params = RenderingParameters {
            window_center: 40.0 + (iteration % 16) as f64 * 10.0,
            window_width: if iteration % 32 < 16 { 400.0 } else { 1500.0 },
            invert: false,
            view: ViewState {
                zoom,
                pan_x: 0.0,
                pan_y: 0.0,
            },
        };

        let started = Instant::now();
        let outcome = renderer
            .render(&frame, &params, args.viewport, &mut canvas)
            .with_context(|| format!("Render failed on iteration {iteration}"))?;
        timings.push(started.elapsed());

        if outcome == RenderOutcome::OutOfView {
            bail!("Synthetic frame is not visible at zoom {zoom}");
        }
    }

    report(&args, zoom, &timings);
    Ok(())
}

#[cfg(feature = "parallel")]
fn configure_threads(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Could not configure the rayon thread pool")?;
    }
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn configure_threads(threads: Option<usize>) -> Result<()> {
    if threads.is_some() {
        bail!("--threads requires the `parallel` feature");
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<BenchmarkArgs, String> {
    let mut parsed = BenchmarkArgs::default();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .map(|value| value.as_str())
                .ok_or_else(|| format!("Missing value after {flag}."))
        };
        match flag.as_str() {
            "--size" => {
                let (columns, rows) = parse_dimensions(value()?)?;
                parsed.columns = columns;
                parsed.rows = rows;
            }
            "--viewport" => {
                let (width, height) = parse_dimensions(value()?)?;
                parsed.viewport = ViewportSize { width, height };
            }
            "--zoom" => {
                let raw = value()?;
                let zoom = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|zoom| zoom.is_finite() && *zoom > 0.0)
                    .ok_or_else(|| format!("Invalid zoom '{raw}' (must be > 0)."))?;
                parsed.zoom = Some(zoom);
            }
            "--iterations" => parsed.iterations = parse_count(value()?, "iterations")?,
            "--threads" => parsed.threads = Some(parse_count(value()?, "threads")?),
            other => return Err(format!("Unknown argument '{other}'.")),
        }
    }

    Ok(parsed)
}

fn parse_dimensions(raw: &str) -> Result<(usize, usize), String> {
    let (width, height) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid size '{raw}' (expected WIDTHxHEIGHT)."))?;
    let width = parse_count(width, "width")?;
    let height = parse_count(height, "height")?;
    Ok((width, height))
}

fn parse_count(raw: &str, name: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("Invalid {name} '{raw}' (must be a positive integer).")),
    }
}

fn usage() -> &'static str {
    "usage: benchmark_render [--size COLSxROWS] [--viewport WxH] [--zoom Z] [--iterations N] [--threads N]"
}

/// Air background, a water-density body and a dense rim, roughly like a CT slice
/// stored with a -1024 intercept.
fn synthetic_ct_slice(columns: usize, rows: usize) -> Vec<i32> {
    let cx = columns as f64 / 2.0;
    let cy = rows as f64 / 2.0;
    let radius = cx.min(cy) * 0.9;

    (0..rows)
        .flat_map(|y| (0..columns).map(move |x| (x, y)))
        .map(|(x, y)| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > radius {
                0
            } else if distance > radius * 0.92 {
                2400
            } else {
                1024 + ((dx * 7.0 + dy * 3.0) as i32).rem_euclid(200) - 100
            }
        })
        .collect()
}

fn report(args: &BenchmarkArgs, zoom: f64, timings: &[Duration]) {
    let total: Duration = timings.iter().sum();
    let min = timings.iter().min().copied().unwrap_or_default();
    let max = timings.iter().max().copied().unwrap_or_default();
    let mean = total / timings.len().max(1) as u32;
    let pixels = (args.viewport.width * args.viewport.height) as f64;
    let megapixels_per_second = if mean.is_zero() {
        f64::INFINITY
    } else {
        pixels / mean.as_secs_f64() / 1.0e6
    };

    println!(
        "frame={}x{} viewport={}x{} zoom={zoom:.3} iterations={}",
        args.columns, args.rows, args.viewport.width, args.viewport.height, args.iterations
    );
    println!(
        "render_ms min={:.3} mean={:.3} max={:.3} throughput={megapixels_per_second:.1} MP/s",
        min.as_secs_f64() * 1000.0,
        mean.as_secs_f64() * 1000.0,
        max.as_secs_f64() * 1000.0,
    );
}
