use std::sync::OnceLock;

pub const DEFAULT_PARALLEL_MIN_PIXELS: usize = 64 * 1024;

/// Viewports with at least this many pixels are rendered on the rayon pool.
pub fn parallel_min_pixels() -> usize {
    static CONFIG: OnceLock<Option<usize>> = OnceLock::new();

    CONFIG
        .get_or_init(|| read_positive_env("PERSPECTA_RENDER_PARALLEL_MIN_PIXELS"))
        .unwrap_or(DEFAULT_PARALLEL_MIN_PIXELS)
}

pub fn configured_render_threads() -> Option<usize> {
    static CONFIG: OnceLock<Option<usize>> = OnceLock::new();

    *CONFIG.get_or_init(|| read_positive_env("PERSPECTA_RENDER_THREADS"))
}

fn read_positive_env(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    parse_positive(&raw)
}

fn parse_positive(raw: &str) -> Option<usize> {
    let value = raw.trim().parse::<usize>().ok()?;
    if value == 0 {
        return None;
    }
    Some(value)
}
