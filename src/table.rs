use crate::error::{invalid, RenderResult};
use crate::window::WindowLimits;

/// Builds the intensity ramp for a window `width` units wide.
///
/// Entry `i` is the display intensity of a value `i` units above the window's
/// lower bound: `floor(i / width * 256)`, or `floor((1 - i / width) * 256)` when
/// inverted, clamped to `[0, 255]`. Computed in integers so the result is exact.
pub fn build_window_table(width: u32, invert: bool) -> RenderResult<Vec<u8>> {
    if width == 0 {
        return Err(invalid("window table width must be greater than zero"));
    }

    let width = u64::from(width);
    let table = (0..width)
        .map(|i| {
            let numerator = if invert { width - i } else { i };
            (numerator * 256 / width).min(255) as u8
        })
        .collect();
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTable {
    entries: Vec<u8>,
    invert: bool,
}

impl WindowTable {
    pub fn new(width: u32, invert: bool) -> RenderResult<Self> {
        Ok(Self {
            entries: build_window_table(width, invert)?,
            invert,
        })
    }

    pub fn for_limits(limits: &WindowLimits, invert: bool) -> RenderResult<Self> {
        Self::new(limits.width(), invert)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn entries(&self) -> &[u8] {
        &self.entries
    }

    #[inline]
    pub fn get(&self, offset: usize) -> Option<u8> {
        self.entries.get(offset).copied()
    }

    /// Wraps arbitrary entries, for exercising the renderer with non-ramp tables.
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<u8>, invert: bool) -> Self {
        Self { entries, invert }
    }

    pub fn is_compatible(&self, width: u32, invert: bool) -> bool {
        self.invert == invert && self.entries.len() == width as usize
    }
}
