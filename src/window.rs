use crate::error::{invalid, RenderResult};

/// Raw-intensity bounds of the active contrast window, `[left, right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimits {
    pub left: i64,
    pub right: i64,
}

impl WindowLimits {
    pub fn new(left: i64, right: i64) -> RenderResult<Self> {
        if right <= left {
            return Err(invalid(format!(
                "window right limit {right} must be greater than left limit {left}"
            )));
        }
        if right - left > i64::from(u32::MAX) {
            return Err(invalid(format!(
                "window [{left}, {right}) is wider than {} units",
                u32::MAX
            )));
        }
        Ok(Self { left, right })
    }

    /// Limits for a DICOM-style center/width pair. Widths below one unit are
    /// widened to one so the window never collapses.
    pub fn from_center_width(center: f64, width: f64) -> RenderResult<Self> {
        if !center.is_finite() || !width.is_finite() {
            return Err(invalid(format!(
                "window center {center} and width {width} must be finite"
            )));
        }

        let effective_width = width.max(1.0);
        let left = (center - effective_width / 2.0).floor();
        let right = (center + effective_width / 2.0).floor();
        if left < i64::MIN as f64 || right > i64::MAX as f64 {
            return Err(invalid(format!(
                "window center {center} width {width} is outside the integer range"
            )));
        }

        Self::new(left as i64, right as i64)
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.left && value < self.right
    }
}

/// Modality linear transform applied to stored samples before windowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rescale {
    pub const IDENTITY: Rescale = Rescale {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// RescaleSlope defaults to 1 and RescaleIntercept to 0 when absent.
    pub fn from_dicom(slope: Option<f64>, intercept: Option<f64>) -> Self {
        Self {
            slope: slope.unwrap_or(1.0),
            intercept: intercept.unwrap_or(0.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.slope.is_finite() && self.intercept.is_finite()
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> i64 {
        // Truncates toward zero, then saturates on the cast.
        (raw * self.slope + self.intercept).trunc() as i64
    }
}
