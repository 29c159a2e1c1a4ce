//! Window/level and nearest-neighbour resampling of grayscale slices into
//! display-ready RGBA pixels.

pub mod config;
pub mod error;
pub mod frame;
pub mod renderer;
pub mod table;
pub mod viewport;
pub mod window;

pub use error::{RenderError, RenderResult};
pub use frame::{Frame, FrameRenderer, RenderOutcome, RenderingParameters};
pub use renderer::{
    into_color_image, render, render_into_vec, Anchor, DisplayRect, RenderRequest, SamplePolicy,
};
pub use table::{build_window_table, WindowTable};
pub use viewport::{fit_zoom, layout, ImageRect, ImageSize, Placement, ViewState, ViewportSize};
pub use window::{Rescale, WindowLimits};
