use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(
        "display pixel ({x}, {y}) samples source index {index}, outside a buffer of {len} samples"
    )]
    SampleOutOfBounds {
        x: i64,
        y: i64,
        index: i64,
        len: usize,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;

pub(crate) fn invalid(message: impl Into<String>) -> RenderError {
    RenderError::InvalidArgument(message.into())
}
