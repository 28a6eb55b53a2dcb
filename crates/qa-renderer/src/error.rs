use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),

    #[error("Invalid locator padding {0}")]
    InvalidPadding(f64),

    #[error("Nothing to draw: {0}")]
    Empty(String),
}

pub type RenderResult<T> = Result<T, RenderError>;
