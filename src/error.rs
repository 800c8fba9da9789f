use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("expected a non-zero {what} but got magnitude: {magnitude:e}")]
    DegenerateInput { what: &'static str, magnitude: f64 },

    #[error("reference and target directions are antiparallel, rotation axis is undefined")]
    AmbiguousRotation,

    #[error(
        "window of {rows}x{cols} centered at ({center_row}, {center_col}) exceeds image of {image_rows}x{image_cols}"
    )]
    BoundsExceeded {
        center_row: usize,
        center_col: usize,
        rows: usize,
        cols: usize,
        image_rows: usize,
        image_cols: usize,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to reach render server at {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("render server did not answer within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("render server failed: {0}")]
    Render(String),

    #[error("malformed render server message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
