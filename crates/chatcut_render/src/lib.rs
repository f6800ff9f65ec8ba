pub mod error;
pub mod export;
pub mod probe;
pub mod processor;
pub mod thumbnails;

pub use error::{RenderError, Result};
pub use processor::{FfmpegProcessor, MediaProcessor};
