pub mod config;
pub mod editing;
pub mod error;
pub mod export;
pub mod media;
pub mod ops;
pub mod playback;
pub mod project;
pub mod selection;
pub mod session;
pub mod types;

pub use error::{CoreError, ErrorKind, Result};
pub use media::MediaLibrary;
pub use types::*;
