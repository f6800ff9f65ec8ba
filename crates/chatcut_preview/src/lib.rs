pub mod mpv;
pub mod ticker;

pub use mpv::MpvSurface;
pub use ticker::{start_playback, PlaybackTicker, TickControl};
