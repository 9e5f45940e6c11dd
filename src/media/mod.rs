//! Media retrieval boundary.
//!
//! A [`MediaLoader`] turns a request url into a [`MediaSource`], which hands
//! out decoded frames and the media dimensions. Loading is the only step
//! expected to fail; everything after it reports problems per frame.

pub mod frame_directory;
pub mod image_file;
pub mod loader;

pub use frame_directory::FrameDirectorySource;
pub use image_file::ImageFileSource;
pub use loader::FsMediaLoader;

use crate::common::Frame;
use crate::error::MediaError;

/// Lazy, finite, non-restartable sequence of `(frame, timestamp)`. Either side
/// may be missing when the source could not produce it.
pub type FrameStream = Box<dyn Iterator<Item = (Option<Frame>, Option<f64>)> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

pub trait MediaSource: Send {
    fn kind(&self) -> MediaKind;

    /// Frames sampled at `sample_rate` frames per second.
    fn frames(&self, sample_rate: f64) -> FrameStream;

    fn dimensions(&self) -> (u32, u32);

    fn is_image(&self) -> bool {
        self.kind() == MediaKind::Image
    }

    fn is_video(&self) -> bool {
        self.kind() == MediaKind::Video
    }
}

pub trait MediaLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Box<dyn MediaSource>, MediaError>;
}
