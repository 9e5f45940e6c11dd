use super::{FrameStream, MediaKind, MediaSource};
use crate::common::Frame;
use crate::error::MediaError;
use std::path::Path;
use tracing::debug;

/// A single still image, decoded up front.
pub struct ImageFileSource {
    frame: Frame,
}

impl ImageFileSource {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let image = image::open(path)
            .map_err(|e| MediaError::Decode(path.display().to_string(), e))?;
        debug!(
            "Decoded image {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            frame: Frame::new(image, 0),
        })
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }
}

impl MediaSource for ImageFileSource {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    // An image is a single frame at t=0 whatever the sample rate.
    fn frames(&self, _sample_rate: f64) -> FrameStream {
        Box::new(std::iter::once((Some(self.frame.clone()), Some(0.0))))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};

    #[test]
    fn open_reports_dimensions_and_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(12, 7, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let source = ImageFileSource::open(&path).unwrap();
        assert!(source.is_image());
        assert!(!source.is_video());
        assert_eq!(source.dimensions(), (12, 7));

        let frames: Vec<_> = source.frames(5.0).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, Some(0.0));
    }

    #[test]
    fn open_fails_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(
            ImageFileSource::open(&path),
            Err(MediaError::Decode(_, _))
        ));
    }

    #[test]
    fn from_frame_uses_frame_size() {
        let image = DynamicImage::new_rgb8(3, 4);
        let source = ImageFileSource::from_frame(Frame::new(image, 0));
        assert_eq!(source.dimensions(), (3, 4));
    }
}
