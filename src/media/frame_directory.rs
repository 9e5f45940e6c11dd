use super::{FrameStream, MediaKind, MediaSource};
use crate::common::Frame;
use crate::error::MediaError;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A directory of image files played back as video at a nominal frame rate.
/// Frames are decoded lazily as the stream is pulled.
pub struct FrameDirectorySource {
    paths: Vec<PathBuf>,
    fps: f64,
    dimensions: (u32, u32),
}

impl FrameDirectorySource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, MediaError> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| MediaError::Io(dir.display().to_string(), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| MediaError::Io(dir.display().to_string(), e))?
                .path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| MediaError::NotFound(format!("no frames in {}", dir.display())))?;
        let dimensions = image::image_dimensions(first)
            .map_err(|e| MediaError::Decode(first.display().to_string(), e))?;

        debug!(
            "Opened frame directory {} with {} frames at {} fps",
            dir.display(),
            paths.len(),
            fps
        );
        Ok(Self {
            paths,
            fps,
            dimensions,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.paths.len()
    }

    // Keep every n-th frame so that roughly `sample_rate` frames per second survive.
    fn sampling_step(&self, sample_rate: f64) -> usize {
        if sample_rate <= 0.0 || sample_rate >= self.fps {
            return 1;
        }
        ((self.fps / sample_rate).round() as usize).max(1)
    }
}

impl MediaSource for FrameDirectorySource {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn frames(&self, sample_rate: f64) -> FrameStream {
        let step = self.sampling_step(sample_rate);
        let fps = self.fps;
        Box::new(
            self.paths
                .clone()
                .into_iter()
                .enumerate()
                .step_by(step)
                .map(move |(index, path)| {
                    let tstamp = index as f64 / fps;
                    match image::open(&path) {
                        Ok(image) => (Some(Frame::new(image, index)), Some(tstamp)),
                        Err(e) => {
                            warn!("Failed to decode frame {}: {}", path.display(), e);
                            (None, Some(tstamp))
                        }
                    }
                }),
        )
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}
