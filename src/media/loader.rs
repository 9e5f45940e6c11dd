use super::{FrameDirectorySource, ImageFileSource, MediaLoader, MediaSource};
use crate::error::MediaError;
use std::path::PathBuf;
use tracing::info;

/// Loads media from the local filesystem. Accepts `file://` urls and plain
/// paths; a directory is treated as a sequence of video frames.
#[derive(Debug, Clone)]
pub struct FsMediaLoader {
    frame_directory_fps: f64,
}

impl FsMediaLoader {
    pub fn new(frame_directory_fps: f64) -> Self {
        Self {
            frame_directory_fps,
        }
    }

    fn resolve(url: &str) -> Result<PathBuf, MediaError> {
        let path = match url.strip_prefix("file://") {
            Some(path) => path,
            None if url.contains("://") => return Err(MediaError::Unsupported(url.to_string())),
            None => url,
        };
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(MediaError::NotFound(url.to_string()));
        }
        Ok(path)
    }
}

impl Default for FsMediaLoader {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MediaLoader for FsMediaLoader {
    fn load(&self, url: &str) -> Result<Box<dyn MediaSource>, MediaError> {
        let path = Self::resolve(url)?;
        info!("Loading media from url: {}", url);
        if path.is_dir() {
            Ok(Box::new(FrameDirectorySource::open(
                &path,
                self.frame_directory_fps,
            )?))
        } else {
            Ok(Box::new(ImageFileSource::open(&path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn loads_file_urls_and_plain_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(2, 2, Rgb([0, 0, 0]))
            .save(&path)
            .unwrap();

        let loader = FsMediaLoader::default();
        let url = format!("file://{}", path.display());
        assert!(loader.load(&url).unwrap().is_image());
        assert!(loader.load(path.to_str().unwrap()).unwrap().is_image());
        assert!(loader.load(dir.path().to_str().unwrap()).unwrap().is_video());
    }

    #[test]
    fn rejects_remote_and_missing_media() {
        let loader = FsMediaLoader::default();
        assert!(matches!(
            loader.load("https://example.com/a.png"),
            Err(MediaError::Unsupported(_))
        ));
        assert!(matches!(
            loader.load("/definitely/not/here.png"),
            Err(MediaError::NotFound(_))
        ));
    }
}
