//! In-memory media fakes shared by the unit tests.

use crate::common::Frame;
use crate::error::MediaError;
use crate::media::{FrameStream, MediaKind, MediaLoader, MediaSource};
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};

#[derive(Clone)]
pub struct StaticSource {
    kind: MediaKind,
    frames: Vec<(Option<Frame>, Option<f64>)>,
    dimensions: (u32, u32),
}

impl StaticSource {
    pub fn image(width: u32, height: u32) -> Self {
        Self::with_frames(MediaKind::Image, vec![Some(0.0)], width, height)
    }

    /// `count` frames at timestamps `0.0, 1.0, ...`.
    pub fn video(count: usize, width: u32, height: u32) -> Self {
        let tstamps = (0..count).map(|i| Some(i as f64)).collect();
        Self::with_frames(MediaKind::Video, tstamps, width, height)
    }

    pub fn with_frames(
        kind: MediaKind,
        tstamps: Vec<Option<f64>>,
        width: u32,
        height: u32,
    ) -> Self {
        let frames = tstamps
            .into_iter()
            .enumerate()
            .map(|(i, tstamp)| (Some(Frame::new(DynamicImage::new_rgb8(width, height), i)), tstamp))
            .collect();
        Self {
            kind,
            frames,
            dimensions: (width, height),
        }
    }

    pub fn with_missing_frame(mut self, index: usize) -> Self {
        self.frames[index].0 = None;
        self
    }
}

impl MediaSource for StaticSource {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn frames(&self, _sample_rate: f64) -> FrameStream {
        Box::new(self.frames.clone().into_iter())
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

/// Serves registered urls and counts every load.
#[derive(Default)]
pub struct StaticLoader {
    media: HashMap<String, StaticSource>,
    loads: AtomicUsize,
    panics: bool,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media(self, url: &str, frames: usize, width: u32, height: u32) -> Self {
        let source = if frames == 1 {
            StaticSource::image(width, height)
        } else {
            StaticSource::video(frames, width, height)
        };
        self.with_source(url, source)
    }

    pub fn with_source(mut self, url: &str, source: StaticSource) -> Self {
        self.media.insert(url.to_string(), source);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl MediaLoader for StaticLoader {
    fn load(&self, url: &str) -> Result<Box<dyn MediaSource>, MediaError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("decoder blew up on {}", url);
        }
        self.media
            .get(url)
            .cloned()
            .map(|source| Box::new(source) as Box<dyn MediaSource>)
            .ok_or_else(|| MediaError::NotFound(url.to_string()))
    }
}

/// Blocks every load until the paired sender fires.
pub struct GatedLoader {
    gate: Mutex<mpsc::Receiver<()>>,
    source: StaticSource,
}

impl GatedLoader {
    pub fn new(source: StaticSource) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                gate: Mutex::new(rx),
                source,
            },
            tx,
        )
    }
}

impl MediaLoader for GatedLoader {
    fn load(&self, url: &str) -> Result<Box<dyn MediaSource>, MediaError> {
        let gate = self.gate.lock().map_err(|_| MediaError::NotFound(url.to_string()))?;
        gate.recv()
            .map_err(|_| MediaError::NotFound(url.to_string()))?;
        Ok(Box::new(self.source.clone()))
    }
}
