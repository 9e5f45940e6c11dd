use image::DynamicImage;
use std::sync::Arc;

/// A decoded frame. Cloning shares the pixel buffer.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<DynamicImage>,
    index: usize,
}

impl Frame {
    pub fn new(image: DynamicImage, index: usize) -> Self {
        Self {
            image: Arc::new(image),
            index,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Position of the frame in its media, before sampling.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
