use super::image_module::ImageInference;
use crate::common::{Frame, Point, Props, Region};
use crate::error::ProcessingError;
use crate::response::ResponseItem;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub const MODULE_NAME: &str = "color_stats";

/// Reference inference: annotates each frame, or each selected region, with
/// its mean RGB colour.
#[derive(Debug, Default)]
pub struct ColorStatsInference {
    batches: usize,
}

impl ColorStatsInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> usize {
        self.batches
    }
}

impl ImageInference for ColorStatsInference {
    fn process_images(
        &mut self,
        frames: &[Frame],
        tstamps: &[f64],
        regions: &[Option<Region>],
        items: &[Arc<ResponseItem>],
    ) -> Result<(), ProcessingError> {
        if frames.is_empty() {
            return Err(ProcessingError::InvalidBatch(0, "empty batch".to_string()));
        }
        let len = frames.len();
        if tstamps.len() != len || regions.len() != len || items.len() != len {
            return Err(ProcessingError::InvalidBatch(
                len,
                "sequences differ in length".to_string(),
            ));
        }
        self.batches += 1;

        // Nothing is written unless the whole batch succeeds.
        let mut annotated = Vec::with_capacity(len);
        for (i, frame) in frames.iter().enumerate() {
            let (x0, y0, x1, y1) = crop_box(frame, regions[i].as_ref());
            if x1 <= x0 || y1 <= y0 {
                return Err(ProcessingError::Recoverable(format!(
                    "empty crop at {} of {}",
                    tstamps[i],
                    items[i].url()
                )));
            }
            let (r, g, b) = mean_rgb(frame, (x0, y0, x1, y1));
            debug!("Mean colour at {}: ({:.1}, {:.1}, {:.1})", tstamps[i], r, g, b);

            let mut props = Props::new();
            props.insert("module".to_string(), Value::from(MODULE_NAME));
            props.insert("mean_r".to_string(), json!(r));
            props.insert("mean_g".to_string(), json!(g));
            props.insert("mean_b".to_string(), json!(b));
            if let Some(source) = &regions[i] {
                props.insert("source_region".to_string(), json!(source.id));
            }

            let (width, height) = (frame.width() as f64, frame.height() as f64);
            let contour = vec![
                Point { x: x0 as f64 / width, y: y0 as f64 / height },
                Point { x: x1 as f64 / width, y: y0 as f64 / height },
                Point { x: x1 as f64 / width, y: y1 as f64 / height },
                Point { x: x0 as f64 / width, y: y1 as f64 / height },
            ];
            annotated.push(Region::new(vec![props]).with_contour(contour));
        }

        for (i, region) in annotated.into_iter().enumerate() {
            items[i].add_region(tstamps[i], region);
        }
        Ok(())
    }
}

// Pixel box of the region's normalised bounding box, or the whole frame.
fn crop_box(frame: &Frame, region: Option<&Region>) -> (u32, u32, u32, u32) {
    let (width, height) = (frame.width(), frame.height());
    let Some(region) = region else {
        return (0, 0, width, height);
    };
    let (min_x, min_y, max_x, max_y) = region.bounding_box();
    let to_px = |v: f64, size: u32| ((v.clamp(0.0, 1.0) * size as f64).round() as u32).min(size);
    (
        to_px(min_x, width),
        to_px(min_y, height),
        to_px(max_x, width),
        to_px(max_y, height),
    )
}

fn mean_rgb(frame: &Frame, (x0, y0, x1, y1): (u32, u32, u32, u32)) -> (f64, f64, f64) {
    let rgb = frame.image().crop_imm(x0, y0, x1 - x0, y1 - y0).to_rgb8();
    let count = rgb.pixels().len().max(1) as f64;
    let (r, g, b) = rgb.pixels().fold((0u64, 0u64, 0u64), |(r, g, b), p| {
        (r + p[0] as u64, g + p[1] as u64, b + p[2] as u64)
    });
    (r as f64 / count, g as f64 / count, b as f64 / count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Request;
    use crate::response::ModuleInfo;
    use image::{DynamicImage, Rgb, RgbImage};

    fn half_red_frame() -> Frame {
        let image = RgbImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        Frame::new(DynamicImage::ImageRgb8(image), 0)
    }

    fn module_info() -> ModuleInfo {
        ModuleInfo::new(MODULE_NAME, "0.1.0")
    }

    fn item() -> Arc<ResponseItem> {
        Arc::new(ResponseItem::new(Request::new("mem://a")))
    }

    #[test]
    fn whole_frame_mean_is_recorded() {
        let item = item();
        let mut inference = ColorStatsInference::new();
        inference
            .process_images(&[half_red_frame()], &[0.0], &[None], &[item.clone()])
            .unwrap();

        let response = item.to_response(&module_info());
        assert_eq!(response.frame_annotations.len(), 1);
        let props = &response.frame_annotations[0].regions[0].props[0];
        assert_eq!(props["module"], MODULE_NAME);
        assert_eq!(props["mean_r"], 127.5);
        assert_eq!(props["mean_b"], 127.5);
        assert_eq!(inference.batches(), 1);
    }

    #[test]
    fn region_restricts_the_crop() {
        let item = item();
        let region = Region::new(vec![]).with_contour(vec![
            Point { x: 0.0, y: 0.0 },
            Point { x: 0.5, y: 1.0 },
        ]);
        let mut inference = ColorStatsInference::new();
        inference
            .process_images(
                &[half_red_frame()],
                &[1.0],
                &[Some(region.clone())],
                &[item.clone()],
            )
            .unwrap();

        let response = item.to_response(&module_info());
        let props = &response.frame_annotations[0].regions[0].props[0];
        assert_eq!(props["mean_r"], 255.0);
        assert_eq!(props["mean_b"], 0.0);
        assert_eq!(props["source_region"], json!(region.id));
    }

    #[test]
    fn degenerate_region_is_a_recoverable_error() {
        let region = Region::new(vec![]).with_contour(vec![Point { x: 0.5, y: 0.5 }]);
        let result = ColorStatsInference::new().process_images(
            &[half_red_frame()],
            &[0.0],
            &[Some(region)],
            &[item()],
        );
        assert!(matches!(result, Err(ProcessingError::Recoverable(_))));
    }

    #[test]
    fn failed_batch_writes_no_annotations() {
        let item = item();
        let degenerate = Region::new(vec![]).with_contour(vec![Point { x: 0.5, y: 0.5 }]);
        let mut inference = ColorStatsInference::new();
        let result = inference.process_images(
            &[half_red_frame(), half_red_frame()],
            &[0.0, 1.0],
            &[None, Some(degenerate)],
            &[item.clone(), item.clone()],
        );

        assert!(matches!(result, Err(ProcessingError::Recoverable(_))));
        assert!(item.to_response(&module_info()).frame_annotations.is_empty());
    }

    #[test]
    fn empty_batch_is_invalid() {
        let result = ColorStatsInference::new().process_images(&[], &[], &[], &[]);
        assert!(matches!(result, Err(ProcessingError::InvalidBatch(0, _))));
    }
}
