use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Two timestamps closer than this are the same frame.
pub const TSTAMP_TOLERANCE: f64 = 1e-6;

/// One row of region properties, e.g. `{"value": "face", "confidence": 0.9}`.
pub type Props = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub prev_response: Option<PriorResponse>,
}

fn default_sample_rate() -> f64 {
    1.0
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sample_rate: default_sample_rate(),
            prev_response: None,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_prev_response(mut self, prev_response: PriorResponse) -> Self {
        self.prev_response = Some(prev_response);
        self
    }
}

/// Annotations produced for the same media by an earlier module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorResponse {
    #[serde(default)]
    pub frame_annotations: Vec<FrameAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameAnnotation {
    pub tstamp: f64,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl FrameAnnotation {
    pub fn new(tstamp: f64) -> Self {
        Self {
            tstamp,
            regions: Vec::new(),
        }
    }

    pub fn matches_tstamp(&self, tstamp: f64) -> bool {
        (self.tstamp - tstamp).abs() < TSTAMP_TOLERANCE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A spatial region in a frame. Contour points are normalised to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub contour: Vec<Point>,
    #[serde(default)]
    pub props: Vec<Props>,
}

impl Region {
    pub fn new(props: Vec<Props>) -> Self {
        Self {
            id: Uuid::new_v4(),
            contour: Vec::new(),
            props,
        }
    }

    pub fn with_contour(mut self, contour: Vec<Point>) -> Self {
        self.contour = contour;
        self
    }

    /// Normalised `(x0, y0, x1, y1)`, or the whole frame without a contour.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        if self.contour.is_empty() {
            return (0.0, 0.0, 1.0, 1.0);
        }
        self.contour.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// Appends `region` to the annotation at `tstamp`, creating it if needed.
pub fn push_region(annotations: &mut Vec<FrameAnnotation>, tstamp: f64, region: Region) {
    match annotations.iter_mut().find(|a| a.matches_tstamp(tstamp)) {
        Some(annotation) => annotation.regions.push(region),
        None => {
            let mut annotation = FrameAnnotation::new(tstamp);
            annotation.regions.push(region);
            annotations.push(annotation);
        }
    }
}
