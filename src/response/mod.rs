pub mod fetch;
pub mod item;
pub mod state;

pub use fetch::FetchContext;
pub use item::ResponseItem;
pub use state::ItemState;

use crate::common::{Codes, FrameAnnotation};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Identifies the module that produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
}

impl ModuleInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// What the caller gets back once an item is finished.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleResponse {
    pub id: Uuid,
    pub module: ModuleInfo,
    pub url: String,
    pub sample_rate: f64,
    pub code: Codes,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tstamps_processed: Vec<f64>,
    pub frame_annotations: Vec<FrameAnnotation>,
    pub completed_at: DateTime<Utc>,
}
