use super::predicate::PredicateEvaluator;
use crate::common::{Frame, Region};
use crate::media::FrameStream;
use crate::response::ResponseItem;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct StreamEntry {
    pub frame: Frame,
    pub tstamp: f64,
    pub region: Option<Region>,
    pub item: Arc<ResponseItem>,
}

/// Walks an item's frames and yields what the module should look at.
///
/// Without a predicate every frame is yielded once with no region. With one,
/// a frame is yielded once per prior region at its timestamp that matches,
/// and frames with no matching region are dropped. Dropping the stream early
/// drops the underlying frame stream with it.
pub struct RegionStream<'a> {
    item: Arc<ResponseItem>,
    frames: FrameStream,
    predicate: Option<&'a dyn PredicateEvaluator>,
    queued: VecDeque<StreamEntry>,
    position: usize,
    matched: usize,
}

impl<'a> RegionStream<'a> {
    pub fn new(
        item: Arc<ResponseItem>,
        frames: FrameStream,
        predicate: Option<&'a dyn PredicateEvaluator>,
    ) -> Self {
        Self {
            item,
            frames,
            predicate,
            queued: VecDeque::new(),
            position: 0,
            matched: 0,
        }
    }

    /// Number of prior regions that matched the predicate so far.
    pub fn matched(&self) -> usize {
        self.matched
    }

    fn entry(&self, frame: Frame, tstamp: f64, region: Option<Region>) -> StreamEntry {
        StreamEntry {
            frame,
            tstamp,
            region,
            item: Arc::clone(&self.item),
        }
    }
}

impl Iterator for RegionStream<'_> {
    type Item = StreamEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.queued.pop_front() {
                return Some(entry);
            }

            let (frame, tstamp) = self.frames.next()?;
            let position = self.position;
            self.position += 1;

            let Some(frame) = frame else {
                warn!("Invalid frame at position {} of {}", position, self.item.url());
                continue;
            };
            let Some(tstamp) = tstamp else {
                warn!("Invalid tstamp at position {} of {}", position, self.item.url());
                continue;
            };

            self.item.record_tstamp(tstamp);
            if position % 100 == 0 {
                info!("tstamp: {}", tstamp);
            } else {
                debug!("tstamp: {}", tstamp);
            }

            let Some(predicate) = self.predicate else {
                return Some(self.entry(frame, tstamp, None));
            };

            let Some(regions) = self.item.prior_regions_at(tstamp) else {
                continue;
            };
            debug!("Finding regions at tstamp {}: {}", tstamp, regions.len());
            let matching: Vec<Region> = regions
                .iter()
                .filter(|region| !region.props.is_empty() && predicate.matches(&region.props))
                .cloned()
                .collect();
            self.matched += matching.len();
            for region in matching {
                let entry = self.entry(frame.clone(), tstamp, Some(region));
                self.queued.push_back(entry);
            }
        }
    }
}

/// A batch split into the parallel sequences the inference hook takes.
#[derive(Default)]
pub struct FrameBatch {
    pub frames: Vec<Frame>,
    pub tstamps: Vec<f64>,
    pub regions: Vec<Option<Region>>,
    pub items: Vec<Arc<ResponseItem>>,
}

impl FrameBatch {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl From<Vec<StreamEntry>> for FrameBatch {
    fn from(entries: Vec<StreamEntry>) -> Self {
        let mut batch = FrameBatch {
            frames: Vec::with_capacity(entries.len()),
            tstamps: Vec::with_capacity(entries.len()),
            regions: Vec::with_capacity(entries.len()),
            items: Vec::with_capacity(entries.len()),
        };
        for entry in entries {
            batch.frames.push(entry.frame);
            batch.tstamps.push(entry.tstamp);
            batch.regions.push(entry.region);
            batch.items.push(entry.item);
        }
        batch
    }
}
