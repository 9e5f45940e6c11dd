use super::batch::BatchGenerator;
use super::orchestrator::ItemProcessor;
use super::predicate::{PredicateEvaluator, QueryPredicate};
use super::stream::{FrameBatch, RegionStream};
use crate::common::{Codes, Frame, Region};
use crate::config::Configuration;
use crate::error::{PredicateError, ProcessingError};
use crate::response::ResponseItem;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const MAX_PROBLEMATIC_BATCHES: usize = 10;

/// Module specific inference, called once per batch with parallel sequences
/// of equal length. An `Err` marks the batch as problematic and processing
/// moves on to the next one. Batches must not be kept past the call.
pub trait ImageInference: Send {
    fn process_images(
        &mut self,
        frames: &[Frame],
        tstamps: &[f64],
        regions: &[Option<Region>],
        items: &[Arc<ResponseItem>],
    ) -> Result<(), ProcessingError>;
}

impl<F> ImageInference for F
where
    F: FnMut(
            &[Frame],
            &[f64],
            &[Option<Region>],
            &[Arc<ResponseItem>],
        ) -> Result<(), ProcessingError>
        + Send,
{
    fn process_images(
        &mut self,
        frames: &[Frame],
        tstamps: &[f64],
        regions: &[Option<Region>],
        items: &[Arc<ResponseItem>],
    ) -> Result<(), ProcessingError> {
        self(frames, tstamps, regions, items)
    }
}

/// Streams each ready item's frames, optionally filtered down to previous
/// regions of interest, and feeds them to the inference hook in batches.
pub struct ImageModule<H> {
    inference: H,
    batch_size: usize,
    prev_pois: Option<Box<dyn PredicateEvaluator>>,
    max_problematic_batches: usize,
    prev_regions_of_interest_count: usize,
    items_streamed: usize,
    run_matched: usize,
    run_streamed: usize,
}

impl<H: ImageInference> ImageModule<H> {
    pub fn new(inference: H) -> Self {
        Self {
            inference,
            batch_size: 1,
            prev_pois: None,
            max_problematic_batches: MAX_PROBLEMATIC_BATCHES,
            prev_regions_of_interest_count: 0,
            items_streamed: 0,
            run_matched: 0,
            run_streamed: 0,
        }
    }

    pub fn from_configuration(
        configuration: &Configuration,
        inference: H,
    ) -> Result<Self, PredicateError> {
        let mut module = Self::new(inference)
            .batch_size(configuration.batch_size)
            .max_problematic_batches(configuration.max_problematic_batches);
        if let Some(prev_pois) = &configuration.prev_pois {
            let predicate: QueryPredicate = prev_pois.parse()?;
            module = module.prev_pois(predicate);
        }
        Ok(module)
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn prev_pois(mut self, predicate: impl PredicateEvaluator + 'static) -> Self {
        self.prev_pois = Some(Box::new(predicate));
        self
    }

    pub fn max_problematic_batches(mut self, max: usize) -> Self {
        self.max_problematic_batches = max;
        self
    }

    /// Prior regions that matched the predicate during the current cycle.
    pub fn prev_regions_of_interest_count(&self) -> usize {
        self.prev_regions_of_interest_count
    }

    pub fn inference(&self) -> &H {
        &self.inference
    }

    fn no_prev_regions(&self, streamed: usize, matched: usize) -> bool {
        self.prev_pois.is_some() && streamed > 0 && matched == 0
    }
}

impl<H: ImageInference> ItemProcessor for ImageModule<H> {
    fn begin_cycle(&mut self) {
        self.prev_regions_of_interest_count = 0;
        self.items_streamed = 0;
    }

    fn process_item(&mut self, item: &Arc<ResponseItem>) {
        if self.prev_pois.is_some() && !item.has_frame_annotations() {
            warn!("NO_PREV_REGIONS_OF_INTEREST for {}", item.url());
            item.set_code(Codes::NoPrevRegionsOfInterest);
            return;
        }
        if !item.code().is_success() {
            return;
        }
        let Some(frames) = item.take_frames() else {
            warn!("No frames to process for {}", item.url());
            return;
        };

        let mut stream = RegionStream::new(Arc::clone(item), frames, self.prev_pois.as_deref());
        let mut problematic_batches = 0;
        for entries in BatchGenerator::new(stream.by_ref(), self.batch_size) {
            let batch = FrameBatch::from(entries);
            debug!("Processing batch of {} frames for {}", batch.len(), item.url());
            let result = self.inference.process_images(
                &batch.frames,
                &batch.tstamps,
                &batch.regions,
                &batch.items,
            );
            if let Err(e) = result {
                problematic_batches += 1;
                warn!(
                    "Problem processing frames of {} ({} problematic batches): {}",
                    item.url(),
                    problematic_batches,
                    e
                );
                if problematic_batches > self.max_problematic_batches {
                    error!("{} for {}: {}", Codes::ErrorProcessing, item.url(), e);
                    item.set_code(Codes::ErrorProcessing);
                    break;
                }
            }
        }

        if self.prev_pois.is_some() {
            self.items_streamed += 1;
            self.prev_regions_of_interest_count += stream.matched();
        }
    }

    fn end_cycle(&mut self) -> Codes {
        self.run_matched += self.prev_regions_of_interest_count;
        self.run_streamed += self.items_streamed;
        if self.no_prev_regions(self.items_streamed, self.prev_regions_of_interest_count) {
            warn!("NO_PREV_REGIONS_OF_INTEREST in this cycle");
            return Codes::NoPrevRegionsOfInterest;
        }
        Codes::Success
    }

    fn begin_run(&mut self) {
        self.run_matched = 0;
        self.run_streamed = 0;
    }

    // A match in any cycle of the run clears the per-cycle diagnostics.
    fn end_run(&mut self, _cycles: Codes) -> Codes {
        if self.no_prev_regions(self.run_streamed, self.run_matched) {
            warn!("NO_PREV_REGIONS_OF_INTEREST in this run");
            return Codes::NoPrevRegionsOfInterest;
        }
        Codes::Success
    }
}
