//! Module side of the worker: drive cycles, frame streaming and batching.

pub mod batch;
pub mod color_stats;
pub mod image_module;
pub mod orchestrator;
pub mod predicate;
pub mod stream;

pub use batch::BatchGenerator;
pub use color_stats::ColorStatsInference;
pub use image_module::{ImageInference, ImageModule, MAX_PROBLEMATIC_BATCHES};
pub use orchestrator::{CycleOutcome, ItemProcessor, ModuleOrchestrator, ModuleOrchestratorBuilder};
pub use predicate::{PredicateEvaluator, QueryPredicate};
pub use stream::{FrameBatch, RegionStream, StreamEntry};

/// An orchestrator driving an [`ImageModule`].
pub type ImageOrchestrator<H> = ModuleOrchestrator<ImageModule<H>>;
