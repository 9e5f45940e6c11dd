pub mod common;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod response;

#[cfg(test)]
mod testing;

pub use common::{Codes, Frame, Request};
pub use config::Configuration;
pub use error::{AppError, ConfigError, MediaError, PredicateError, ProcessingError};
pub use pipeline::{ImageModule, ImageOrchestrator, ModuleOrchestrator};
pub use response::{ItemState, ModuleInfo, ModuleResponse, ResponseItem};
