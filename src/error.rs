use std::path::PathBuf;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Media Error: {0}")]
    Media(#[from] MediaError),
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Predicate Error: {0}")]
    Predicate(#[from] PredicateError),
    #[error("No async runtime available: {0}")]
    Runtime(String),
    #[error("Failed to read {1}: {0}")]
    Io(std::io::Error, PathBuf),
    #[error("Failed to parse requests: {0}")]
    Json(#[from] serde_json::Error),
}

// Media acquisition errors, all of them end up as ERROR_LOADING_MEDIA on the item
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Media not found: {0}")]
    NotFound(String),
    #[error("Unsupported media url: {0}")]
    Unsupported(String),
    #[error("Failed to decode {0}: {1}")]
    Decode(String, image::ImageError),
    #[error("Failed to read {0}: {1}")]
    Io(String, std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Recoverable processing error: {0}")]
    Recoverable(String),
    #[error("Invalid batch of {0} frames: {1}")]
    InvalidBatch(usize, String),
}

#[derive(Error, Debug, PartialEq)]
pub enum PredicateError {
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unexpected token '{0}' at position {1}")]
    UnexpectedToken(String, usize),
    #[error("Invalid literal '{0}'")]
    InvalidLiteral(String),
    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
