use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome attached to an item. Once an item carries anything other than
/// `Success` the later pipeline stages are skipped.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Codes {
    #[default]
    Success = 0,
    ErrorLoadingMedia = 1,
    ErrorTimeout = 2,
    ErrorProcessing = 3,
    NoPrevRegionsOfInterest = 4,
}

impl Codes {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codes::Success => "SUCCESS",
            Codes::ErrorLoadingMedia => "ERROR_LOADING_MEDIA",
            Codes::ErrorTimeout => "ERROR_TIMEOUT",
            Codes::ErrorProcessing => "ERROR_PROCESSING",
            Codes::NoPrevRegionsOfInterest => "NO_PREV_REGIONS_OF_INTEREST",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Codes::Success
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Codes::ErrorLoadingMedia,
            2 => Codes::ErrorTimeout,
            3 => Codes::ErrorProcessing,
            4 => Codes::NoPrevRegionsOfInterest,
            _ => Codes::Success,
        }
    }
}

impl fmt::Display for Codes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
