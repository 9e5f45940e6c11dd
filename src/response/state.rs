use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an item, in order of intended progression.
/// `Irrelevant` is only reported while the state machine is disabled.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    Irrelevant = 0,
    ToBeProcessed = 1,
    PreparingToBeProcessed = 2,
    ReadyToBeProcessed = 3,
    BeingProcessed = 4,
    Processed = 5,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Irrelevant => "IRRELEVANT",
            ItemState::ToBeProcessed => "TO_BE_PROCESSED",
            ItemState::PreparingToBeProcessed => "PREPARING_TO_BE_PROCESSED",
            ItemState::ReadyToBeProcessed => "READY_TO_BE_PROCESSED",
            ItemState::BeingProcessed => "BEING_PROCESSED",
            ItemState::Processed => "PROCESSED",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ItemState::ToBeProcessed,
            2 => ItemState::PreparingToBeProcessed,
            3 => ItemState::ReadyToBeProcessed,
            4 => ItemState::BeingProcessed,
            5 => ItemState::Processed,
            _ => ItemState::Irrelevant,
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_round_trip_through_their_tag() {
        for state in [
            ItemState::Irrelevant,
            ItemState::ToBeProcessed,
            ItemState::PreparingToBeProcessed,
            ItemState::ReadyToBeProcessed,
            ItemState::BeingProcessed,
            ItemState::Processed,
        ] {
            assert_eq!(ItemState::from_u8(state as u8), state);
        }
    }
}
