use serde::{Deserialize, Serialize};

use crate::block::{Position, Side};
use crate::stimulus::StimulusId;

/// Browser key code of the left arrow key.
pub const LEFT_KEY: u32 = 37;
/// Browser key code of the right arrow key.
pub const RIGHT_KEY: u32 = 39;

/// Maps a raw key code onto a response side, if it is one of the two arrows.
pub fn side_for_key(code: u32) -> Option<Side> {
    match code {
        LEFT_KEY => Some(Side::Left),
        RIGHT_KEY => Some(Side::Right),
        _ => None,
    }
}

/// Outcome of scoring one key press against the current stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Correct,
    Incorrect,
    Ignored,
}

/// One accepted answer. Records are appended in trial completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub stimulus: StimulusId,
    /// Raw key code of the accepted input.
    pub response: u32,
    pub response_time_ms: u64,
    pub time_shown_ms: u64,
}

/// What the presentation layer should paint for the current trial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub left_top: Option<String>,
    pub right_top: Option<String>,
    pub left_bottom: Option<String>,
    pub right_bottom: Option<String>,
    pub word: String,
}

impl Display {
    pub fn label(&self, position: Position) -> Option<&str> {
        match position {
            Position::LeftTop => self.left_top.as_deref(),
            Position::RightTop => self.right_top.as_deref(),
            Position::LeftBottom => self.left_bottom.as_deref(),
            Position::RightBottom => self.right_bottom.as_deref(),
        }
    }

    pub fn set_label(&mut self, position: Position, label: Option<String>) {
        let slot = match position {
            Position::LeftTop => &mut self.left_top,
            Position::RightTop => &mut self.right_top,
            Position::LeftBottom => &mut self.left_bottom,
            Position::RightBottom => &mut self.right_bottom,
        };
        *slot = label;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_arrows_map_to_sides() {
        assert_eq!(side_for_key(LEFT_KEY), Some(Side::Left));
        assert_eq!(side_for_key(RIGHT_KEY), Some(Side::Right));
        assert_eq!(side_for_key(32), None);
        assert_eq!(side_for_key(38), None);
    }

    #[test]
    fn labels_are_addressed_by_position() {
        let mut display = Display::default();
        display.set_label(Position::RightBottom, Some("Bad".into()));
        assert_eq!(display.label(Position::RightBottom), Some("Bad"));
        assert_eq!(display.label(Position::LeftTop), None);
    }
}
