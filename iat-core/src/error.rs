use thiserror::Error;

use crate::block::Side;
use crate::stimulus::{CategoryId, StimulusId};

/// Reasons an experiment definition cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("experiment has no blocks")]
    NoBlocks,

    #[error("block {block} has no trials")]
    NoTrials { block: u32 },

    #[error("block {block} references unknown category {category}")]
    UnknownCategory { block: u32, category: CategoryId },

    #[error("block {block} has no stimuli in its active categories")]
    EmptyPool { block: u32 },

    /// Only raised when answers are checked.
    #[error("block {block} maps no category to the {side} side")]
    MissingSide { block: u32, side: Side },

    #[error("stimulus {stimulus} is filed under category {filed} but belongs to {claimed}")]
    MisfiledStimulus {
        stimulus: StimulusId,
        filed: CategoryId,
        claimed: CategoryId,
    },
}
