use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::block::{Block, Side};
use crate::error::ConfigError;
use crate::stimulus::{CategoryId, StimulusCategory};

/// Pairs of 0-based block indices exchanged by auto-balance (blocks 1, 3, 4
/// with 5, 6, 7).
pub const BALANCE_SWAPS: [(usize, usize); 3] = [(0, 4), (2, 5), (3, 6)];

/// A fully resolved experiment, ready to be run once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRunConfig {
    pub experiment: u32,
    pub participant: String,
    pub blocks: Vec<Block>,
    pub categories: BTreeMap<CategoryId, StimulusCategory>,
    #[serde(default)]
    pub check_answers: bool,
    #[serde(default)]
    pub error_notifications: bool,
    #[serde(default)]
    pub auto_balance: bool,
}

impl ExperimentRunConfig {
    pub fn new(experiment: u32, participant: impl Into<String>) -> Self {
        Self {
            experiment,
            participant: participant.into(),
            blocks: Vec::new(),
            categories: BTreeMap::new(),
            check_answers: false,
            error_notifications: false,
            auto_balance: false,
        }
    }

    pub fn with_category(mut self, category: StimulusCategory) -> Self {
        self.categories.insert(category.id, category);
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn checking(mut self, check_answers: bool, error_notifications: bool) -> Self {
        self.check_answers = check_answers;
        self.error_notifications = error_notifications;
        self
    }

    pub fn balanced(mut self, auto_balance: bool) -> Self {
        self.auto_balance = auto_balance;
        self
    }

    pub fn category(&self, id: CategoryId) -> Option<&StimulusCategory> {
        self.categories.get(&id)
    }

    /// Error notifications only make sense while answers are being checked.
    pub fn notifies_errors(&self) -> bool {
        self.check_answers && self.error_notifications
    }

    pub fn total_trials(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.trials)).sum()
    }

    /// One entry per mapped position of `block`, in slot order.
    pub fn active_categories(&self, block: &Block) -> Vec<&StimulusCategory> {
        block
            .mapped()
            .filter_map(|(_, id)| self.categories.get(&id))
            .collect()
    }

    /// Whether auto-balance can apply to this block list.
    pub fn can_balance(&self) -> bool {
        self.auto_balance && self.blocks.len() >= 7
    }

    /// Exchanges blocks 1, 3, 4 with blocks 5, 6, 7. No-op on short lists.
    pub fn swap_balanced_blocks(&mut self) {
        if self.blocks.len() < 7 {
            return;
        }
        for (a, b) in BALANCE_SWAPS {
            self.blocks.swap(a, b);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks.is_empty() {
            return Err(ConfigError::NoBlocks);
        }

        for category in self.categories.values() {
            if let Some(stray) = category.stimuli.iter().find(|s| s.category != category.id) {
                return Err(ConfigError::MisfiledStimulus {
                    stimulus: stray.id,
                    filed: category.id,
                    claimed: stray.category,
                });
            }
        }

        for block in &self.blocks {
            if block.trials == 0 {
                return Err(ConfigError::NoTrials { block: block.id });
            }
            if let Some((_, category)) = block
                .mapped()
                .find(|(_, id)| !self.categories.contains_key(id))
            {
                return Err(ConfigError::UnknownCategory {
                    block: block.id,
                    category,
                });
            }
            if self.check_answers {
                for side in [Side::Left, Side::Right] {
                    if !block.has_side(side) {
                        return Err(ConfigError::MissingSide {
                            block: block.id,
                            side,
                        });
                    }
                }
            }
            let pool: usize = self.active_categories(block).iter().map(|c| c.len()).sum();
            if pool == 0 {
                return Err(ConfigError::EmptyPool { block: block.id });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Position;

    fn flowers_insects() -> ExperimentRunConfig {
        ExperimentRunConfig::new(1, "p-01")
            .with_category(StimulusCategory::new(1, "Flowers").with_word(10, "rose"))
            .with_category(StimulusCategory::new(2, "Insects").with_word(20, "wasp"))
            .with_block(
                Block::new(1, 2, "practice")
                    .with(Position::LeftTop, 1)
                    .with(Position::RightTop, 2),
            )
            .checking(true, false)
    }

    #[test]
    fn well_formed_config_validates() {
        assert_eq!(flowers_insects().validate(), Ok(()));
    }

    #[test]
    fn empty_block_list_is_rejected() {
        let config = ExperimentRunConfig::new(1, "p");
        assert_eq!(config.validate(), Err(ConfigError::NoBlocks));
    }

    #[test]
    fn zero_trial_block_is_rejected() {
        let mut config = flowers_insects();
        config.blocks[0].trials = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoTrials { block: 1 }));
    }

    #[test]
    fn dangling_category_is_rejected() {
        let config = flowers_insects().with_block(
            Block::new(2, 4, "bad")
                .with(Position::LeftTop, 1)
                .with(Position::RightTop, 99),
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownCategory {
                block: 2,
                category: 99
            })
        );
    }

    #[test]
    fn empty_pool_is_rejected() {
        let config = ExperimentRunConfig::new(1, "p")
            .with_category(StimulusCategory::new(1, "Empty"))
            .with_category(StimulusCategory::new(2, "Also empty"))
            .with_block(
                Block::new(3, 4, "hollow")
                    .with(Position::LeftTop, 1)
                    .with(Position::RightTop, 2),
            );
        assert_eq!(config.validate(), Err(ConfigError::EmptyPool { block: 3 }));
    }

    #[test]
    fn one_sided_block_only_matters_when_checking() {
        let mut config = flowers_insects();
        config.blocks[0].components.remove(&Position::RightTop);
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingSide {
                block: 1,
                side: Side::Right
            })
        );

        config.check_answers = false;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn misfiled_stimulus_is_rejected() {
        let mut config = flowers_insects();
        if let Some(flowers) = config.categories.get_mut(&1) {
            flowers.stimuli[0].category = 2;
        }
        assert_eq!(
            config.validate(),
            Err(ConfigError::MisfiledStimulus {
                stimulus: 10,
                filed: 1,
                claimed: 2
            })
        );
    }

    #[test]
    fn duplicate_positions_yield_duplicate_active_entries() {
        let config = flowers_insects();
        let block = Block::new(9, 1, "doubled")
            .with(Position::LeftTop, 1)
            .with(Position::LeftBottom, 1)
            .with(Position::RightTop, 2);
        let ids: Vec<CategoryId> = config
            .active_categories(&block)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 1]);
    }

    #[test]
    fn notifications_require_checking() {
        let config = flowers_insects().checking(false, true);
        assert!(!config.notifies_errors());
        assert!(flowers_insects().checking(true, true).notifies_errors());
    }

    #[test]
    fn balance_swaps_blocks_one_three_four_with_five_six_seven() {
        let mut config = ExperimentRunConfig::new(1, "p").balanced(true);
        for id in 1..=7 {
            config.blocks.push(Block::new(id, 1, format!("block {id}")));
        }
        assert!(config.can_balance());
        config.swap_balanced_blocks();
        let order: Vec<u32> = config.blocks.iter().map(|b| b.id).collect();
        assert_eq!(order, vec![5, 2, 6, 7, 1, 3, 4]);
    }

    #[test]
    fn balance_needs_seven_blocks() {
        let config = flowers_insects().balanced(true);
        assert!(!config.can_balance());
    }
}
