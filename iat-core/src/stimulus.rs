use serde::{Deserialize, Serialize};

pub type CategoryId = u32;
pub type StimulusId = u32;

/// A single word shown in the center of the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimulus {
    pub id: StimulusId,
    pub word: String,
    pub category: CategoryId,
}

/// A named pool of stimuli that a block can place in one of its positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub stimuli: Vec<Stimulus>,
}

impl StimulusCategory {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stimuli: Vec::new(),
        }
    }

    /// Adds a word filed under this category.
    pub fn with_word(mut self, id: StimulusId, word: impl Into<String>) -> Self {
        self.stimuli.push(Stimulus {
            id,
            word: word.into(),
            category: self.id,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }
}
