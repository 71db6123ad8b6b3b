//! Loading of experiment definitions as exported by the authoring server.
//!
//! The server sends numbers and flags loosely typed (`"12"`, `"1"`, `true`),
//! positions keyed by slot number and categories keyed by id. Everything is
//! converted into an [`ExperimentRunConfig`] and validated before a run can
//! see it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use iat_core::{Block, ExperimentRunConfig, Position, Stimulus, StimulusCategory};
use serde::Deserialize;

use crate::error::LoadError;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Bool(bool),
    Int(u64),
    Text(String),
}

impl Loose {
    fn bad(&self, field: &'static str) -> LoadError {
        let value = match self {
            Loose::Bool(b) => b.to_string(),
            Loose::Int(n) => n.to_string(),
            Loose::Text(s) => s.clone(),
        };
        LoadError::BadField { field, value }
    }

    fn to_u32(&self, field: &'static str) -> Result<u32, LoadError> {
        match self {
            Loose::Int(n) => u32::try_from(*n).map_err(|_| self.bad(field)),
            Loose::Text(s) => s.trim().parse().map_err(|_| self.bad(field)),
            Loose::Bool(_) => Err(self.bad(field)),
        }
    }

    fn to_flag(&self, field: &'static str) -> Result<bool, LoadError> {
        match self {
            Loose::Bool(b) => Ok(*b),
            Loose::Int(0) => Ok(false),
            Loose::Int(1) => Ok(true),
            Loose::Text(s) => match s.trim() {
                "" | "0" | "false" => Ok(false),
                "1" | "true" => Ok(true),
                _ => Err(self.bad(field)),
            },
            Loose::Int(_) => Err(self.bad(field)),
        }
    }
}

fn flag(value: &Option<Loose>, field: &'static str) -> Result<bool, LoadError> {
    value.as_ref().map_or(Ok(false), |v| v.to_flag(field))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentDefinition {
    pub experiment_number: Loose,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub check_answers: Option<Loose>,
    #[serde(default)]
    pub error_notifications: Option<Loose>,
    #[serde(default, alias = "autoBalance")]
    pub balance: Option<Loose>,
    pub stimulus_categories: BTreeMap<String, CategoryDefinition>,
    pub blocks: Vec<BlockDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub id: Loose,
    pub name: String,
    #[serde(default)]
    pub stimuli: Vec<StimulusDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StimulusDefinition {
    pub id: Loose,
    pub word: String,
    #[serde(default)]
    pub stimulus_category: Option<Loose>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockDefinition {
    pub id: Loose,
    pub trials: Loose,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentDefinition {
    pub category: Loose,
}

impl ExperimentDefinition {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolves the definition for one participant and validates it.
    pub fn into_run_config(
        self,
        participant: impl Into<String>,
    ) -> Result<ExperimentRunConfig, LoadError> {
        let mut config =
            ExperimentRunConfig::new(self.experiment_number.to_u32("experimentNumber")?, participant);
        config.check_answers = flag(&self.check_answers, "checkAnswers")?;
        config.error_notifications = flag(&self.error_notifications, "errorNotifications")?;
        config.auto_balance = flag(&self.balance, "balance")?;

        for def in self.stimulus_categories.into_values() {
            let id = def.id.to_u32("stimulusCategories.id")?;
            let mut category = StimulusCategory::new(id, def.name);
            for s in def.stimuli {
                let owner = match &s.stimulus_category {
                    Some(c) => c.to_u32("stimuli.stimulusCategory")?,
                    None => id,
                };
                category.stimuli.push(Stimulus {
                    id: s.id.to_u32("stimuli.id")?,
                    word: s.word,
                    category: owner,
                });
            }
            config = config.with_category(category);
        }

        for def in self.blocks {
            let id = def.id.to_u32("blocks.id")?;
            let mut block = Block::new(id, def.trials.to_u32("blocks.trials")?, def.description);
            for (slot, component) in def.components {
                let position = slot
                    .trim()
                    .parse::<u8>()
                    .ok()
                    .and_then(Position::from_slot)
                    .ok_or_else(|| LoadError::BadSlot {
                        block: id,
                        slot: slot.clone(),
                    })?;
                block = block.with(position, component.category.to_u32("components.category")?);
            }
            config = config.with_block(block);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Reads a definition file and resolves it for `participant`.
pub fn load_definition(
    path: impl AsRef<Path>,
    participant: impl Into<String>,
) -> Result<ExperimentRunConfig, LoadError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ExperimentDefinition::from_json(&json)?.into_run_config(participant)
}
