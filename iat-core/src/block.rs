use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stimulus::CategoryId;

/// One of the four fixed screen quadrants a category label can occupy.
///
/// The declaration order matches the slot numbering (1..=4), so iterating a
/// `BTreeMap<Position, _>` walks positions in slot order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    LeftTop,
    RightTop,
    LeftBottom,
    RightBottom,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::LeftTop,
        Position::RightTop,
        Position::LeftBottom,
        Position::RightBottom,
    ];

    pub fn slot(self) -> u8 {
        match self {
            Position::LeftTop => 1,
            Position::RightTop => 2,
            Position::LeftBottom => 3,
            Position::RightBottom => 4,
        }
    }

    pub fn from_slot(slot: u8) -> Option<Self> {
        Some(match slot {
            1 => Position::LeftTop,
            2 => Position::RightTop,
            3 => Position::LeftBottom,
            4 => Position::RightBottom,
            _ => return None,
        })
    }

    pub fn side(self) -> Side {
        match self {
            Position::LeftTop | Position::LeftBottom => Side::Left,
            Position::RightTop | Position::RightBottom => Side::Right,
        }
    }
}

/// A phase of the test with its own trial count and label layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: u32,
    pub trials: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: BTreeMap<Position, CategoryId>,
}

impl Block {
    pub fn new(id: u32, trials: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            trials,
            description: description.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn with(mut self, position: Position, category: CategoryId) -> Self {
        self.components.insert(position, category);
        self
    }

    pub fn category_at(&self, position: Position) -> Option<CategoryId> {
        self.components.get(&position).copied()
    }

    /// Mapped positions in slot order. A category mapped twice appears twice.
    pub fn mapped(&self) -> impl Iterator<Item = (Position, CategoryId)> + '_ {
        self.components.iter().map(|(p, c)| (*p, *c))
    }

    pub fn categories_on(&self, side: Side) -> impl Iterator<Item = CategoryId> + '_ {
        self.mapped()
            .filter(move |(p, _)| p.side() == side)
            .map(|(_, c)| c)
    }

    /// True when `category` is labelled on `side` in this block.
    pub fn accepts(&self, side: Side, category: CategoryId) -> bool {
        self.categories_on(side).any(|c| c == category)
    }

    pub fn has_side(&self, side: Side) -> bool {
        self.categories_on(side).next().is_some()
    }
}
