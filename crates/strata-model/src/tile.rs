// SPDX-License-Identifier: MIT OR Apache-2.0
//! Quadtree tile identifiers.
//!
//! A [`TileKey`] addresses a node of a quadtree by `(level, row, col)`. The
//! wire form is the "here tile" string: the decimal rendering of a `u64`
//! whose base-4 digits, after a leading `1` sentinel, walk the tree from the
//! root (digit = `2 * rowBit + colBit`). Level 0 is the root, `"1"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum addressable level; 2 bits per level below a leading sentinel bit.
pub const MAX_LEVEL: u32 = 31;

/// Identifier of a quadtree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level; 0 is the root.
    pub level: u32,
    /// Row within the level, `0..2^level`.
    pub row: u32,
    /// Column within the level, `0..2^level`.
    pub col: u32,
}

impl TileKey {
    /// The root tile, level 0.
    pub const ROOT: TileKey = TileKey {
        level: 0,
        row: 0,
        col: 0,
    };

    /// Create a key from row, column, and level.
    #[must_use]
    pub fn from_row_col_level(row: u32, col: u32, level: u32) -> Self {
        Self { level, row, col }
    }

    /// Returns `true` when the coordinates fit the level.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.level > MAX_LEVEL {
            return false;
        }
        let extent = 1u64 << self.level;
        u64::from(self.row) < extent && u64::from(self.col) < extent
    }

    /// Numeric here-tile form.
    #[must_use]
    pub fn to_here_tile(&self) -> u64 {
        let mut value: u64 = 1;
        for i in (0..self.level).rev() {
            let row_bit = (self.row >> i) & 1;
            let col_bit = (self.col >> i) & 1;
            value = (value << 2) | u64::from(row_bit << 1 | col_bit);
        }
        value
    }

    /// Parse a numeric here-tile value. Returns `None` for 0.
    #[must_use]
    pub fn from_here_tile(value: u64) -> Option<Self> {
        if value == 0 {
            return None;
        }
        let level = (63 - value.leading_zeros()) / 2;
        let mut row = 0u32;
        let mut col = 0u32;
        for i in 0..level {
            let digit = (value >> (2 * i)) & 0b11;
            row |= (((digit >> 1) & 1) as u32) << i;
            col |= ((digit & 1) as u32) << i;
        }
        Some(Self { level, row, col })
    }

    /// The parent tile, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.level == 0 {
            return None;
        }
        Some(Self {
            level: self.level - 1,
            row: self.row >> 1,
            col: self.col >> 1,
        })
    }

    /// The child at sub-index `0..4` (digit = `2 * rowBit + colBit`).
    #[must_use]
    pub fn child(&self, index: u32) -> Option<Self> {
        if index >= 4 || self.level >= MAX_LEVEL {
            return None;
        }
        Some(Self {
            level: self.level + 1,
            row: self.row << 1 | (index >> 1),
            col: self.col << 1 | (index & 1),
        })
    }

    /// All four children, root-to-leaf digit order.
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        (0..4).filter_map(|i| self.child(i)).collect()
    }

    /// The ancestor `delta` levels up, saturating at the root.
    #[must_use]
    pub fn changed_level_by(&self, delta: i32) -> Self {
        let level = self
            .level
            .saturating_add_signed(delta)
            .min(MAX_LEVEL);
        self.changed_level_to(level)
    }

    /// The key re-addressed at `level`: ancestor when shallower, the
    /// top-left descendant when deeper.
    #[must_use]
    pub fn changed_level_to(&self, level: u32) -> Self {
        if level <= self.level {
            let shift = self.level - level;
            Self {
                level,
                row: self.row >> shift,
                col: self.col >> shift,
            }
        } else {
            let shift = level - self.level;
            Self {
                level,
                row: self.row << shift,
                col: self.col << shift,
            }
        }
    }

    /// Append a relative sub-key (itself in here-tile form) below this tile.
    ///
    /// Quadtree index pages address children this way: the absolute key of an
    /// entry is `root.added_sub_key(subQuadKey)`.
    #[must_use]
    pub fn added_sub_key(&self, sub_quad_key: u64) -> Option<Self> {
        let sub = Self::from_here_tile(sub_quad_key)?;
        let level = self.level + sub.level;
        if level > MAX_LEVEL {
            return None;
        }
        Some(Self {
            level,
            row: self.row << sub.level | sub.row,
            col: self.col << sub.level | sub.col,
        })
    }

    /// Returns `true` if `other` is this tile or one of its descendants.
    #[must_use]
    pub fn is_ancestor_or_self(&self, other: &TileKey) -> bool {
        other.level >= self.level && other.changed_level_to(self.level) == *self
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_here_tile())
    }
}

/// The string was not a valid here-tile rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid here tile `{0}`")]
pub struct ParseTileKeyError(String);

/// Parse the decimal here-tile string form.
impl FromStr for TileKey {
    type Err = ParseTileKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s.parse().map_err(|_| ParseTileKeyError(s.to_string()))?;
        Self::from_here_tile(value).ok_or_else(|| ParseTileKeyError(s.to_string()))
    }
}

impl Serialize for TileKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TileKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid here tile `{raw}`")))
    }
}
