use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid block range: start {start} is greater than end {end}")]
pub struct InvalidBlockRange {
    pub start: u64,
    pub end: u64,
}

/// Inclusive interval of block numbers processed in a single sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBlockRange")]
pub struct BlockRange {
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct RawBlockRange {
    start: u64,
    end: u64,
}

impl TryFrom<RawBlockRange> for BlockRange {
    type Error = InvalidBlockRange;

    fn try_from(raw: RawBlockRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Result<Self, InvalidBlockRange> {
        if start > end {
            return Err(InvalidBlockRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of blocks in the range. Saturates for the full `u64` range.
    pub fn len(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, block_n: u64) -> bool {
        (self.start..=self.end).contains(&block_n)
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
