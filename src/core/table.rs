/// Random tables — outcome ranges, expansion, and roll resolution.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

use crate::core::dice::{self, DiceError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table has no outcomes")]
    EmptyTable,
    #[error("invalid outcome key '{0}': expected an integer or an 'A-B' range")]
    InvalidOutcomeKey(String),
    #[error("table roll failed: {0}")]
    Dice(#[from] DiceError),
}

/// Key of a table outcome: a single roll or an inclusive range of rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutcomeKey {
    pub start: i64,
    pub end: i64,
}

impl OutcomeKey {
    pub fn single(value: i64) -> Self {
        Self {
            start: value,
            end: value,
        }
    }

    /// Parse `"4"` or `"1-3"`.
    pub fn parse(key: &str) -> Result<Self, TableError> {
        let invalid = || TableError::InvalidOutcomeKey(key.to_string());
        let key = key.trim();
        match key.split_once('-') {
            Some((start, end)) if !start.is_empty() => Ok(Self {
                start: start.trim().parse().map_err(|_| invalid())?,
                end: end.trim().parse().map_err(|_| invalid())?,
            }),
            _ => key.parse().map(Self::single).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A table attached to an entity.
///
/// Content files write outcomes as a map from key strings to text; on load
/// the keys are parsed and every range is expanded into single rolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable", into = "RawTable")]
pub struct Table {
    /// Dice notation rolled when the placeholder gives no result.
    pub roll: Option<String>,
    /// Outcomes as written, ordered by key.
    pub outcomes: Vec<(OutcomeKey, String)>,
    /// One entry per individual roll covered by `outcomes`.
    pub expanded_outcomes: BTreeMap<i64, String>,
}

// On-disk shape of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTable {
    #[serde(default)]
    roll: Option<String>,
    outcomes: HashMap<String, String>,
}

impl TryFrom<RawTable> for Table {
    type Error = TableError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let outcomes = raw
            .outcomes
            .into_iter()
            .map(|(key, text)| Ok((OutcomeKey::parse(&key)?, text)))
            .collect::<Result<Vec<_>, TableError>>()?;
        Ok(Table::new(raw.roll, outcomes))
    }
}

impl From<Table> for RawTable {
    fn from(table: Table) -> Self {
        RawTable {
            roll: table.roll,
            outcomes: table
                .outcomes
                .into_iter()
                .map(|(key, text)| (key.to_string(), text))
                .collect(),
        }
    }
}

impl Table {
    /// Build a table from keyed outcomes and expand it.
    pub fn new(roll: Option<String>, mut outcomes: Vec<(OutcomeKey, String)>) -> Self {
        outcomes.sort_by_key(|(key, _)| *key);
        Table {
            roll,
            outcomes,
            expanded_outcomes: BTreeMap::new(),
        }
        .expand()
    }

    /// Build a table from string keys such as `"1-3"` and `"4"`.
    pub fn from_pairs(roll: Option<&str>, pairs: &[(&str, &str)]) -> Result<Self, TableError> {
        let outcomes = pairs
            .iter()
            .map(|(key, text)| Ok((OutcomeKey::parse(key)?, text.to_string())))
            .collect::<Result<Vec<_>, TableError>>()?;
        Ok(Table::new(roll.map(str::to_string), outcomes))
    }

    /// Fill `expanded_outcomes` from `outcomes` and, when the table has no
    /// roll of its own and its highest key is positive, give it
    /// `1d<highest key>`.
    pub fn expand(mut self) -> Self {
        self.expanded_outcomes.clear();
        for (key, text) in &self.outcomes {
            for roll in key.start..=key.end {
                self.expanded_outcomes.insert(roll, text.clone());
            }
        }
        if self.roll.is_none() {
            if let Some(max) = self.max_roll().filter(|max| *max >= 1) {
                self.roll = Some(format!("1d{}", max));
            }
        }
        self
    }

    pub fn min_roll(&self) -> Option<i64> {
        self.expanded_outcomes.keys().next().copied()
    }

    pub fn max_roll(&self) -> Option<i64> {
        self.expanded_outcomes.keys().next_back().copied()
    }

    /// Rolls inside `[min, max]` with no outcome.
    pub fn gaps(&self) -> Vec<i64> {
        match (self.min_roll(), self.max_roll()) {
            (Some(min), Some(max)) => (min..=max)
                .filter(|r| !self.expanded_outcomes.contains_key(r))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Pick an outcome.
    ///
    /// Uses `explicit` when given, else the table's own roll, else a uniform
    /// draw over the covered rolls. The roll is clamped into the table's range;
    /// a roll landing in a gap takes the nearest lower outcome.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        explicit: Option<i64>,
        rng: &mut R,
    ) -> Result<&str, TableError> {
        let (min, max) = match (self.min_roll(), self.max_roll()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(TableError::EmptyTable),
        };

        let rolled = match (explicit, &self.roll) {
            (Some(result), _) => result,
            (None, Some(notation)) => i64::from(dice::evaluate(notation, rng)?),
            (None, None) => rng.gen_range(min..=max),
        };

        let roll = rolled.clamp(min, max);
        self.expanded_outcomes
            .range(..=roll)
            .next_back()
            .map(|(_, text)| text.as_str())
            .ok_or(TableError::EmptyTable)
    }
}
