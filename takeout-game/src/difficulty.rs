//! Per-restaurant difficulty tiers and the tables keyed by them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{DEFAULT_HARD_THRESHOLD, DEFAULT_MEDIUM_THRESHOLD};

/// Difficulty of the orders a restaurant receives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Self; 3] = [Self::Easy, Self::Medium, Self::Hard];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Completed-order counts at which a restaurant escalates difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyThresholds {
    #[serde(default = "DifficultyThresholds::default_medium")]
    pub medium: u32,
    #[serde(default = "DifficultyThresholds::default_hard")]
    pub hard: u32,
}

impl DifficultyThresholds {
    const fn default_medium() -> u32 {
        DEFAULT_MEDIUM_THRESHOLD
    }

    const fn default_hard() -> u32 {
        DEFAULT_HARD_THRESHOLD
    }

    /// Difficulty for a restaurant after `completed` orders.
    ///
    /// Non-decreasing in `completed` as long as `medium <= hard`.
    #[must_use]
    pub const fn difficulty_for(&self, completed: u32) -> Difficulty {
        if completed >= self.hard {
            Difficulty::Hard
        } else if completed >= self.medium {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            medium: Self::default_medium(),
            hard: Self::default_hard(),
        }
    }
}

/// One value per difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTable<T> {
    pub easy: T,
    pub medium: T,
    pub hard: T,
}

impl<T> DifficultyTable<T> {
    pub const fn new(easy: T, medium: T, hard: T) -> Self {
        Self { easy, medium, hard }
    }

    #[must_use]
    pub const fn get(&self, difficulty: Difficulty) -> &T {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Difficulty, &T)> {
        Difficulty::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_at_default_thresholds() {
        let thresholds = DifficultyThresholds::default();
        assert_eq!(thresholds.difficulty_for(0), Difficulty::Easy);
        assert_eq!(thresholds.difficulty_for(9), Difficulty::Easy);
        assert_eq!(thresholds.difficulty_for(10), Difficulty::Medium);
        assert_eq!(thresholds.difficulty_for(19), Difficulty::Medium);
        assert_eq!(thresholds.difficulty_for(20), Difficulty::Hard);
        assert_eq!(thresholds.difficulty_for(u32::MAX), Difficulty::Hard);
    }

    #[test]
    fn difficulty_never_decreases_with_more_orders() {
        let thresholds = DifficultyThresholds::default();
        let mut previous = Difficulty::Easy;
        for completed in 0..40 {
            let current = thresholds.difficulty_for(completed);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn thresholds_deserialize_with_defaults() {
        let parsed: DifficultyThresholds = serde_json::from_str(r#"{"hard": 30}"#).unwrap();
        assert_eq!(parsed.medium, 10);
        assert_eq!(parsed.hard, 30);
    }

    #[test]
    fn table_iterates_in_tier_order() {
        let table = DifficultyTable::new(1, 2, 3);
        let collected: Vec<_> = table.iter().map(|(d, v)| (d, *v)).collect();
        assert_eq!(
            collected,
            vec![
                (Difficulty::Easy, 1),
                (Difficulty::Medium, 2),
                (Difficulty::Hard, 3)
            ]
        );
    }
}
