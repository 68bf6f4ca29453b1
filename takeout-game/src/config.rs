//! Tunable tables for generation, conditions, scoring, and the order lifecycle.
//!
//! Every field has a serde default so partial JSON overrides work; call
//! [`GameConfig::validate`] after loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conditions::ConditionKind;
use crate::constants::DEFAULT_ACTIVE_ORDERS;
use crate::difficulty::{Difficulty, DifficultyTable, DifficultyThresholds};
use crate::order::MenuSection;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must stay below 1.0 or generation never terminates (got {value:.2})")]
    UnboundedRepeat { field: &'static str, value: f64 },
    #[error("{field} window invalid (min {min} > max {max})")]
    WindowInverted { field: &'static str, min: u32, max: u32 },
    #[error("condition weights must sum to 1.0 (got {sum:.4})")]
    WeightSum { sum: f64 },
    #[error("delivery phrasing bins must ascend (got {clock_24h:.2}, {clock_12h:.2}, {oclock:.2})")]
    PhrasingOrder {
        clock_24h: f64,
        clock_12h: f64,
        oclock: f64,
    },
    #[error("difficulty thresholds invalid (medium {medium} > hard {hard})")]
    ThresholdOrder { medium: u32, hard: u32 },
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}

/// Inclusive `[min, max]` window, in seconds or minutes depending on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub min: u32,
    pub max: u32,
}

impl Window {
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    fn validate(self, field: &'static str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::WindowInverted {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// One probability per menu section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionProbabilities {
    #[serde(rename = "Starters")]
    pub starters: f64,
    #[serde(rename = "Main Courses")]
    pub main_courses: f64,
    #[serde(rename = "Desserts")]
    pub desserts: f64,
    #[serde(rename = "Drinks")]
    pub drinks: f64,
}

impl SectionProbabilities {
    #[must_use]
    pub const fn new(starters: f64, main_courses: f64, desserts: f64, drinks: f64) -> Self {
        Self {
            starters,
            main_courses,
            desserts,
            drinks,
        }
    }

    #[must_use]
    pub const fn get(&self, section: MenuSection) -> f64 {
        match section {
            MenuSection::Starters => self.starters,
            MenuSection::MainCourses => self.main_courses,
            MenuSection::Desserts => self.desserts,
            MenuSection::Drinks => self.drinks,
        }
    }

    fn values(&self) -> [f64; 4] {
        MenuSection::ALL.map(|section| self.get(section))
    }
}

/// Chance that optional customer fields are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerInfoProbabilities {
    pub time: f64,
    pub extra_wish: f64,
}

/// Cumulative thresholds picking the delivery-time phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPhrasing {
    #[serde(default = "DeliveryPhrasing::default_clock_24h")]
    pub clock_24h: f64,
    #[serde(default = "DeliveryPhrasing::default_clock_12h")]
    pub clock_12h: f64,
    #[serde(default = "DeliveryPhrasing::default_oclock")]
    pub oclock: f64,
}

impl DeliveryPhrasing {
    const fn default_clock_24h() -> f64 {
        0.35
    }

    const fn default_clock_12h() -> f64 {
        0.7
    }

    const fn default_oclock() -> f64 {
        0.85
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ascending = 0.0 <= self.clock_24h
            && self.clock_24h <= self.clock_12h
            && self.clock_12h <= self.oclock
            && self.oclock <= 1.0;
        if ascending {
            Ok(())
        } else {
            Err(ConfigError::PhrasingOrder {
                clock_24h: self.clock_24h,
                clock_12h: self.clock_12h,
                oclock: self.oclock,
            })
        }
    }
}

impl Default for DeliveryPhrasing {
    fn default() -> Self {
        Self {
            clock_24h: Self::default_clock_24h(),
            clock_12h: Self::default_clock_12h(),
            oclock: Self::default_oclock(),
        }
    }
}

/// Order generation tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "GenerationConfig::default_initial_dish")]
    pub initial_dish_probability: DifficultyTable<SectionProbabilities>,
    #[serde(default = "GenerationConfig::default_multiple_dish")]
    pub multiple_dish_probability: DifficultyTable<SectionProbabilities>,
    #[serde(default = "GenerationConfig::default_customer_info")]
    pub customer_information_probability: DifficultyTable<CustomerInfoProbabilities>,
    /// Filler sentences injected per paragraph.
    #[serde(default = "GenerationConfig::default_noise")]
    pub noise_sentences: DifficultyTable<Window>,
    #[serde(default = "GenerationConfig::default_penalty")]
    pub penalty_seconds: Window,
    #[serde(default = "GenerationConfig::default_delivery_offset")]
    pub delivery_offset_minutes: Window,
    #[serde(default)]
    pub delivery_phrasing: DeliveryPhrasing,
}

impl GenerationConfig {
    const fn default_initial_dish() -> DifficultyTable<SectionProbabilities> {
        DifficultyTable::new(
            SectionProbabilities::new(0.7, 1.0, 0.6, 0.4),
            SectionProbabilities::new(0.9, 1.0, 0.8, 0.7),
            SectionProbabilities::new(1.0, 1.0, 0.9, 0.8),
        )
    }

    const fn default_multiple_dish() -> DifficultyTable<SectionProbabilities> {
        DifficultyTable::new(
            SectionProbabilities::new(0.2, 0.1, 0.15, 0.05),
            SectionProbabilities::new(0.3, 0.2, 0.35, 0.1),
            SectionProbabilities::new(0.5, 0.6, 0.75, 0.2),
        )
    }

    const fn default_customer_info() -> DifficultyTable<CustomerInfoProbabilities> {
        DifficultyTable::new(
            CustomerInfoProbabilities {
                time: 0.4,
                extra_wish: 0.3,
            },
            CustomerInfoProbabilities {
                time: 0.6,
                extra_wish: 0.5,
            },
            CustomerInfoProbabilities {
                time: 0.9,
                extra_wish: 0.7,
            },
        )
    }

    const fn default_noise() -> DifficultyTable<Window> {
        DifficultyTable::new(Window::new(0, 0), Window::new(0, 2), Window::new(1, 5))
    }

    const fn default_penalty() -> Window {
        Window::new(240, 360)
    }

    const fn default_delivery_offset() -> Window {
        Window::new(30, 120)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (_, table) in self.initial_dish_probability.iter() {
            for value in table.values() {
                check_probability("generation.initial_dish_probability", value)?;
            }
        }
        for (_, table) in self.multiple_dish_probability.iter() {
            for value in table.values() {
                check_probability("generation.multiple_dish_probability", value)?;
                if value >= 1.0 {
                    return Err(ConfigError::UnboundedRepeat {
                        field: "generation.multiple_dish_probability",
                        value,
                    });
                }
            }
        }
        for (_, probabilities) in self.customer_information_probability.iter() {
            check_probability("generation.customer_information_probability.time", probabilities.time)?;
            check_probability(
                "generation.customer_information_probability.extra_wish",
                probabilities.extra_wish,
            )?;
        }
        for (_, window) in self.noise_sentences.iter() {
            window.validate("generation.noise_sentences")?;
        }
        self.penalty_seconds.validate("generation.penalty_seconds")?;
        self.delivery_offset_minutes
            .validate("generation.delivery_offset_minutes")?;
        self.delivery_phrasing.validate()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            initial_dish_probability: Self::default_initial_dish(),
            multiple_dish_probability: Self::default_multiple_dish(),
            customer_information_probability: Self::default_customer_info(),
            noise_sentences: Self::default_noise(),
            penalty_seconds: Self::default_penalty(),
            delivery_offset_minutes: Self::default_delivery_offset(),
            delivery_phrasing: DeliveryPhrasing::default(),
        }
    }
}

/// Relative chance of each condition kind per spawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionWeights {
    pub out_of_stock_section: f64,
    pub out_of_stock_item: f64,
    pub no_firstname: f64,
    pub no_delivery: f64,
    pub no_delivery_time: f64,
    pub no_extra_wish: f64,
}

impl ConditionWeights {
    #[must_use]
    pub const fn get(&self, kind: ConditionKind) -> f64 {
        match kind {
            ConditionKind::OutOfStockSection => self.out_of_stock_section,
            ConditionKind::OutOfStockItem => self.out_of_stock_item,
            ConditionKind::NoFirstname => self.no_firstname,
            ConditionKind::NoDelivery => self.no_delivery,
            ConditionKind::NoDeliveryTime => self.no_delivery_time,
            ConditionKind::NoExtraWish => self.no_extra_wish,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        ConditionKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for kind in ConditionKind::ALL {
            check_probability("conditions.weights", self.get(kind))?;
        }
        let sum = self.total();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

impl Default for ConditionWeights {
    fn default() -> Self {
        Self {
            out_of_stock_section: 0.2,
            out_of_stock_item: 0.4,
            no_firstname: 0.1,
            no_delivery: 0.1,
            no_delivery_time: 0.1,
            no_extra_wish: 0.1,
        }
    }
}

/// Condition spawn tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default)]
    pub weights: ConditionWeights,
    /// Governs both the spawn wait and the despawn wait, drawn independently.
    #[serde(default = "ConditionConfig::default_delay")]
    pub delay_seconds: DifficultyTable<Window>,
}

impl ConditionConfig {
    const fn default_delay() -> DifficultyTable<Window> {
        DifficultyTable::new(
            Window::new(120, 240),
            Window::new(60, 120),
            Window::new(30, 60),
        )
    }

    #[must_use]
    pub const fn delay_for(&self, difficulty: Difficulty) -> Window {
        *self.delay_seconds.get(difficulty)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        for (_, window) in self.delay_seconds.iter() {
            window.validate("conditions.delay_seconds")?;
        }
        Ok(())
    }
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            weights: ConditionWeights::default(),
            delay_seconds: Self::default_delay(),
        }
    }
}

/// Which ground-truth field the name check compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCheck {
    /// Compare submitted name against the expected name.
    #[default]
    Name,
    /// Compare addresses in the name slot, matching the legacy scorer.
    AddressQuirk,
}

/// Scoring and reward knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub name_check: NameCheck,
    /// Clamp the final score to `[0, 1]`; unclamped scores can go negative.
    #[serde(default)]
    pub clamp_score: bool,
    #[serde(default = "ScoringConfig::default_reward_scale")]
    pub reward_scale: f64,
    #[serde(default = "ScoringConfig::default_fast_window")]
    pub fast_bonus_seconds: u32,
    #[serde(default = "ScoringConfig::default_bonus")]
    pub fast_bonus: i64,
    #[serde(default = "ScoringConfig::default_bonus")]
    pub late_penalty: i64,
}

impl ScoringConfig {
    const fn default_reward_scale() -> f64 {
        10.0
    }

    const fn default_fast_window() -> u32 {
        60
    }

    const fn default_bonus() -> i64 {
        5
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reward_scale.is_finite() && self.reward_scale >= 0.0) {
            return Err(ConfigError::RangeViolation {
                field: "scoring.reward_scale",
                min: 0.0,
                max: f64::MAX,
                value: self.reward_scale,
            });
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            name_check: NameCheck::default(),
            clamp_score: false,
            reward_scale: Self::default_reward_scale(),
            fast_bonus_seconds: Self::default_fast_window(),
            fast_bonus: Self::default_bonus(),
            late_penalty: Self::default_bonus(),
        }
    }
}

/// Session pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "LifecycleConfig::default_active_orders")]
    pub active_orders: usize,
    /// Gap between consecutive start-up spawns after the first.
    #[serde(default = "LifecycleConfig::default_stagger")]
    pub initial_stagger_seconds: Window,
    #[serde(default = "LifecycleConfig::default_cooldown")]
    pub respawn_cooldown_seconds: Window,
    #[serde(default = "LifecycleConfig::default_retry_attempts")]
    pub announce_retry_attempts: u32,
    #[serde(default = "LifecycleConfig::default_retry_base")]
    pub announce_retry_base_seconds: u32,
    #[serde(default = "LifecycleConfig::default_id_attempts")]
    pub max_order_id_attempts: u32,
}

impl LifecycleConfig {
    const fn default_active_orders() -> usize {
        DEFAULT_ACTIVE_ORDERS
    }

    const fn default_stagger() -> Window {
        Window::new(5, 15)
    }

    const fn default_cooldown() -> Window {
        Window::new(10, 20)
    }

    const fn default_retry_attempts() -> u32 {
        5
    }

    const fn default_retry_base() -> u32 {
        2
    }

    const fn default_id_attempts() -> u32 {
        64
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.active_orders == 0 {
            return Err(ConfigError::Zero {
                field: "lifecycle.active_orders",
            });
        }
        if self.max_order_id_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "lifecycle.max_order_id_attempts",
            });
        }
        self.initial_stagger_seconds
            .validate("lifecycle.initial_stagger_seconds")?;
        self.respawn_cooldown_seconds
            .validate("lifecycle.respawn_cooldown_seconds")
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            active_orders: Self::default_active_orders(),
            initial_stagger_seconds: Self::default_stagger(),
            respawn_cooldown_seconds: Self::default_cooldown(),
            announce_retry_attempts: Self::default_retry_attempts(),
            announce_retry_base_seconds: Self::default_retry_base(),
            max_order_id_attempts: Self::default_id_attempts(),
        }
    }
}

/// Root configuration for a game engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub conditions: ConditionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub difficulty: DifficultyThresholds,
}

impl GameConfig {
    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or violates an invariant.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;
        self.conditions.validate()?;
        self.scoring.validate()?;
        self.lifecycle.validate()?;
        if self.difficulty.medium > self.difficulty.hard {
            return Err(ConfigError::ThresholdOrder {
                medium: self.difficulty.medium,
                hard: self.difficulty.hard,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn default_tables_match_tiers() {
        let generation = GenerationConfig::default();
        let hard = generation.initial_dish_probability.get(Difficulty::Hard);
        assert!((hard.get(MenuSection::Starters) - 1.0).abs() < f64::EPSILON);
        assert!((hard.get(MenuSection::MainCourses) - 1.0).abs() < f64::EPSILON);
        let easy = generation.customer_information_probability.get(Difficulty::Easy);
        assert!((easy.time - 0.4).abs() < f64::EPSILON);
        assert_eq!(*generation.noise_sentences.get(Difficulty::Hard), Window::new(1, 5));
        assert!((ConditionWeights::default().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            GameConfig::from_json(r#"{"scoring": {"clamp_score": true}, "difficulty": {"medium": 5}}"#)
                .unwrap();
        assert!(config.scoring.clamp_score);
        assert_eq!(config.scoring.fast_bonus, 5);
        assert_eq!(config.difficulty.medium, 5);
        assert_eq!(config.difficulty.hard, 20);
        assert_eq!(config.lifecycle.active_orders, 3);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = GameConfig::default();
        config.conditions.weights.no_delivery = 0.3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightSum { .. })
        ));
    }

    #[test]
    fn repeat_probability_of_one_is_rejected() {
        let mut config = GameConfig::default();
        config.generation.multiple_dish_probability.hard.drinks = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnboundedRepeat { .. })
        ));
    }

    #[test]
    fn inverted_windows_and_thresholds_fail() {
        let mut config = GameConfig::default();
        config.lifecycle.respawn_cooldown_seconds = Window::new(30, 10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowInverted { .. })
        ));

        let mut config = GameConfig::default();
        config.difficulty = DifficultyThresholds {
            medium: 25,
            hard: 20,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOrder {
                medium: 25,
                hard: 20
            })
        );
    }

    #[test]
    fn phrasing_bins_must_ascend() {
        let mut config = GameConfig::default();
        config.generation.delivery_phrasing.clock_12h = 0.2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PhrasingOrder { .. })
        ));
    }
}
