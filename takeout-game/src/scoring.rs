//! Fuzzy comparison of a submitted order against the adjusted ground truth.

use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::config::{NameCheck, ScoringConfig};
use crate::constants::{CUSTOMER_INFO_FIELDS, RESTAURANT_CHECKS};
use crate::numbers::{clamp_unit, round_f64_to_i64, usize_to_f64};
use crate::order::{CustomerInformation, Order};

/// String similarity in `[0, 1]`; identical inputs score `1.0`.
pub trait Similarity: Send + Sync {
    fn similarity(&self, left: &str, right: &str) -> f64;
}

/// Gestalt pattern matching (Ratcliff/Obershelp): `2 * matched / total` over characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSimilarity;

/// Longest common block as `(start_left, start_right, len)`, earliest on ties.
fn longest_block(left: &[char], right: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0_usize; right.len() + 1];
    for (i, l) in left.iter().enumerate() {
        let mut current = vec![0_usize; right.len() + 1];
        for (j, r) in right.iter().enumerate() {
            if l == r {
                let run = previous[j] + 1;
                current[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        previous = current;
    }
    best
}

fn matching_characters(left: &[char], right: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(left, right)];
    while let Some((l, r)) = pending.pop() {
        if l.is_empty() || r.is_empty() {
            continue;
        }
        let (i, j, len) = longest_block(l, r);
        if len == 0 {
            continue;
        }
        matched += len;
        pending.push((&l[..i], &r[..j]));
        pending.push((&l[i + len..], &r[j + len..]));
    }
    matched
}

impl Similarity for PatternSimilarity {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        if left == right {
            return 1.0;
        }
        let left: Vec<char> = left.chars().collect();
        let right: Vec<char> = right.chars().collect();
        let total = left.len() + right.len();
        if total == 0 {
            return 1.0;
        }
        usize_to_f64(2 * matching_characters(&left, &right)) / usize_to_f64(total)
    }
}

/// Blend of word overlap (Dice) and character pattern similarity.
///
/// Case-sensitive, so only identical strings reach `1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSimilarity;

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

impl Similarity for SentenceSimilarity {
    fn similarity(&self, left: &str, right: &str) -> f64 {
        if left == right {
            return 1.0;
        }
        let (left_words, right_words) = (words(left), words(right));
        let total = left_words.len() + right_words.len();
        let overlap = if total == 0 {
            1.0
        } else {
            let shared = left_words.intersection(&right_words).count();
            usize_to_f64(2 * shared) / usize_to_f64(total)
        };
        let pattern = PatternSimilarity.similarity(left, right);
        0.5 * overlap + 0.5 * pattern
    }
}

/// Size of the multiset symmetric difference between two item lists.
#[must_use]
pub fn count_differences<'a>(
    left: impl IntoIterator<Item = &'a str>,
    right: impl IntoIterator<Item = &'a str>,
) -> usize {
    let mut balance: HashMap<&str, i64> = HashMap::new();
    for item in left {
        *balance.entry(item).or_default() += 1;
    }
    for item in right {
        *balance.entry(item).or_default() -= 1;
    }
    balance
        .values()
        .map(|delta| usize::try_from(delta.unsigned_abs()).unwrap_or(usize::MAX))
        .sum()
}

/// Every deduction that went into a score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weight of one check.
    pub unit: f64,
    pub restaurant: f64,
    pub name: f64,
    pub address: f64,
    pub delivery_time: f64,
    pub extra_wish: f64,
    pub items: f64,
    pub item_differences: usize,
    pub score: f64,
}

impl ScoreBreakdown {
    /// Sum of all deductions.
    #[must_use]
    pub fn total_deduction(&self) -> f64 {
        self.restaurant
            + self.name
            + self.address
            + self.delivery_time
            + self.extra_wish
            + self.items
    }
}

/// Compares submissions against ground truth.
pub struct ScoringEngine {
    pattern: Box<dyn Similarity>,
    sentence: Box<dyn Similarity>,
    config: ScoringConfig,
}

impl std::fmt::Debug for ScoringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl ScoringEngine {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            pattern: Box::new(PatternSimilarity),
            sentence: Box::new(SentenceSimilarity),
            config,
        }
    }

    /// Replace the sentence comparator used for delivery time and extra wish.
    #[must_use]
    pub fn with_sentence_similarity(mut self, similarity: impl Similarity + 'static) -> Self {
        self.sentence = Box::new(similarity);
        self
    }

    /// Replace the pattern comparator used for name and address.
    #[must_use]
    pub fn with_pattern_similarity(mut self, similarity: impl Similarity + 'static) -> Self {
        self.pattern = Box::new(similarity);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score in `(-inf, 1]`; `1.0` iff the submission matches `expected` exactly.
    #[must_use]
    pub fn score(&self, submitted: &Order, expected: &Order) -> f64 {
        self.score_breakdown(submitted, expected).score
    }

    #[must_use]
    pub fn score_breakdown(&self, submitted: &Order, expected: &Order) -> ScoreBreakdown {
        let empty = CustomerInformation::default();
        let truth = expected.customer_information.as_ref().unwrap_or(&empty);
        let given = submitted.customer_information.as_ref().unwrap_or(&empty);

        let checks = expected.foods.len() + CUSTOMER_INFO_FIELDS + RESTAURANT_CHECKS;
        let unit = 1.0 / usize_to_f64(checks);
        let miss = |similarity: f64| unit * (1.0 - similarity);

        let restaurant = if expected.restaurant_name == submitted.restaurant_name {
            0.0
        } else {
            unit
        };
        let name = match self.config.name_check {
            NameCheck::Name => miss(self.pattern.similarity(&truth.name, &given.name)),
            NameCheck::AddressQuirk => {
                miss(self.pattern.similarity(&truth.address, &given.address))
            }
        };
        let address = miss(self.pattern.similarity(&truth.address, &given.address));
        let delivery_time = miss(
            self.sentence
                .similarity(&truth.delivery_time, &given.delivery_time),
        );
        let extra_wish = miss(self.sentence.similarity(&truth.extra_wish, &given.extra_wish));
        let item_differences = count_differences(expected.all_items(), submitted.all_items());
        let items = unit * usize_to_f64(item_differences);

        let mut breakdown = ScoreBreakdown {
            unit,
            restaurant,
            name,
            address,
            delivery_time,
            extra_wish,
            items,
            item_differences,
            score: 1.0,
        };
        breakdown.score = 1.0 - breakdown.total_deduction();
        if self.config.clamp_score {
            breakdown.score = clamp_unit(breakdown.score);
        }
        debug!(
            "scored {:?}: {:.3} ({} item differences)",
            expected.order_id(),
            breakdown.score,
            item_differences
        );
        breakdown
    }

    /// Coins earned for a submission made at `completed_at`.
    #[must_use]
    pub fn reward(&self, score: f64, expected: &Order, completed_at: DateTime<Utc>) -> i64 {
        base_reward(score, self.config.reward_scale)
            + time_adjustment(expected, completed_at, &self.config)
    }
}

/// `round(score * scale)`.
#[must_use]
pub fn base_reward(score: f64, scale: f64) -> i64 {
    round_f64_to_i64(score * scale)
}

/// Fast bonus or late penalty based on when the order was completed.
#[must_use]
pub fn time_adjustment(order: &Order, completed_at: DateTime<Utc>, config: &ScoringConfig) -> i64 {
    let elapsed = completed_at - order.order_timestamp;
    if elapsed < TimeDelta::seconds(i64::from(config.fast_bonus_seconds)) {
        config.fast_bonus
    } else if completed_at >= order.penalty_timestamp() {
        -config.late_penalty
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::MenuSection;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn truth() -> Order {
        let mut order = Order::for_restaurant("Pizzaria", ts())
            .with_customer_information(
                CustomerInformation::new("ab12", "Ada Lovelace", "12 Elm Street")
                    .with_delivery_time("7 o'clock"),
            )
            .with_item(MenuSection::Starters, "Garlic Knots")
            .with_item(MenuSection::MainCourses, "Veggie Pizza");
        order.fill_sections();
        order
    }

    #[test]
    fn pattern_similarity_matches_gestalt_ratio() {
        let similarity = PatternSimilarity;
        assert!((similarity.similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert!((similarity.similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity.similarity("abc", "").abs() < f64::EPSILON);
        assert!(similarity.similarity("abc", "xyz").abs() < f64::EPSILON);
        // "WIKIMEDIA" vs "WIKIMANIA": WIKIM + IA = 7 of 18.
        let ratio = similarity.similarity("WIKIMEDIA", "WIKIMANIA");
        assert!((ratio - 14.0 / 18.0).abs() < 1e-9, "{ratio}");
    }

    #[test]
    fn sentence_similarity_is_case_sensitive() {
        let similarity = SentenceSimilarity;
        assert!((similarity.similarity("Knock loudly.", "Knock loudly.") - 1.0).abs() < f64::EPSILON);
        let recased = similarity.similarity("Knock loudly.", "knock loudly.");
        assert!(recased < 1.0 && recased > 0.5, "{recased}");
        assert!(similarity.similarity("Knock loudly.", "Leave at door") < 0.5);
    }

    #[test]
    fn recased_fields_lose_full_marks() {
        let engine = ScoringEngine::default();
        let mut expected = truth();
        if let Some(info) = expected.customer_information.as_mut() {
            info.delivery_time = "9 o'clock.".into();
            info.extra_wish = "Dont ring the bell.".into();
        }
        let mut submitted = expected.clone();
        if let Some(info) = submitted.customer_information.as_mut() {
            info.delivery_time = "9 O'CLOCK.".into();
            info.extra_wish = "DONT RING THE BELL.".into();
        }
        assert_ne!(submitted, expected);
        let breakdown = engine.score_breakdown(&submitted, &expected);
        assert!(breakdown.delivery_time > 0.0);
        assert!(breakdown.extra_wish > 0.0);
        assert!(breakdown.score < 1.0, "{}", breakdown.score);
        assert!((engine.score(&expected, &expected) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn differences_count_multiset_symmetric_difference() {
        assert_eq!(count_differences(["A", "A", "B"], ["A", "B"]), 1);
        assert_eq!(count_differences(["A"], ["B"]), 2);
        assert_eq!(count_differences(["A", "B"], ["B", "A"]), 0);
    }

    #[test]
    fn identical_submission_scores_one() {
        let engine = ScoringEngine::default();
        let breakdown = engine.score_breakdown(&truth(), &truth());
        assert!((breakdown.score - 1.0).abs() < f64::EPSILON);
        assert!((breakdown.unit - 1.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn wrong_restaurant_costs_one_unit() {
        let engine = ScoringEngine::default();
        let mut submitted = truth();
        submitted.restaurant_name = Some("Burger Barn".into());
        let breakdown = engine.score_breakdown(&submitted, &truth());
        assert!((breakdown.restaurant - breakdown.unit).abs() < f64::EPSILON);
        assert!((breakdown.score - (1.0 - breakdown.unit)).abs() < 1e-12);
    }

    #[test]
    fn score_decreases_with_item_differences() {
        let engine = ScoringEngine::default();
        let mut previous = engine.score(&truth(), &truth());
        let mut submitted = truth();
        for _ in 0..12 {
            submitted.add_item(MenuSection::Drinks, "Cola");
            let next = engine.score(&submitted, &truth());
            assert!(next < previous);
            previous = next;
        }
        assert!(previous < 0.0, "unclamped score goes negative");
    }

    #[test]
    fn clamp_keeps_score_in_unit_range() {
        let engine = ScoringEngine::new(ScoringConfig {
            clamp_score: true,
            ..ScoringConfig::default()
        });
        let submitted = Order::new(ts());
        let score = engine.score(&submitted, &truth());
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn address_quirk_ignores_the_name() {
        let mut submitted = truth();
        if let Some(info) = submitted.customer_information.as_mut() {
            info.name = "Somebody Else".into();
        }
        let fixed = ScoringEngine::default().score_breakdown(&submitted, &truth());
        assert!(fixed.name > 0.0);
        let quirk = ScoringEngine::new(ScoringConfig {
            name_check: NameCheck::AddressQuirk,
            ..ScoringConfig::default()
        })
        .score_breakdown(&submitted, &truth());
        assert!(quirk.name.abs() < f64::EPSILON);
    }

    #[test]
    fn reward_applies_time_adjustments() {
        let engine = ScoringEngine::default();
        let order = truth().with_penalty_seconds(300);
        assert_eq!(engine.reward(1.0, &order, ts() + TimeDelta::seconds(59)), 15);
        assert_eq!(engine.reward(1.0, &order, ts() + TimeDelta::seconds(60)), 10);
        assert_eq!(engine.reward(1.0, &order, ts() + TimeDelta::seconds(299)), 10);
        assert_eq!(engine.reward(1.0, &order, ts() + TimeDelta::seconds(300)), 5);
        assert_eq!(engine.reward(0.54, &order, ts() + TimeDelta::seconds(120)), 5);
    }
}
