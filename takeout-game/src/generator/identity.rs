use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::constants::{AVATAR_BASE_URL, ORDER_ID_CHARS, ORDER_ID_LEN};
use crate::data::NameVocabulary;

/// Source of customer names and street addresses.
pub trait CustomerFaker: Send + Sync {
    /// Full name, first and last separated by a space.
    fn name(&self, rng: &mut dyn RngCore) -> String;

    /// Street address in `<number> <street>` form.
    fn street_address(&self, rng: &mut dyn RngCore) -> String;
}

/// Faker drawing from the corpus name vocabulary.
#[derive(Debug, Clone, Default)]
pub struct VocabularyFaker {
    vocabulary: NameVocabulary,
}

impl VocabularyFaker {
    #[must_use]
    pub const fn new(vocabulary: NameVocabulary) -> Self {
        Self { vocabulary }
    }
}

fn pick_or<'a>(pool: &'a [String], rng: &mut dyn RngCore, fallback: &'a str) -> &'a str {
    pool.choose(rng).map_or(fallback, String::as_str)
}

impl CustomerFaker for VocabularyFaker {
    fn name(&self, rng: &mut dyn RngCore) -> String {
        let first = pick_or(&self.vocabulary.first, rng, "Alex");
        let last = pick_or(&self.vocabulary.last, rng, "Doe");
        format!("{first} {last}")
    }

    fn street_address(&self, rng: &mut dyn RngCore) -> String {
        let number = rng.gen_range(1..=9999_u32);
        let street = pick_or(&self.vocabulary.streets, rng, "Main");
        let suffix = pick_or(&self.vocabulary.street_suffixes, rng, "Street");
        format!("{number} {street} {suffix}")
    }
}

/// Four distinct characters from `[a-z0-9]`.
pub fn order_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    ORDER_ID_CHARS
        .choose_multiple(rng, ORDER_ID_LEN)
        .map(|byte| char::from(*byte))
        .collect()
}

/// Randomized avatar image for the customer posting an order.
pub fn avatar_url<R: Rng + ?Sized>(rng: &mut R) -> String {
    let seed = rng.gen_range(0..u32::MAX);
    let flip = rng.gen_bool(0.5);
    let background = rng.gen_range(0..0x00FF_FFFF_u32);
    format!("{AVATAR_BASE_URL}?seed={seed}&flip={flip}&backgroundColor={background:06x}")
}
