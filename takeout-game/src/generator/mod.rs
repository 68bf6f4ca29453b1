//! Procedural ground-truth orders and their noisy descriptions.

pub mod delivery_time;
pub mod description;
pub mod identity;

use chrono::{DateTime, Utc};
use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::data::{GameContent, Restaurant};
use crate::difficulty::Difficulty;
use crate::error::GameError;
use crate::order::{CustomerInformation, MenuSection, Order};

pub use delivery_time::{Phrasing, delivery_time, render};
pub use description::{DescriptionInput, describe, item_list};
pub use identity::{CustomerFaker, VocabularyFaker, avatar_url, order_id};

/// What to generate.
#[derive(Debug, Clone, Copy)]
pub struct OrderRequest<'a> {
    pub restaurant: &'a str,
    pub difficulty: Difficulty,
    pub now: DateTime<Utc>,
}

impl<'a> OrderRequest<'a> {
    #[must_use]
    pub const fn new(restaurant: &'a str, difficulty: Difficulty, now: DateTime<Utc>) -> Self {
        Self {
            restaurant,
            difficulty,
            now,
        }
    }
}

/// A ground truth together with the text a player reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedOrder {
    pub order: Order,
    pub description: String,
    pub avatar_url: String,
}

impl GeneratedOrder {
    /// The customer information every generated order carries.
    #[must_use]
    pub fn customer(&self) -> Option<&CustomerInformation> {
        self.order.customer_information.as_ref()
    }
}

/// Generates orders against shared content.
pub struct OrderGenerator {
    content: Arc<GameContent>,
    config: GenerationConfig,
    faker: Box<dyn CustomerFaker>,
}

impl std::fmt::Debug for OrderGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OrderGenerator {
    /// Generator using the corpus name vocabulary for customers.
    #[must_use]
    pub fn new(content: Arc<GameContent>, config: GenerationConfig) -> Self {
        let faker = VocabularyFaker::new(content.corpus.names.clone());
        Self {
            content,
            config,
            faker: Box::new(faker),
        }
    }

    #[must_use]
    pub fn with_faker(mut self, faker: impl CustomerFaker + 'static) -> Self {
        self.faker = Box::new(faker);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &GenerationConfig {
        &self.config
    }

    #[must_use]
    pub fn content(&self) -> &GameContent {
        &self.content
    }

    /// Generate a ground-truth order and its description.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the restaurant is not in the catalog.
    pub fn generate<R: RngCore>(
        &self,
        request: &OrderRequest<'_>,
        rng: &mut R,
    ) -> Result<GeneratedOrder, GameError> {
        let restaurant = self.content.catalog.get(request.restaurant)?;
        let difficulty = request.difficulty;
        let info_odds = self.config.customer_information_probability.get(difficulty);

        let has_delivery_time = rng.gen_range(0.0..1.0) < info_odds.time;
        let has_extra_wish = rng.gen_range(0.0..1.0) < info_odds.extra_wish;

        let mut customer = CustomerInformation::new(
            order_id(rng),
            self.faker.name(rng),
            self.faker.street_address(rng),
        );
        if has_delivery_time {
            customer.delivery_time = delivery_time(
                request.now,
                self.config.delivery_offset_minutes,
                &self.config.delivery_phrasing,
                rng,
            );
        }
        if has_extra_wish
            && let Some(wish) = self.content.corpus.extra_wishes.choose(rng)
        {
            customer.extra_wish.clone_from(&wish.wish);
        }

        let penalty = self.config.penalty_seconds;
        let mut order = Order::for_restaurant(&restaurant.name, request.now)
            .with_penalty_seconds(rng.gen_range(penalty.min..=penalty.max));
        self.fill_menu(&mut order, restaurant, difficulty, rng);
        order.fill_sections();

        let description = describe(
            &DescriptionInput {
                restaurant: &restaurant.name,
                customer: &customer,
                order: &order,
                difficulty,
                noise: *self.config.noise_sentences.get(difficulty),
            },
            &self.content.corpus,
            rng,
        );
        order.set_customer_information(customer);

        debug!(
            "generated {} order {:?} for {} with {} items",
            difficulty,
            order.order_id(),
            restaurant.name,
            order.item_count()
        );

        Ok(GeneratedOrder {
            order,
            description,
            avatar_url: avatar_url(rng),
        })
    }

    fn fill_menu<R: RngCore>(
        &self,
        order: &mut Order,
        restaurant: &Restaurant,
        difficulty: Difficulty,
        rng: &mut R,
    ) {
        let initial = self.config.initial_dish_probability.get(difficulty);
        let multiple = self.config.multiple_dish_probability.get(difficulty);
        for section in MenuSection::ALL {
            if rng.gen_range(0.0..1.0) >= initial.get(section) {
                continue;
            }
            let menu = restaurant.items(section);
            loop {
                let Some(item) = menu.choose(rng) else {
                    break;
                };
                order.add_item(section, item.clone());
                if rng.gen_range(0.0..1.0) >= multiple.get(section) {
                    break;
                }
            }
        }
    }
}
