//! Reference data: the restaurant catalog and the text corpus used to dress up orders.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;

use crate::ContentLoader;
use crate::error::GameError;
use crate::order::MenuSection;

const EMBEDDED_RESTAURANTS: &str = include_str!("../assets/restaurants.json");
const EMBEDDED_CORPUS: &str = include_str!("../assets/corpus.json");

/// A restaurant a player can own and receive orders for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    /// Purchase cost.
    #[serde(default)]
    pub coins: i64,
    /// Relative weight when picking which owned restaurant receives the next order.
    #[serde(default = "Restaurant::default_order_amount")]
    pub order_amount: u32,
    #[serde(default)]
    pub menu: BTreeMap<MenuSection, Vec<String>>,
}

impl Restaurant {
    const fn default_order_amount() -> u32 {
        1
    }

    #[must_use]
    pub fn items(&self, section: MenuSection) -> &[String] {
        self.menu.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sections that have at least one item on the menu.
    pub fn stocked_sections(&self) -> impl Iterator<Item = MenuSection> + '_ {
        MenuSection::ALL
            .into_iter()
            .filter(|section| !self.items(*section).is_empty())
    }

    #[must_use]
    pub fn serves(&self, section: MenuSection, item: &str) -> bool {
        self.items(section).iter().any(|candidate| candidate == item)
    }
}

/// Ordered restaurant list; the first entry is every player's starter restaurant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestaurantCatalog {
    restaurants: Vec<Restaurant>,
}

impl RestaurantCatalog {
    #[must_use]
    pub const fn new(restaurants: Vec<Restaurant>) -> Self {
        Self { restaurants }
    }

    /// Parse a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a list of restaurants.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset fails to parse.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::from_json(EMBEDDED_RESTAURANTS)
    }

    /// Look up a restaurant by name.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] when no restaurant has that name.
    pub fn get(&self, name: &str) -> Result<&Restaurant, GameError> {
        self.find(name)
            .ok_or_else(|| GameError::restaurant_not_found(name))
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn starter(&self) -> Option<&Restaurant> {
        self.restaurants.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Restaurant> {
        self.restaurants.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.restaurants.iter().map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }
}

/// Sentence templates that embed a piece of the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddableTemplates {
    pub restaurants: Vec<String>,
    pub times: Vec<String>,
    pub addresses: Vec<String>,
    pub foods: BTreeMap<MenuSection, Vec<String>>,
}

impl EmbeddableTemplates {
    #[must_use]
    pub fn for_section(&self, section: MenuSection) -> &[String] {
        self.foods.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Intro or outro phrases, split by whether they mention the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingPool {
    pub with_name: Vec<String>,
    pub without_name: Vec<String>,
}

impl GreetingPool {
    #[must_use]
    pub fn pool(&self, with_name: bool) -> &[String] {
        if with_name {
            &self.with_name
        } else {
            &self.without_name
        }
    }
}

/// A short extra wish and the longer phrasing shown in descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraWish {
    pub wish: String,
    pub addition: String,
}

/// Vocabulary for the built-in customer faker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameVocabulary {
    pub first: Vec<String>,
    pub last: Vec<String>,
    pub streets: Vec<String>,
    pub street_suffixes: Vec<String>,
}

/// Everything the generator needs to write an order description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCorpus {
    pub noise: Vec<String>,
    pub relevant_noise: Vec<String>,
    pub templates: EmbeddableTemplates,
    pub intros: GreetingPool,
    pub outros: GreetingPool,
    pub extra_wishes: Vec<ExtraWish>,
    #[serde(default)]
    pub names: NameVocabulary,
}

impl ContentCorpus {
    /// Parse a corpus from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the corpus layout.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Corpus bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled asset fails to parse.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::from_json(EMBEDDED_CORPUS)
    }

    /// Longer phrasing for a wish, falling back to the wish itself.
    #[must_use]
    pub fn wish_addition<'a>(&'a self, wish: &'a str) -> &'a str {
        self.extra_wishes
            .iter()
            .find(|entry| entry.wish == wish)
            .map_or(wish, |entry| entry.addition.as_str())
    }

    /// Check that every pool the generator draws from has content.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvariantViolation`] naming the first empty pool.
    pub fn validate(&self) -> Result<(), GameError> {
        let pools: [(&str, usize); 9] = [
            ("noise", self.noise.len()),
            ("relevant_noise", self.relevant_noise.len()),
            ("templates.restaurants", self.templates.restaurants.len()),
            ("templates.times", self.templates.times.len()),
            ("templates.addresses", self.templates.addresses.len()),
            ("intros.with_name", self.intros.with_name.len()),
            ("intros.without_name", self.intros.without_name.len()),
            ("outros.with_name", self.outros.with_name.len()),
            ("outros.without_name", self.outros.without_name.len()),
        ];
        if let Some((pool, _)) = pools.iter().find(|(_, len)| *len == 0) {
            return Err(GameError::InvariantViolation(format!(
                "corpus pool {pool} is empty"
            )));
        }
        for section in MenuSection::ALL {
            if self.templates.for_section(section).is_empty() {
                return Err(GameError::InvariantViolation(format!(
                    "corpus has no templates for {section}"
                )));
            }
        }
        Ok(())
    }
}

/// Immutable content shared by every session for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameContent {
    pub catalog: RestaurantCatalog,
    pub corpus: ContentCorpus,
}

impl GameContent {
    /// Load catalog and corpus through a [`ContentLoader`].
    ///
    /// # Errors
    ///
    /// Returns the loader's error if either source cannot be loaded.
    pub fn load<L: ContentLoader>(loader: &L) -> Result<Self, L::Error> {
        Ok(Self {
            catalog: loader.load_catalog()?,
            corpus: loader.load_corpus()?,
        })
    }

    /// Content bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if a bundled asset fails to parse.
    pub fn embedded() -> Result<Self, serde_json::Error> {
        Self::load(&EmbeddedContent)
    }
}

/// Loader backed by the JSON assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedContent;

impl ContentLoader for EmbeddedContent {
    type Error = serde_json::Error;

    fn load_catalog(&self) -> Result<RestaurantCatalog, Self::Error> {
        RestaurantCatalog::embedded()
    }

    fn load_corpus(&self) -> Result<ContentCorpus, Self::Error> {
        ContentCorpus::embedded()
    }
}

/// Loader over values already in memory; handy for fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    pub catalog: RestaurantCatalog,
    pub corpus: ContentCorpus,
}

impl ContentLoader for StaticContent {
    type Error = Infallible;

    fn load_catalog(&self) -> Result<RestaurantCatalog, Self::Error> {
        Ok(self.catalog.clone())
    }

    fn load_corpus(&self) -> Result<ContentCorpus, Self::Error> {
        Ok(self.corpus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_starts_with_pizzaria() {
        let catalog = RestaurantCatalog::embedded().unwrap();
        let starter = catalog.starter().expect("starter restaurant");
        assert_eq!(starter.name, "Pizzaria");
        assert_eq!(starter.coins, 0);
        assert!(starter.serves(MenuSection::Starters, "Garlic Knots"));
        assert!(starter.serves(MenuSection::MainCourses, "Veggie Pizza"));
        assert_eq!(catalog.len(), 6);
    }

    #[test]
    fn every_embedded_restaurant_stocks_every_section() {
        let catalog = RestaurantCatalog::embedded().unwrap();
        for restaurant in catalog.iter() {
            assert_eq!(
                restaurant.stocked_sections().count(),
                4,
                "{} is missing a section",
                restaurant.name
            );
            assert!(restaurant.order_amount > 0);
        }
    }

    #[test]
    fn unknown_restaurant_is_not_found() {
        let catalog = RestaurantCatalog::embedded().unwrap();
        let err = catalog.get("Nowhere Diner").unwrap_err();
        assert!(matches!(err, GameError::NotFound { kind: "restaurant", .. }));
    }

    #[test]
    fn embedded_corpus_is_complete() {
        let corpus = ContentCorpus::embedded().unwrap();
        corpus.validate().unwrap();
        assert_eq!(
            corpus.wish_addition("Dont ring the bell."),
            "Please don't ring the bell, the baby is sleeping."
        );
        assert_eq!(corpus.wish_addition("Sing a song."), "Sing a song.");
    }

    #[test]
    fn validate_names_the_empty_pool() {
        let mut corpus = ContentCorpus::embedded().unwrap();
        corpus.outros.without_name.clear();
        let err = corpus.validate().unwrap_err();
        assert!(err.to_string().contains("outros.without_name"));
    }

    #[test]
    fn static_content_loads_fixtures() {
        let loader = StaticContent {
            catalog: RestaurantCatalog::new(vec![Restaurant {
                name: "Test Kitchen".into(),
                icon: String::new(),
                description: String::new(),
                coins: 0,
                order_amount: 1,
                menu: BTreeMap::new(),
            }]),
            corpus: ContentCorpus::default(),
        };
        let content = GameContent::load(&loader).unwrap();
        assert_eq!(content.catalog.starter().unwrap().name, "Test Kitchen");
    }
}
