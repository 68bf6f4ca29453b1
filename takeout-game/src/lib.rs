//! Takeout Game Engine
//!
//! Platform-agnostic core of the Takeout restaurant-order game: procedural orders
//! wrapped in noisy customer messages, restaurant conditions that change what the
//! correct answer is, fuzzy scoring of player submissions, and the per-player
//! order lifecycle. Chat platforms plug in through [`Announcer`] and [`PlayerStore`].

pub mod conditions;
pub mod config;
pub mod constants;
pub mod data;
pub mod difficulty;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod notify;
pub mod numbers;
pub mod order;
pub mod rng;
#[cfg(feature = "async")]
pub mod runtime;
pub mod scoring;
pub mod session;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

// Re-export commonly used types
pub use conditions::{Condition, ConditionBoard, ConditionKind, RestaurantFlags, roll_condition};
pub use config::{
    ConditionConfig, ConditionWeights, ConfigError, CustomerInfoProbabilities, DeliveryPhrasing,
    GameConfig, GenerationConfig, LifecycleConfig, NameCheck, ScoringConfig,
    SectionProbabilities, Window,
};
pub use data::{
    ContentCorpus, EmbeddedContent, GameContent, Restaurant, RestaurantCatalog, StaticContent,
};
pub use difficulty::{Difficulty, DifficultyTable, DifficultyThresholds};
pub use error::GameError;
pub use generator::{CustomerFaker, GeneratedOrder, OrderGenerator, OrderRequest, VocabularyFaker};
pub use ledger::{MemoryPlayerStore, PlayerLedger, PlayerState, PlayerStore, PurchaseError};
pub use notify::{
    AnnounceContext, AnnounceError, AnnouncementKind, Announcer, LogAnnouncer, MessageHandle,
    RecordingAnnouncer,
};
pub use order::{CustomerInformation, MenuSection, Order};
pub use rng::SessionRngs;
#[cfg(feature = "async")]
pub use runtime::{RuntimeError, SessionHandle, SessionRegistry, spawn_session};
pub use scoring::{PatternSimilarity, ScoreBreakdown, ScoringEngine, SentenceSimilarity, Similarity};
pub use session::{ActiveOrder, GameSession, ScoreReport, SessionState, SubmissionOutcome};

/// Source of the restaurant catalog and text corpus.
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the restaurant catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or parsed.
    fn load_catalog(&self) -> Result<RestaurantCatalog, Self::Error>;

    /// Load the text corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the corpus cannot be read or parsed.
    fn load_corpus(&self) -> Result<ContentCorpus, Self::Error>;
}

/// Entry point owning the shared content, configuration, and player store.
#[derive(Debug)]
pub struct GameEngine<S>
where
    S: PlayerStore,
{
    content: Arc<GameContent>,
    config: GameConfig,
    store: S,
}

impl<S> GameEngine<S>
where
    S: PlayerStore,
{
    /// Load content once and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded, the corpus has empty pools,
    /// or the configuration is out of range.
    pub fn new<L: ContentLoader>(
        loader: &L,
        store: S,
        config: GameConfig,
    ) -> anyhow::Result<Self> {
        let content = GameContent::load(loader)?;
        content.corpus.validate()?;
        config.validate()?;
        Ok(Self {
            content: Arc::new(content),
            config,
            store,
        })
    }

    /// Engine over the bundled content and default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled assets fail to parse.
    pub fn embedded(store: S) -> anyhow::Result<Self> {
        Self::new(&EmbeddedContent, store, GameConfig::default())
    }

    #[must_use]
    pub fn content(&self) -> &Arc<GameContent> {
        &self.content
    }

    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn ledger(&self) -> PlayerLedger<'_, S> {
        PlayerLedger::new(&self.store, &self.content.catalog)
    }

    /// A new idle session for `player_id` sharing this engine's store.
    #[must_use]
    pub fn create_session<A: Announcer>(
        &self,
        player_id: &str,
        announcer: A,
        seed: u64,
    ) -> GameSession<S, A>
    where
        S: Clone,
    {
        GameSession::new(
            player_id,
            Arc::clone(&self.content),
            self.config.clone(),
            self.store.clone(),
            announcer,
            seed,
        )
    }

    /// Generate a single order outside any session.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] if the restaurant is not in the catalog.
    pub fn generate_order(
        &self,
        restaurant: &str,
        difficulty: Difficulty,
        now: DateTime<Utc>,
        seed: u64,
    ) -> Result<GeneratedOrder, GameError> {
        let generator =
            OrderGenerator::new(Arc::clone(&self.content), self.config.generation.clone());
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        generator.generate(&OrderRequest::new(restaurant, difficulty, now), &mut rng)
    }

    /// Current state of a player, starter state if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn player_state(&self, player_id: &str) -> Result<PlayerState, GameError> {
        self.ledger().state(player_id)
    }

    /// Stored state of a player, without defaulting.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load_player_state(&self, player_id: &str) -> anyhow::Result<Option<PlayerState>> {
        Ok(self.store.load_player(player_id)?)
    }

    /// # Errors
    ///
    /// See [`PlayerLedger::buy_restaurant`].
    pub fn buy_restaurant(
        &self,
        player_id: &str,
        restaurant: &str,
    ) -> Result<PlayerState, PurchaseError> {
        self.ledger().buy_restaurant(player_id, restaurant)
    }
}
