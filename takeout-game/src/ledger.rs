//! Persistent player progress: coins, owned restaurants, completed orders.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::data::RestaurantCatalog;
use crate::difficulty::{Difficulty, DifficultyThresholds};
use crate::error::GameError;

/// What the game remembers about a player between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub restaurants: Vec<String>,
    /// Completed orders per restaurant.
    #[serde(default)]
    pub completed_orders: BTreeMap<String, u32>,
}

impl PlayerState {
    /// A new player: no coins, owning only the catalog's starter restaurant.
    #[must_use]
    pub fn starter(catalog: &RestaurantCatalog) -> Self {
        Self {
            coins: 0,
            restaurants: catalog
                .starter()
                .map(|restaurant| vec![restaurant.name.clone()])
                .unwrap_or_default(),
            completed_orders: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn owns(&self, restaurant: &str) -> bool {
        self.restaurants.iter().any(|owned| owned == restaurant)
    }

    #[must_use]
    pub fn completed_for(&self, restaurant: &str) -> u32 {
        self.completed_orders.get(restaurant).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn difficulty_for(
        &self,
        restaurant: &str,
        thresholds: &DifficultyThresholds,
    ) -> Difficulty {
        thresholds.difficulty_for(self.completed_for(restaurant))
    }
}

/// Keyed persistence for [`PlayerState`].
pub trait PlayerStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a player's state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_player(&self, player_id: &str) -> Result<Option<PlayerState>, Self::Error>;

    /// Overwrite a player's state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn save_player(&self, player_id: &str, state: &PlayerState) -> Result<(), Self::Error>;

    /// Atomically read-modify-write a player's state, inserting `fresh` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or written.
    fn update_player<F, T>(
        &self,
        player_id: &str,
        fresh: PlayerState,
        apply: F,
    ) -> Result<T, Self::Error>
    where
        F: FnOnce(&mut PlayerState) -> T;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("player store lock poisoned")]
    Poisoned,
}

/// In-process store; clones share the same players.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlayerStore {
    players: Arc<Mutex<HashMap<String, PlayerState>>>,
}

impl MemoryPlayerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerStore for MemoryPlayerStore {
    type Error = StoreError;

    fn load_player(&self, player_id: &str) -> Result<Option<PlayerState>, Self::Error> {
        let players = self.players.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(players.get(player_id).cloned())
    }

    fn save_player(&self, player_id: &str, state: &PlayerState) -> Result<(), Self::Error> {
        let mut players = self.players.lock().map_err(|_| StoreError::Poisoned)?;
        players.insert(player_id.to_string(), state.clone());
        Ok(())
    }

    fn update_player<F, T>(
        &self,
        player_id: &str,
        fresh: PlayerState,
        apply: F,
    ) -> Result<T, Self::Error>
    where
        F: FnOnce(&mut PlayerState) -> T,
    {
        let mut players = self.players.lock().map_err(|_| StoreError::Poisoned)?;
        let state = players.entry(player_id.to_string()).or_insert(fresh);
        Ok(apply(state))
    }
}

/// Reasons a restaurant purchase is refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("you already own {restaurant}")]
    AlreadyOwned { restaurant: String },
    #[error("{restaurant} costs {cost} coins but you only have {coins}")]
    InsufficientCoins {
        restaurant: String,
        cost: i64,
        coins: i64,
    },
    #[error("restaurant named {restaurant:?} doesn't exist")]
    NotFound { restaurant: String },
    #[error(transparent)]
    Store(#[from] GameError),
}

/// Player operations over a store, resolving restaurants against the catalog.
#[derive(Debug)]
pub struct PlayerLedger<'a, S> {
    store: &'a S,
    catalog: &'a RestaurantCatalog,
}

impl<'a, S: PlayerStore> PlayerLedger<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, catalog: &'a RestaurantCatalog) -> Self {
        Self { store, catalog }
    }

    fn update<F, T>(&self, player_id: &str, apply: F) -> Result<T, GameError>
    where
        F: FnOnce(&mut PlayerState) -> T,
    {
        self.store
            .update_player(player_id, PlayerState::starter(self.catalog), apply)
            .map_err(|err| GameError::player_store(&err))
    }

    /// Current state, or the starter state for unknown players.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn state(&self, player_id: &str) -> Result<PlayerState, GameError> {
        let stored = self
            .store
            .load_player(player_id)
            .map_err(|err| GameError::player_store(&err))?;
        Ok(stored.unwrap_or_else(|| PlayerState::starter(self.catalog)))
    }

    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn coins(&self, player_id: &str) -> Result<i64, GameError> {
        Ok(self.state(player_id)?.coins)
    }

    /// Add (or with a negative amount, remove) coins; returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn add_coins(&self, player_id: &str, amount: i64) -> Result<i64, GameError> {
        self.update(player_id, |state| {
            state.coins = state.coins.saturating_add(amount);
            state.coins
        })
    }

    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn restaurants(&self, player_id: &str) -> Result<Vec<String>, GameError> {
        Ok(self.state(player_id)?.restaurants)
    }

    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn has_restaurant(&self, player_id: &str, restaurant: &str) -> Result<bool, GameError> {
        Ok(self.state(player_id)?.owns(restaurant))
    }

    /// Count one completed order; returns the new count for that restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn record_completed(&self, player_id: &str, restaurant: &str) -> Result<u32, GameError> {
        self.update(player_id, |state| {
            let count = state
                .completed_orders
                .entry(restaurant.to_string())
                .or_insert(0);
            *count = count.saturating_add(1);
            *count
        })
    }

    /// Pay a reward and count the completed order in one store write; returns the
    /// new balance.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails; nothing is written then.
    pub fn settle_order(
        &self,
        player_id: &str,
        restaurant: &str,
        reward: i64,
    ) -> Result<i64, GameError> {
        self.update(player_id, |state| {
            state.coins = state.coins.saturating_add(reward);
            let count = state
                .completed_orders
                .entry(restaurant.to_string())
                .or_insert(0);
            *count = count.saturating_add(1);
            state.coins
        })
    }

    /// # Errors
    ///
    /// Returns [`GameError::ExternalService`] if the store fails.
    pub fn difficulty_for(
        &self,
        player_id: &str,
        restaurant: &str,
        thresholds: &DifficultyThresholds,
    ) -> Result<Difficulty, GameError> {
        Ok(self.state(player_id)?.difficulty_for(restaurant, thresholds))
    }

    /// Spend coins on a restaurant; returns the updated state.
    ///
    /// # Errors
    ///
    /// Returns a [`PurchaseError`] if the restaurant is unknown, already owned, or
    /// unaffordable, or if the store fails.
    pub fn buy_restaurant(
        &self,
        player_id: &str,
        restaurant: &str,
    ) -> Result<PlayerState, PurchaseError> {
        let Some(listing) = self.catalog.find(restaurant) else {
            return Err(PurchaseError::NotFound {
                restaurant: restaurant.to_string(),
            });
        };
        let cost = listing.coins;
        let outcome = self.update(player_id, |state| {
            if state.owns(restaurant) {
                return Err(PurchaseError::AlreadyOwned {
                    restaurant: restaurant.to_string(),
                });
            }
            if state.coins < cost {
                return Err(PurchaseError::InsufficientCoins {
                    restaurant: restaurant.to_string(),
                    cost,
                    coins: state.coins,
                });
            }
            state.coins -= cost;
            state.restaurants.push(restaurant.to_string());
            Ok(state.clone())
        })?;
        if outcome.is_ok() {
            info!("player {player_id} bought {restaurant} for {cost} coins");
        }
        outcome
    }
}
