//! Per-player order lifecycle: spawning, announcing, scoring, respawning, and
//! the condition loop, all driven by one event queue.

pub mod schedule;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::conditions::{Condition, ConditionBoard, roll_condition};
use crate::config::{GameConfig, Window};
use crate::constants::CONDITION_ALERT_SENDER;
use crate::data::GameContent;
use crate::difficulty::Difficulty;
use crate::error::GameError;
use crate::generator::{GeneratedOrder, OrderGenerator, OrderRequest};
use crate::ledger::{PlayerLedger, PlayerStore};
use crate::notify::{AnnounceContext, Announcer, MessageHandle, retract_quietly};
use crate::numbers::millis_to_seconds;
use crate::order::Order;
use crate::rng::SessionRngs;
use crate::scoring::{ScoreBreakdown, ScoringEngine};

pub use schedule::{Scheduler, SessionEvent};

const MAX_BACKOFF_DOUBLINGS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// An order waiting for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveOrder {
    pub generated: GeneratedOrder,
    pub restaurant: String,
    pub difficulty: Difficulty,
    /// Set once the order has been announced.
    pub announcement: Option<MessageHandle>,
}

impl ActiveOrder {
    #[must_use]
    pub const fn order(&self) -> &Order {
        &self.generated.order
    }

    #[must_use]
    pub fn order_id(&self) -> &str {
        self.generated.order.order_id().unwrap_or_default()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.generated.description
    }
}

/// Result of a scored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub order_id: String,
    pub restaurant: String,
    pub difficulty: Difficulty,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub reward: i64,
    /// Coin balance after the reward was credited.
    pub coins: i64,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Scored(ScoreReport),
    /// The submission could not be matched to an order; nothing changed.
    Rejected { message: String },
}

/// One player's running game.
pub struct GameSession<S: PlayerStore, A: Announcer> {
    player_id: String,
    content: Arc<GameContent>,
    config: GameConfig,
    generator: OrderGenerator,
    scorer: ScoringEngine,
    board: ConditionBoard,
    rngs: SessionRngs,
    scheduler: Scheduler,
    active: BTreeMap<String, ActiveOrder>,
    store: S,
    announcer: A,
    state: SessionState,
}

impl<S: PlayerStore, A: Announcer> std::fmt::Debug for GameSession<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("player_id", &self.player_id)
            .field("state", &self.state)
            .field("active", &self.active.keys().collect::<Vec<_>>())
            .field("pending", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

impl<S: PlayerStore, A: Announcer> GameSession<S, A> {
    #[must_use]
    pub fn new(
        player_id: impl Into<String>,
        content: Arc<GameContent>,
        config: GameConfig,
        store: S,
        announcer: A,
        seed: u64,
    ) -> Self {
        let generator = OrderGenerator::new(Arc::clone(&content), config.generation.clone());
        let scorer = ScoringEngine::new(config.scoring.clone());
        Self {
            player_id: player_id.into(),
            content,
            config,
            generator,
            scorer,
            board: ConditionBoard::new(),
            rngs: SessionRngs::from_seed(seed),
            scheduler: Scheduler::new(),
            active: BTreeMap::new(),
            store,
            announcer,
            state: SessionState::Idle,
        }
    }

    /// Swap the generator, e.g. to plug in a different customer faker.
    #[must_use]
    pub fn with_generator(mut self, generator: OrderGenerator) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: ScoringEngine) -> Self {
        self.scorer = scorer;
        self
    }

    #[must_use]
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running)
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
    pub const fn announcer(&self) -> &A {
        &self.announcer
    }

    #[must_use]
    pub const fn condition_board(&self) -> &ConditionBoard {
        &self.board
    }

    #[must_use]
    pub const fn rngs(&self) -> &SessionRngs {
        &self.rngs
    }

    fn ledger(&self) -> PlayerLedger<'_, S> {
        PlayerLedger::new(&self.store, &self.content.catalog)
    }

    /// Open the restaurant: one order now, the rest staggered, and the condition loop.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvariantViolation`] if the session was stopped or the
    /// player owns no restaurants, and store errors as [`GameError::ExternalService`].
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), GameError> {
        match self.state {
            SessionState::Running => return Ok(()),
            SessionState::Stopped => {
                return Err(GameError::InvariantViolation(
                    "a stopped session cannot be restarted".into(),
                ));
            }
            SessionState::Idle => {}
        }
        if self.owned_restaurants()?.is_empty() {
            return Err(no_restaurants(&self.player_id));
        }
        self.state = SessionState::Running;
        info!("session for {} started", self.player_id);

        self.spawn_order(now)?;
        let mut at = now;
        for _ in 1..self.config.lifecycle.active_orders {
            at += self.draw_delay(self.config.lifecycle.initial_stagger_seconds);
            self.scheduler.schedule(at, SessionEvent::SpawnOrder);
        }
        self.plan_next_condition(now)
    }

    /// Process every event due at or before `now`, in time order. Returns how many ran.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised while handling an event.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<usize, GameError> {
        let mut processed = 0;
        while self.is_running() {
            let Some((due, event)) = self.scheduler.pop_due(now) else {
                break;
            };
            self.handle(due, event)?;
            processed += 1;
        }
        Ok(processed)
    }

    fn handle(&mut self, due: DateTime<Utc>, event: SessionEvent) -> Result<(), GameError> {
        match event {
            SessionEvent::SpawnOrder => self.spawn_order(due),
            SessionEvent::ApplyCondition { restaurant } => self.apply_condition(&restaurant, due),
            SessionEvent::ExpireCondition { condition, handle } => {
                self.expire_condition(&condition, handle);
                Ok(())
            }
            SessionEvent::RetryAnnounce { order_id, attempt } => {
                let pending = self
                    .active
                    .get(&order_id)
                    .is_some_and(|active| active.announcement.is_none());
                if pending {
                    self.announce_order(&order_id, due, attempt);
                }
                Ok(())
            }
        }
    }

    /// Restaurants the player owns that exist in the catalog.
    fn owned_restaurants(&self) -> Result<Vec<String>, GameError> {
        let owned = self.ledger().restaurants(&self.player_id)?;
        Ok(owned
            .into_iter()
            .filter(|name| self.content.catalog.find(name).is_some())
            .collect())
    }

    fn difficulty_for(&self, restaurant: &str) -> Result<Difficulty, GameError> {
        self.ledger()
            .difficulty_for(&self.player_id, restaurant, &self.config.difficulty)
    }

    fn draw_delay(&mut self, window: Window) -> TimeDelta {
        let seconds = self.rngs.timing().gen_range(window.min..=window.max);
        TimeDelta::seconds(i64::from(seconds))
    }

    fn pick_restaurant(&mut self, owned: &[String]) -> Option<String> {
        let weights = owned.iter().map(|name| {
            self.content
                .catalog
                .find(name)
                .map_or(0, |restaurant| restaurant.order_amount)
        });
        let rng = self.rngs.orders();
        match WeightedIndex::new(weights) {
            Ok(index) => owned.get(index.sample(rng)).cloned(),
            Err(_) => owned.choose(rng).cloned(),
        }
    }

    fn spawn_order(&mut self, now: DateTime<Utc>) -> Result<(), GameError> {
        let owned = self.owned_restaurants()?;
        let Some(restaurant) = self.pick_restaurant(&owned) else {
            return Err(no_restaurants(&self.player_id));
        };
        let difficulty = self.difficulty_for(&restaurant)?;
        let request = OrderRequest::new(&restaurant, difficulty, now);

        let mut fresh = None;
        for _ in 0..self.config.lifecycle.max_order_id_attempts.max(1) {
            let generated = self.generator.generate(&request, self.rngs.orders())?;
            let id = generated.order.order_id().unwrap_or_default();
            if !id.is_empty() && !self.active.contains_key(id) {
                fresh = Some(generated);
                break;
            }
        }
        let Some(generated) = fresh else {
            return Err(GameError::InvariantViolation(
                "could not allocate a unique order id".into(),
            ));
        };

        let order_id = generated.order.order_id().unwrap_or_default().to_string();
        debug!(
            "spawned {difficulty} order {order_id} at {restaurant} for {}",
            self.player_id
        );
        self.active.insert(
            order_id.clone(),
            ActiveOrder {
                generated,
                restaurant,
                difficulty,
                announcement: None,
            },
        );
        self.announce_order(&order_id, now, 1);
        Ok(())
    }

    /// Announce an order; failures schedule a retry and never drop the order.
    fn announce_order(&mut self, order_id: &str, now: DateTime<Utc>, attempt: u32) {
        let Some(active) = self.active.get_mut(order_id) else {
            return;
        };
        let sender = active
            .generated
            .customer()
            .map_or("Customer", |customer| customer.name.as_str());
        let context = AnnounceContext::order(
            sender,
            &active.generated.avatar_url,
            order_id,
            &active.restaurant,
        );
        match self
            .announcer
            .announce(&active.generated.description, &context)
        {
            Ok(handle) => active.announcement = Some(handle),
            Err(err) => {
                let retry = &self.config.lifecycle;
                // Backoff stops doubling after the configured attempts; retries continue.
                let doublings = attempt
                    .saturating_sub(1)
                    .min(retry.announce_retry_attempts.saturating_sub(1))
                    .min(MAX_BACKOFF_DOUBLINGS);
                let backoff = i64::from(retry.announce_retry_base_seconds.max(1)) << doublings;
                if attempt < retry.announce_retry_attempts {
                    warn!("announcing order {order_id} failed (attempt {attempt}): {err}");
                } else if attempt == retry.announce_retry_attempts {
                    warn!(
                        "announcing order {order_id} still failing after {attempt} attempts, \
                         retrying every {backoff}s: {err}"
                    );
                } else {
                    debug!("announcing order {order_id} failed (attempt {attempt}): {err}");
                }
                self.scheduler.schedule(
                    now + TimeDelta::seconds(backoff),
                    SessionEvent::RetryAnnounce {
                        order_id: order_id.to_string(),
                        attempt: attempt.saturating_add(1),
                    },
                );
            }
        }
    }

    /// Schedule the next condition for a random owned restaurant.
    fn plan_next_condition(&mut self, from: DateTime<Utc>) -> Result<(), GameError> {
        let owned = self.owned_restaurants()?;
        let Some(restaurant) = owned.choose(self.rngs.conditions()).cloned() else {
            warn!("no restaurants to put conditions on for {}", self.player_id);
            return Ok(());
        };
        let difficulty = self.difficulty_for(&restaurant)?;
        let delay = self.draw_delay(self.config.conditions.delay_for(difficulty));
        self.scheduler
            .schedule(from + delay, SessionEvent::ApplyCondition { restaurant });
        Ok(())
    }

    fn apply_condition(&mut self, restaurant: &str, now: DateTime<Utc>) -> Result<(), GameError> {
        let content = Arc::clone(&self.content);
        let rolled = content.catalog.find(restaurant).and_then(|listing| {
            roll_condition(listing, &self.config.conditions.weights, self.rngs.conditions())
        });
        if let Some(condition) = rolled {
            let message = self.board.apply(&condition);
            let difficulty = self.difficulty_for(restaurant)?;
            let lifetime = self.draw_delay(self.config.conditions.delay_for(difficulty));
            let expires_after = u32::try_from(lifetime.num_seconds()).unwrap_or(u32::MAX);
            let context =
                AnnounceContext::condition(CONDITION_ALERT_SENDER, restaurant, expires_after);
            let handle = match self.announcer.announce(&message, &context) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!("announcing condition for {restaurant} failed: {err}");
                    None
                }
            };
            self.scheduler.schedule(
                now + lifetime,
                SessionEvent::ExpireCondition { condition, handle },
            );
        } else {
            debug!("no condition could be rolled for {restaurant}");
        }
        self.plan_next_condition(now)
    }

    fn expire_condition(&mut self, condition: &Condition, handle: Option<MessageHandle>) {
        self.board.expire(condition);
        if let Some(handle) = handle {
            retract_quietly(&mut self.announcer, handle);
        }
        debug!("condition expired: {}", condition.message());
    }

    /// Look up an active order without changing anything.
    #[must_use]
    pub fn get_order_by_id(&self, order_id: &str) -> Option<&ActiveOrder> {
        self.active.get(order_id)
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &ActiveOrder> {
        self.active.values()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Ground truth for an order as the current conditions require it.
    #[must_use]
    pub fn expected_order(&self, order_id: &str) -> Option<Order> {
        self.active
            .get(order_id)
            .map(|active| self.board.adjust(active.order()))
    }

    /// Order spawns waiting in the queue.
    #[must_use]
    pub fn pending_spawns(&self) -> usize {
        self.scheduler
            .count(|event| matches!(event, SessionEvent::SpawnOrder))
    }

    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due()
    }

    /// Score a submission, pay the reward, and replace the order.
    ///
    /// # Errors
    ///
    /// Returns store failures as [`GameError::ExternalService`]. Unknown orders are a
    /// [`SubmissionOutcome::Rejected`], not an error.
    pub fn submit(
        &mut self,
        order_id: &str,
        submitted: &Order,
        now: DateTime<Utc>,
    ) -> Result<SubmissionOutcome, GameError> {
        if !self.is_running() {
            return Ok(SubmissionOutcome::Rejected {
                message: "The restaurant is closed.".into(),
            });
        }
        let Some(active) = self.active.get(order_id) else {
            return Ok(SubmissionOutcome::Rejected {
                message: format!("There is no order with the id `{order_id}`."),
            });
        };

        let expected = self.board.adjust(active.order());
        let breakdown = self.scorer.score_breakdown(submitted, &expected);
        let reward = self.scorer.reward(breakdown.score, &expected, now);
        let elapsed = now - expected.order_timestamp;
        let restaurant = active.restaurant.clone();
        let difficulty = active.difficulty;

        let coins = self
            .ledger()
            .settle_order(&self.player_id, &restaurant, reward)?;
        info!(
            "{} completed {order_id} at {restaurant}: score {:.2}, reward {reward}",
            self.player_id, breakdown.score
        );
        self.release(order_id, now);

        Ok(SubmissionOutcome::Scored(ScoreReport {
            order_id: order_id.to_string(),
            restaurant,
            difficulty,
            score: breakdown.score,
            breakdown,
            reward,
            coins,
            elapsed_seconds: millis_to_seconds(elapsed.num_milliseconds()),
        }))
    }

    /// Remove an order, count it as completed, and schedule its replacement.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::NotFound`] for unknown orders and store failures as
    /// [`GameError::ExternalService`]; on a store failure the order stays active.
    pub fn discard(
        &mut self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ActiveOrder, GameError> {
        let restaurant = self
            .active
            .get(order_id)
            .map(|active| active.restaurant.clone())
            .ok_or_else(|| GameError::order_not_found(order_id))?;
        self.ledger().record_completed(&self.player_id, &restaurant)?;
        self.release(order_id, now)
            .ok_or_else(|| GameError::order_not_found(order_id))
    }

    /// Take an order off the board, retract its announcement and schedule a replacement.
    fn release(&mut self, order_id: &str, now: DateTime<Utc>) -> Option<ActiveOrder> {
        let active = self.active.remove(order_id)?;
        if let Some(handle) = active.announcement {
            retract_quietly(&mut self.announcer, handle);
        }
        if self.is_running() {
            let cooldown = self.draw_delay(self.config.lifecycle.respawn_cooldown_seconds);
            self.scheduler.schedule(now + cooldown, SessionEvent::SpawnOrder);
        }
        Some(active)
    }

    /// Close the restaurant: retract everything and drop pending work. Idempotent.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        let mut handles: Vec<MessageHandle> = self
            .active
            .values()
            .filter_map(|active| active.announcement)
            .collect();
        handles.extend(self.scheduler.events().filter_map(|event| match event {
            SessionEvent::ExpireCondition { handle, .. } => *handle,
            _ => None,
        }));
        for handle in handles {
            retract_quietly(&mut self.announcer, handle);
        }
        self.scheduler.clear();
        self.active.clear();
        self.board.clear();
        self.state = SessionState::Stopped;
        info!("session for {} stopped", self.player_id);
    }
}

fn no_restaurants(player_id: &str) -> GameError {
    GameError::InvariantViolation(format!("player {player_id} owns no restaurants"))
}
