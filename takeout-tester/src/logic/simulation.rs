use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use twox_hash::XxHash64;

use takeout_game::ledger::StoreError;
use takeout_game::{
    AnnouncementKind, Difficulty, GameConfig, GameContent, GameError, GameSession,
    MemoryPlayerStore, PlayerLedger, PlayerState, PlayerStore, RecordingAnnouncer,
    RestaurantCatalog, SubmissionOutcome,
};

use crate::logic::policy::PlayStrategy;

pub const DEFAULT_ORDERS: usize = 6;
const SIMULATED_PLAYER: &str = "simulated-player";
const MAX_STEPS: usize = 100_000;

/// Prepares the stored player before the session opens.
pub type PlayerSetup = fn(&mut PlayerState, &RestaurantCatalog);

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("simulation stalled after {submitted} submissions")]
    Stalled { submitted: usize },
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not encode submissions: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One scored submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub order_id: String,
    pub restaurant: String,
    pub difficulty: Difficulty,
    pub elapsed_seconds: f64,
    pub score: f64,
    pub reward: i64,
    pub item_differences: usize,
    /// Conditions made the expected order differ from the generated one.
    pub adjusted: bool,
    pub rationale: Option<String>,
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: PlayStrategy,
    pub records: Vec<SubmissionRecord>,
    pub rejected: usize,
    pub conditions_announced: usize,
    pub final_state: PlayerState,
    pub ended_at: DateTime<Utc>,
    /// Hash of the serialized submissions.
    pub digest: u64,
    pub replay_digest: Option<u64>,
}

impl SimulationSummary {
    #[must_use]
    pub fn mean_score(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let total: f64 = self.records.iter().map(|record| record.score).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.records.len() as f64;
        total / count
    }

    #[must_use]
    pub fn total_reward(&self) -> i64 {
        self.records.iter().map(|record| record.reward).sum()
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// What a scenario asks the simulator to do.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: PlayStrategy,
    pub orders: usize,
    pub setup: Option<PlayerSetup>,
    /// Run twice and record the second digest.
    pub replay: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(strategy: PlayStrategy) -> Self {
        Self {
            strategy,
            orders: DEFAULT_ORDERS,
            setup: None,
            replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_orders(mut self, orders: usize) -> Self {
        self.orders = orders;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: PlayerSetup) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub const fn with_replay(mut self) -> Self {
        self.replay = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

fn simulation_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Headless runner: one player, simulated time, a policy handing in orders oldest first.
#[derive(Clone)]
pub struct OrderSimulator {
    content: Arc<GameContent>,
    config: GameConfig,
    verbose: bool,
}

impl OrderSimulator {
    #[must_use]
    pub const fn new(content: Arc<GameContent>, config: GameConfig, verbose: bool) -> Self {
        Self {
            content,
            config,
            verbose,
        }
    }

    /// Simulator over the bundled content.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled assets fail to parse.
    pub fn embedded(config: GameConfig, verbose: bool) -> Result<Self> {
        Ok(Self::new(Arc::new(GameContent::embedded()?), config, verbose))
    }

    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Run `plan` with `seed`, twice when the plan asks for a replay.
    ///
    /// # Errors
    ///
    /// Returns a [`SimulationError`] if the session fails or stops making progress.
    pub fn run_plan(
        &self,
        plan: &SimulationPlan,
        seed: u64,
    ) -> Result<SimulationSummary, SimulationError> {
        let mut summary = self.simulate(plan, seed)?;
        if plan.replay {
            summary.replay_digest = Some(self.simulate(plan, seed)?.digest);
        }
        Ok(summary)
    }

    fn simulate(
        &self,
        plan: &SimulationPlan,
        seed: u64,
    ) -> Result<SimulationSummary, SimulationError> {
        let store = MemoryPlayerStore::new();
        if let Some(setup) = plan.setup {
            let mut state = PlayerState::starter(&self.content.catalog);
            setup(&mut state, &self.content.catalog);
            store.save_player(SIMULATED_PLAYER, &state)?;
        }
        let announcer = RecordingAnnouncer::new();
        let mut session = GameSession::new(
            SIMULATED_PLAYER,
            Arc::clone(&self.content),
            self.config.clone(),
            store.clone(),
            announcer.clone(),
            seed,
        );
        let mut policy = plan.strategy.create_policy(seed, &self.content);

        let mut now = simulation_epoch();
        session.start(now)?;
        let mut records = Vec::with_capacity(plan.orders);
        let mut rejected = 0;
        let mut steps = 0;

        while records.len() < plan.orders {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(SimulationError::Stalled {
                    submitted: records.len(),
                });
            }

            let oldest = session
                .active_orders()
                .min_by_key(|active| active.order().order_timestamp)
                .cloned();
            let Some(active) = oldest else {
                let Some(due) = session.next_due() else {
                    return Err(SimulationError::Stalled {
                        submitted: records.len(),
                    });
                };
                now = now.max(due);
                session.advance(now)?;
                continue;
            };

            let think = TimeDelta::seconds(policy.think_seconds(&active));
            now = now.max(active.order().order_timestamp + think);
            session.advance(now)?;

            let order_id = active.order_id().to_string();
            let Some(expected) = session.expected_order(&order_id) else {
                continue;
            };
            let decision = policy.fill_order(&active, &expected);
            match session.submit(&order_id, &decision.order, now)? {
                SubmissionOutcome::Scored(report) => {
                    if self.verbose {
                        println!(
                            "  🧾 {} {} at {} ({}) score {:.3} reward {}",
                            policy.name().bright_white(),
                            report.order_id,
                            report.restaurant,
                            report.difficulty,
                            report.score,
                            report.reward
                        );
                    }
                    records.push(SubmissionRecord {
                        order_id: report.order_id,
                        restaurant: report.restaurant,
                        difficulty: report.difficulty,
                        elapsed_seconds: report.elapsed_seconds,
                        score: report.score,
                        reward: report.reward,
                        item_differences: report.breakdown.item_differences,
                        adjusted: active.order() != &expected,
                        rationale: decision.rationale,
                    });
                }
                SubmissionOutcome::Rejected { message } => {
                    if self.verbose {
                        println!("  ⚠️  {} rejected: {message}", policy.name());
                    }
                    rejected += 1;
                }
            }
        }

        let conditions_announced = announcer.live_of(AnnouncementKind::Condition).len()
            + announcer
                .retracted()
                .iter()
                .filter(|posted| posted.context.kind == AnnouncementKind::Condition)
                .count();
        let final_state =
            PlayerLedger::new(&store, &self.content.catalog).state(SIMULATED_PLAYER)?;
        session.stop();
        let digest = XxHash64::oneshot(seed, &serde_json::to_vec(&records)?);

        Ok(SimulationSummary {
            seed,
            strategy: plan.strategy,
            records,
            rejected,
            conditions_announced,
            final_state,
            ended_at: now,
            digest,
            replay_digest: None,
        })
    }
}
