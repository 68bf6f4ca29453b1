use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use log::{info, warn};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use takeout_game::{
    GameEngine, LogAnnouncer, MemoryPlayerStore, SessionRegistry, SubmissionOutcome,
};

/// Settings for a wall-clock run against the tokio runtime.
#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub players: Vec<String>,
    pub duration: Duration,
    pub submit_every: Duration,
    pub seed: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveSummary {
    pub submissions: usize,
    pub rejected: usize,
    /// Final coins per player, in the order the players were given.
    pub coins: Vec<(String, i64)>,
}

/// Run one session per player, handing in each player's oldest order as generated
/// every `submit_every` until `duration` has passed.
///
/// # Errors
///
/// Returns an error if a session fails to start or the store cannot be read.
pub async fn run_live(
    engine: &GameEngine<MemoryPlayerStore>,
    options: &LiveOptions,
    started_at: DateTime<Utc>,
) -> Result<LiveSummary> {
    let mut registry = SessionRegistry::new();
    for (offset, player) in (0_u64..).zip(&options.players) {
        let session =
            engine.create_session(player, LogAnnouncer::default(), options.seed.wrapping_add(offset));
        registry
            .start(session, started_at)
            .with_context(|| format!("failed to start a session for {player}"))?;
        info!("live session started for {player}");
    }

    let mut summary = LiveSummary::default();
    let mut ticker = interval(options.submit_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::Instant::now() + options.duration;
    ticker.tick().await;

    while tokio::time::Instant::now() + options.submit_every <= deadline {
        ticker.tick().await;
        for player in &options.players {
            let Some(handle) = registry.get(player) else {
                continue;
            };
            let active = handle.active_orders().await?;
            let Some(oldest) = active
                .iter()
                .min_by_key(|active| active.order().order_timestamp)
            else {
                continue;
            };
            match handle
                .submit(oldest.order_id(), oldest.order().clone())
                .await?
            {
                SubmissionOutcome::Scored(report) => {
                    summary.submissions += 1;
                    println!(
                        "  🧾 {} {} at {} score {:.3} reward {}",
                        player.bright_white(),
                        report.order_id,
                        report.restaurant,
                        report.score,
                        report.reward
                    );
                }
                SubmissionOutcome::Rejected { message } => {
                    summary.rejected += 1;
                    warn!("{player}: {message}");
                }
            }
        }
    }

    registry.stop_all().await;
    for player in &options.players {
        let coins = engine.player_state(player)?.coins;
        summary.coins.push((player.clone(), coins));
    }
    Ok(summary)
}
