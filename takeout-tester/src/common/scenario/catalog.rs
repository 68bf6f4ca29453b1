use anyhow::{Result, anyhow};
use std::collections::BTreeSet;

use crate::common::scenario::SimulationScenario;
use crate::logic::{PlayStrategy, SimulationPlan, SimulationSummary};
use takeout_game::scoring::base_reward;
use takeout_game::{Difficulty, PlayerState, RestaurantCatalog, ScoringConfig};

const STARTER_RESTAURANT: &str = "Pizzaria";
const EXACT: f64 = 1e-9;

pub fn catalog_scenarios() -> Vec<SimulationScenario> {
    vec![
        SimulationScenario::new(
            "smoke",
            "Smoke Test",
            SimulationPlan::new(PlayStrategy::Perfect).with_expectation(perfect_scores_expectation),
        ),
        SimulationScenario::new(
            "raw-ground-truth",
            "Raw Orders Without Conditions",
            SimulationPlan::new(PlayStrategy::Raw).with_expectation(raw_orders_expectation),
        ),
        SimulationScenario::new(
            "typo-player",
            "Typo Deductions",
            SimulationPlan::new(PlayStrategy::Typo).with_expectation(typo_expectation),
        ),
        SimulationScenario::new(
            "slow-player",
            "Late Penalty",
            SimulationPlan::new(PlayStrategy::Slow)
                .with_orders(4)
                .with_expectation(late_penalty_expectation),
        ),
        SimulationScenario::new(
            "difficulty-escalation",
            "Difficulty Escalation",
            SimulationPlan::new(PlayStrategy::Perfect)
                .with_setup(almost_medium)
                .with_expectation(escalation_expectation),
        ),
        SimulationScenario::new(
            "multi-restaurant",
            "Multiple Restaurants",
            SimulationPlan::new(PlayStrategy::Perfect)
                .with_orders(30)
                .with_setup(owns_everything)
                .with_expectation(perfect_scores_expectation)
                .with_expectation(restaurant_spread_expectation),
        ),
        SimulationScenario::new(
            "description-reader",
            "Description Reader",
            SimulationPlan::new(PlayStrategy::Reader).with_expectation(reader_expectation),
        ),
        SimulationScenario::new(
            "deterministic-replay",
            "Deterministic Replay",
            SimulationPlan::new(PlayStrategy::Typo)
                .with_replay()
                .with_expectation(replay_expectation),
        ),
    ]
}

fn almost_medium(state: &mut PlayerState, _catalog: &RestaurantCatalog) {
    state
        .completed_orders
        .insert(STARTER_RESTAURANT.to_string(), 9);
}

fn owns_everything(state: &mut PlayerState, catalog: &RestaurantCatalog) {
    state.restaurants = catalog.names().map(str::to_string).collect();
}

fn no_rejections(summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(
        summary.rejected == 0,
        "{} submissions were rejected",
        summary.rejected
    );
    Ok(())
}

fn perfect_scores_expectation(summary: &SimulationSummary) -> Result<()> {
    no_rejections(summary)?;
    if let Some(record) = summary
        .records
        .iter()
        .find(|record| (record.score - 1.0).abs() > EXACT)
    {
        return Err(anyhow!(
            "order {} scored {:.3} for an exact submission",
            record.order_id,
            record.score
        ));
    }
    Ok(())
}

fn raw_orders_expectation(summary: &SimulationSummary) -> Result<()> {
    no_rejections(summary)?;
    for record in summary.records.iter().filter(|record| !record.adjusted) {
        anyhow::ensure!(
            (record.score - 1.0).abs() < EXACT,
            "unadjusted order {} scored {:.3}",
            record.order_id,
            record.score
        );
    }
    Ok(())
}

fn typo_expectation(summary: &SimulationSummary) -> Result<()> {
    no_rejections(summary)?;
    for record in &summary.records {
        anyhow::ensure!(
            record.score > 0.5 && record.score < 1.0,
            "a single typo on order {} scored {:.3}",
            record.order_id,
            record.score
        );
    }
    Ok(())
}

fn late_penalty_expectation(summary: &SimulationSummary) -> Result<()> {
    let scoring = ScoringConfig::default();
    for record in &summary.records {
        let expected = base_reward(record.score, scoring.reward_scale) - scoring.late_penalty;
        anyhow::ensure!(
            record.reward == expected,
            "late order {} paid {} instead of {expected}",
            record.order_id,
            record.reward
        );
    }
    Ok(())
}

fn escalation_expectation(summary: &SimulationSummary) -> Result<()> {
    let difficulties: Vec<Difficulty> = summary
        .records
        .iter()
        .map(|record| record.difficulty)
        .collect();
    anyhow::ensure!(
        difficulties.first() == Some(&Difficulty::Easy),
        "first order should be easy, got {difficulties:?}"
    );
    anyhow::ensure!(
        difficulties.last() == Some(&Difficulty::Medium),
        "last order should be medium, got {difficulties:?}"
    );
    anyhow::ensure!(
        difficulties.windows(2).all(|pair| pair[0] <= pair[1]),
        "difficulty went down: {difficulties:?}"
    );
    Ok(())
}

fn restaurant_spread_expectation(summary: &SimulationSummary) -> Result<()> {
    let served: BTreeSet<&str> = summary
        .records
        .iter()
        .map(|record| record.restaurant.as_str())
        .collect();
    anyhow::ensure!(
        served.len() >= 2,
        "only {served:?} received orders"
    );
    Ok(())
}

fn reader_expectation(summary: &SimulationSummary) -> Result<()> {
    no_rejections(summary)?;
    let mean = summary.mean_score();
    anyhow::ensure!(mean >= 0.6, "reader averaged {mean:.3}");
    Ok(())
}

fn replay_expectation(summary: &SimulationSummary) -> Result<()> {
    match summary.replay_digest {
        Some(replay) if replay == summary.digest => Ok(()),
        Some(replay) => Err(anyhow!(
            "replay digest {replay:016x} differs from {:016x}",
            summary.digest
        )),
        None => Err(anyhow!("replay was not recorded")),
    }
}
