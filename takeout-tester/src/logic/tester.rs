use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::logic::simulation::{OrderSimulator, SimulationPlan, SimulationSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub submissions: usize,
    pub mean_score: f64,
    pub total_reward: i64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

#[derive(Default)]
struct IterationTally {
    successes: usize,
    failures: Vec<String>,
    performance_data: Vec<Duration>,
    submissions: usize,
    score_sum: f64,
    total_reward: i64,
}

pub struct LogicTester {
    simulator: OrderSimulator,
}

impl LogicTester {
    pub const fn new(simulator: OrderSimulator) -> Self {
        Self { simulator }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.simulator.verbose() {
                println!(
                    "🧪 Testing scenario: {} (strategy: {} seed: {})",
                    scenario.name.bright_white(),
                    scenario.plan.strategy,
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations);
            results.push(result);
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let tally = self.run_simulation_iterations(&scenario.plan, seed, iterations);

        let average_duration = if tally.performance_data.is_empty() {
            Duration::ZERO
        } else {
            tally.performance_data.iter().sum::<Duration>()
                / u32::try_from(tally.performance_data.len()).unwrap_or(1)
        };
        #[allow(clippy::cast_precision_loss)]
        let mean_score = if tally.submissions == 0 {
            0.0
        } else {
            tally.score_sum / tally.submissions as f64
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: tally.failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: tally.successes,
            failures: tally.failures,
            submissions: tally.submissions,
            mean_score,
            total_reward: tally.total_reward,
            average_duration,
            performance_data: tally.performance_data,
        }
    }

    fn run_simulation_iterations(
        &self,
        plan: &SimulationPlan,
        seed: u64,
        iterations: usize,
    ) -> IterationTally {
        let verbose = self.simulator.verbose();
        let mut tally = IterationTally::default();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let summary = match self.simulator.run_plan(plan, iteration_seed) {
                Ok(summary) => summary,
                Err(err) => {
                    tally.failures.push(format!(
                        "Iteration {} (strategy {}, seed {iteration_seed}): simulation failed: {err}",
                        i + 1,
                        plan.strategy
                    ));
                    continue;
                }
            };

            tally.submissions += summary.records.len();
            tally.score_sum += summary.records.iter().map(|r| r.score).sum::<f64>();
            tally.total_reward += summary.total_reward();

            if let Some(err) = evaluate_expectations(plan, &summary) {
                let context = summarize_submissions(&summary);
                tally.failures.push(format!(
                    "Iteration {} (strategy {}, seed {}, submissions {}, rejected {}, conditions {}, coins {}): {} | {}",
                    i + 1,
                    summary.strategy,
                    summary.seed,
                    summary.records.len(),
                    summary.rejected,
                    summary.conditions_announced,
                    summary.final_state.coins,
                    err,
                    context
                ));

                if verbose {
                    println!(
                        "  ❌ Iteration {}/{} failed: {}",
                        i + 1,
                        iterations,
                        err.red()
                    );
                    println!("     ↳ Seed {} | {}", summary.seed, context);
                }
            } else {
                tally.successes += 1;
                let duration = start_time.elapsed();
                tally.performance_data.push(duration);

                if verbose {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?}) mean score:{:.3} coins:{} closed at {}",
                        i + 1,
                        iterations,
                        summary.mean_score(),
                        summary.final_state.coins,
                        summary.ended_at.format("%H:%M:%S")
                    );
                }
            }
        }

        tally
    }
}

fn evaluate_expectations(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            return Some(err.to_string());
        }
    }
    None
}

fn summarize_submissions(summary: &SimulationSummary) -> String {
    if summary.records.is_empty() {
        return "no submissions recorded".to_string();
    }

    summary
        .records
        .iter()
        .rev()
        .take(3)
        .map(|record| {
            let rationale = record
                .rationale
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("-");
            format!(
                "{} at {} ({}, {:.0}s): score {:.3} reward {} items off {} reason {}",
                record.order_id,
                record.restaurant,
                record.difficulty,
                record.elapsed_seconds,
                record.score,
                record.reward,
                record.item_differences,
                rationale
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis_vec = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis_vec
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::PlayStrategy;
    use takeout_game::GameConfig;

    fn tester() -> LogicTester {
        LogicTester::new(OrderSimulator::embedded(GameConfig::default(), false).unwrap())
    }

    #[test]
    fn failing_expectations_are_reported_per_iteration() {
        let plan = SimulationPlan::new(PlayStrategy::Perfect)
            .with_orders(1)
            .with_expectation(|_: &SimulationSummary| -> anyhow::Result<()> {
                anyhow::bail!("always fails")
            });
        let scenario = TestScenario::simulation("Failing", plan);
        let results = tester().run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.passed);
            assert_eq!(result.failures.len(), 2);
            assert!(result.failures[0].contains("always fails"));
            assert_eq!(result.successful_iterations, 0);
        }
    }

    #[test]
    fn passing_runs_aggregate_scores() {
        let plan = SimulationPlan::new(PlayStrategy::Perfect).with_orders(2);
        let scenario = TestScenario::simulation("Passing", plan);
        let results = tester().run_scenario(&scenario, &[3], 3);
        let result = &results[0];
        assert!(result.passed);
        assert_eq!(result.submissions, 6);
        assert!((result.mean_score - 1.0).abs() < 1e-12);
        assert_eq!(result.total_reward, 90);

        let json = serde_json::to_string(result).unwrap();
        let back: ScenarioResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.performance_data.len(), 3);
    }
}
