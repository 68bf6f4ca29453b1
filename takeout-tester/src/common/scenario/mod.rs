pub mod catalog;

use crate::logic::SimulationPlan;
use catalog::catalog_scenarios;

// Logic test scenario
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// A named plan from the catalog, keyed for the command line.
#[derive(Debug, Clone)]
pub struct SimulationScenario {
    key: &'static str,
    name: &'static str,
    plan: SimulationPlan,
}

impl SimulationScenario {
    #[must_use]
    pub fn new(key: &'static str, name: &'static str, plan: SimulationPlan) -> Self {
        Self { key, name, plan }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn as_logic_scenario(&self) -> TestScenario {
        TestScenario::simulation(self.name, self.plan.clone())
    }
}

pub fn get_scenario(name: &str) -> Option<SimulationScenario> {
    let key = match name.to_lowercase().as_str() {
        "perfect" => "smoke".to_string(),
        "raw" => "raw-ground-truth".to_string(),
        "typo" => "typo-player".to_string(),
        "slow" => "slow-player".to_string(),
        "escalation" => "difficulty-escalation".to_string(),
        "reader" => "description-reader".to_string(),
        "deterministic" | "replay" => "deterministic-replay".to_string(),
        other => other.to_string(),
    };
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.key() == key)
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    catalog_scenarios()
        .iter()
        .map(|scenario| (scenario.key(), scenario.name()))
        .collect()
}
