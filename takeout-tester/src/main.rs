mod common;
mod live;
mod logic;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use common::scenario::{get_scenario, list_scenarios};
use common::split_csv;
use live::{LiveOptions, run_live};
use logic::{LogicTester, OrderSimulator, ScenarioResult, resolve_seed_inputs};
use takeout_game::{GameConfig, GameEngine, MemoryPlayerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestMode {
    /// Simulated players on a simulated clock (fast, deterministic)
    Logic,
    /// Real sessions on the tokio runtime against the wall clock
    Live,
}

#[derive(Debug, Parser)]
#[command(name = "takeout-tester", version = "0.1.0")]
#[command(about = "Automated QA testing for the Takeout game engine")]
struct Args {
    /// Test mode: logic (simulated) or live (wall clock)
    #[arg(long, value_enum, default_value_t = TestMode::Logic)]
    mode: TestMode,

    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated integers or words)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Game configuration JSON; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Players to run in live mode (comma-separated)
    #[arg(long, default_value = "live-chef")]
    players: String,

    /// Seconds to keep live sessions running
    #[arg(long, default_value_t = 60)]
    live_seconds: u64,

    /// Seconds between live submissions
    #[arg(long, default_value_t = 15)]
    submit_every: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();
    let config = load_config(args.config.as_deref())?;
    let start_time = Instant::now();

    if args.mode == TestMode::Live {
        return run_live_mode(&args, config).await;
    }

    let scenarios = expand_scenarios(&args.scenarios);
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    for info in &seed_infos {
        if let Some(label) = &info.label {
            log::info!("seed {label:?} resolved to {}", info.seed);
        }
    }
    let seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();
    let simulator = OrderSimulator::embedded(config, args.verbose)?;

    let results = run_logic_scenarios(&args, &scenarios, &seeds, simulator);
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🍕 Takeout Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    GameConfig::from_json(&json).with_context(|| format!("invalid config in {}", path.display()))
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(list_scenarios().into_iter().map(|(key, _)| key.to_string()));
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    simulator: OrderSimulator,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(simulator);
    let mut results = Vec::new();

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            let scenario_results =
                logic_tester.run_scenario(&scenario.as_logic_scenario(), seeds, args.iterations);
            results.extend(scenario_results);
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

async fn run_live_mode(args: &Args, config: GameConfig) -> Result<()> {
    println!("{}", "⏱️  Running Live Sessions".bright_blue().bold());
    println!("{}", "-".repeat(30).blue());

    let engine = GameEngine::new(
        &takeout_game::EmbeddedContent,
        MemoryPlayerStore::new(),
        config,
    )?;
    let seed = resolve_seed_inputs(&split_csv(&args.seeds))?
        .first()
        .map_or(logic::seeds::DEFAULT_SEED, |info| info.seed);
    let options = LiveOptions {
        players: split_csv(&args.players),
        duration: Duration::from_secs(args.live_seconds),
        submit_every: Duration::from_secs(args.submit_every.max(1)),
        seed,
    };
    let summary = run_live(&engine, &options, Utc::now()).await?;

    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(
        &mut output_target,
        "Live run: {} submissions, {} rejected",
        summary.submissions, summary.rejected
    )?;
    for (player, coins) in &summary.coins {
        writeln!(&mut output_target, "  {player:20} {coins} coins")?;
    }
    output_target.flush_inner()?;
    Ok(())
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Takeout Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        "csv" => logic::reports::generate_csv_report(&mut output_target, results)?,
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            mode: TestMode::Logic,
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            verbose: false,
            output: None,
            config: None,
            players: "live-chef".to_string(),
            live_seconds: 60,
            submit_every: 15,
        }
    }

    #[test]
    fn all_expands_to_every_scenario() {
        let scenarios = expand_scenarios("all,smoke");
        assert_eq!(scenarios[0], "smoke");
        assert_eq!(scenarios.len(), list_scenarios().len() + 1);
        assert!(scenarios.iter().any(|s| s == "deterministic-replay"));
    }

    #[test]
    fn args_parse_from_the_command_line() {
        let args = Args::try_parse_from([
            "takeout-tester",
            "--mode",
            "live",
            "--seeds",
            "1,2",
            "--report",
            "markdown",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.mode, TestMode::Live);
        assert_eq!(args.seeds, "1,2");
        assert!(args.verbose);
        assert!(Args::try_parse_from(["takeout-tester", "--report", "xml"]).is_err());
    }

    #[test]
    fn missing_config_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), GameConfig::default());
        assert!(load_config(Some(Path::new("/definitely/not/here.json"))).is_err());
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let args = base_args();
        let simulator = OrderSimulator::embedded(GameConfig::default(), false).unwrap();
        let results = run_logic_scenarios(
            &args,
            &["nope".to_string(), "smoke".to_string()],
            &[1],
            simulator,
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
    }

    #[test]
    fn reports_write_to_files() {
        let path = std::env::temp_dir().join(format!(
            "takeout-tester-report-{}.csv",
            std::process::id()
        ));
        let mut args = base_args();
        args.report = "csv".to_string();
        args.output = Some(path.clone());
        write_reports(&args, &[], Instant::now()).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("scenario,seed,passed"));
        let _ = std::fs::remove_file(path);
    }
}
