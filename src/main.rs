//! Decision Scorecard
//!
//! Command line entry point: the interactive wizard, one-shot scoring,
//! history listing and profile setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::info;

use decision_scorecard::agent::provider_from_config;
use decision_scorecard::config::{ProfileManager, ScorecardProfile};
use decision_scorecard::orchestrator::{ScorecardCLI, ScorecardSession};
use decision_scorecard::scoring::{ScoreSet, WeightSet};
use decision_scorecard::storage::{DecisionRecord, DecisionStore};
use decision_scorecard::utils::{ellipsize, init_logging, LogTarget};
use decision_scorecard::verdict::{evaluate, Fragility, Signals};

#[derive(Parser)]
#[command(author, version, about = "Score a life decision and get a verdict", long_about = None)]
struct Cli {
    /// Profile file (created with defaults when missing)
    #[arg(long, global = true, default_value = "scorecard.json")]
    profile: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through the interactive scorecard (default)
    Run,
    /// Score a decision from the command line
    Score {
        /// Dimension score, repeatable
        #[arg(long = "score", value_name = "NAME=VALUE")]
        scores: Vec<String>,
        /// Dimension weight, repeatable
        #[arg(long = "weight", value_name = "NAME=WEIGHT")]
        weights: Vec<String>,
        /// What doing nothing would cost
        #[arg(long, default_value = "")]
        inaction_cost: String,
        #[arg(long, value_enum, default_value_t = FragilityArg::Neutral)]
        fragility: FragilityArg,
        /// Decision text stored with --save
        #[arg(long)]
        decision: Option<String>,
        /// Append the result to the decision history
        #[arg(long)]
        save: bool,
    },
    /// Show saved decisions, newest first
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Write a profile
    Init {
        #[arg(long, value_enum, default_value_t = Preset::Values)]
        preset: Preset,
        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FragilityArg {
    Reduces,
    Neutral,
    Increases,
}

impl From<FragilityArg> for Fragility {
    fn from(arg: FragilityArg) -> Self {
        match arg {
            FragilityArg::Reduces => Fragility::Reduces,
            FragilityArg::Neutral => Fragility::Neutral,
            FragilityArg::Increases => Fragility::Increases,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Core values, -2..2 impact, signed-sum verdict
    Values,
    /// Core values rated 1..10 against the threshold bands
    Threshold,
    /// Life pillars, -2..2 impact, signed-sum verdict
    Pillars,
}

fn split_pair(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("expected NAME=VALUE, got '{}'", raw),
    }
}

async fn load_profile(path: &Path) -> Result<ScorecardProfile> {
    let profile = ProfileManager::new(path).load().await?;
    Ok(profile.with_env_overrides())
}

async fn run(profile: ScorecardProfile) -> Result<()> {
    let _guard = init_logging(LogTarget::File(&profile.log_file))?;

    let provider = profile.assisted.then(|| provider_from_config(&profile.provider));
    let store = DecisionStore::new(&profile.data_file);
    let session = ScorecardSession::new(profile, provider);

    ScorecardCLI::new(session, store).run().await
}

async fn score(
    profile: ScorecardProfile,
    scores: Vec<String>,
    weights: Vec<String>,
    inaction_cost: String,
    fragility: Fragility,
    decision: Option<String>,
    save: bool,
) -> Result<()> {
    let mut raw = Map::new();
    for pair in &scores {
        let (name, value) = split_pair(pair)?;
        if profile.dimensions.resolve(name).is_none() {
            bail!(
                "unknown dimension '{}' (expected one of: {})",
                name,
                profile.dimensions.iter().collect::<Vec<_>>().join(", ")
            );
        }
        raw.insert(name.to_string(), Value::String(value.to_string()));
    }
    let score_set = ScoreSet::from_raw(&profile.dimensions, profile.scale(), &raw);

    let weight_set = if weights.is_empty() {
        profile.weight_set()
    } else {
        let mut parsed = BTreeMap::new();
        for pair in &weights {
            let (name, value) = split_pair(pair)?;
            let w: f64 = value.parse().with_context(|| format!("weight for '{}' is not a number", name))?;
            parsed.insert(name.to_string(), w);
        }
        Some(WeightSet::from_map(&profile.dimensions, &parsed))
    };

    let signals = Signals::from_answers(&inaction_cost, fragility);
    let verdict = evaluate(&profile.policy, &score_set, weight_set.as_ref(), &signals);

    for (name, value) in score_set.iter() {
        println!("  {:<16} {:>3}", name, value);
    }
    println!("{}", "─".repeat(40));
    println!("Verdict: {} | Aggregate: {:.2} | Total: {}", verdict.label, verdict.aggregate, verdict.total);
    println!("Reason:  {}", verdict.reason);
    println!("{}", verdict.label.guidance());

    if save {
        let Some(decision) = decision.filter(|d| !d.trim().is_empty()) else {
            bail!("--save needs --decision");
        };
        let mut record = DecisionRecord::new(decision.trim(), &score_set, &verdict);
        record.inaction_cost = inaction_cost;
        record.fragility = fragility;
        DecisionStore::new(&profile.data_file).append(record).await?;
        println!("Saved to {}", profile.data_file.display());
    }
    Ok(())
}

async fn history(profile: ScorecardProfile, limit: usize) -> Result<()> {
    let records = DecisionStore::new(&profile.data_file).load().await;
    if records.is_empty() {
        println!("No decisions saved yet.");
        return Ok(());
    }
    for r in records.iter().take(limit) {
        println!("{}  {:<8} {:>6.2}  {}", r.date, r.verdict.to_string(), r.aggregate, ellipsize(&r.decision, 60));
    }
    if records.len() > limit {
        println!("... {} more", records.len() - limit);
    }
    Ok(())
}

async fn init(path: &Path, preset: Preset, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let profile = match preset {
        Preset::Values => ScorecardProfile::default(),
        Preset::Threshold => ScorecardProfile::threshold_preset(),
        Preset::Pillars => ScorecardProfile::pillars_preset(),
    };
    ProfileManager::new(path).save(&profile).await?;
    info!("Profile written to {}", path.display());
    println!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run);

    // the TUI owns the terminal and logs to a file instead
    let _guard = match command {
        Commands::Run => None,
        _ => init_logging(LogTarget::Stderr)?,
    };

    match command {
        Commands::Run => run(load_profile(&cli.profile).await?).await,
        Commands::Score { scores, weights, inaction_cost, fragility, decision, save } => {
            let profile = load_profile(&cli.profile).await?;
            score(profile, scores, weights, inaction_cost, fragility.into(), decision, save).await
        }
        Commands::History { limit } => history(load_profile(&cli.profile).await?, limit).await,
        Commands::Init { preset, force } => init(&cli.profile, preset, force).await,
    }
}
