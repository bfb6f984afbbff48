use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::http_cache::fetch_text_cached;
use crate::http_client::http_client;
use crate::ladder::{ladder_rows, point_spreads, ResultsSheet, TeamPointSpread};
use crate::magic::{parse_outcome_curves, OutcomeKey, ThresholdCurve};
use crate::predictions::{parse_predictions, PredictedMatch};
use crate::sim_table::SimulationTable;
use crate::tabular::parse_table_lenient;
use crate::tracker::{collect_history, MetricHistory, TRACKED_METRICS};

pub const RESULTS_FILE: &str = "results.csv";
pub const MAGIC_FILE: &str = "magic numbers.csv";
pub const PREDICTIONS_FILE: &str = "Predictions.txt";

/// Highest round folder probed when discovering the latest round.
const MAX_ROUND_PROBE: u32 = 30;

/// Per-round impact-factor table for an outcome market.
pub fn impact_factors_file(key: OutcomeKey) -> &'static str {
    match key {
        OutcomeKey::Finals => "ext_impact_factors_top8.csv",
        OutcomeKey::Top4 => "ext_impact_factors_top4.csv",
        OutcomeKey::MinorPremiership => "ext_impact_factors_mp.csv",
        OutcomeKey::Spoon => "ext_impact_factors_spoon.csv",
    }
}

/// Where the round folders live: a local data tree or an HTTP base.
#[derive(Debug, Clone)]
pub enum DataSource {
    Local(PathBuf),
    Remote(String),
}

impl DataSource {
    /// `NRL_DATA_BASE_URL` wins over `NRL_DATA_DIR`; default is a `data`
    /// directory next to the binary.
    pub fn from_env() -> Self {
        if let Ok(base) = env::var("NRL_DATA_BASE_URL") {
            let base = base.trim().trim_end_matches('/').to_string();
            if !base.is_empty() {
                return DataSource::Remote(base);
            }
        }
        let dir = env::var("NRL_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        DataSource::Local(PathBuf::from(dir.trim()))
    }

    pub fn read(&self, round: u32, file: &str) -> Result<String> {
        match self {
            DataSource::Local(dir) => {
                let path = dir.join(format!("Round{round}")).join(file);
                fs::read_to_string(&path)
                    .with_context(|| format!("read {}", path.display()))
            }
            DataSource::Remote(base) => {
                let url = format!("{base}/Round{round}/{}", file.replace(' ', "%20"));
                fetch_text_cached(http_client()?, &url)
            }
        }
    }
}

/// First round, scanning downwards, whose results.csv exists. The probe
/// ceiling can be lowered with `NRL_MAX_ROUND` to skip dead requests early
/// in the season.
pub fn latest_round(source: &DataSource) -> Option<u32> {
    let ceiling = env::var("NRL_MAX_ROUND")
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(MAX_ROUND_PROBE)
        .min(MAX_ROUND_PROBE);
    (0..=ceiling)
        .rev()
        .find(|&round| source.read(round, RESULTS_FILE).is_ok())
}

/// Everything one round publishes, each section independently optional.
/// A missing file degrades its widget only; the reasons land in `errors`.
#[derive(Debug, Clone, Default)]
pub struct RoundSnapshot {
    pub round: u32,
    pub spreads: Vec<TeamPointSpread>,
    pub curves: HashMap<OutcomeKey, ThresholdCurve>,
    pub predictions: Vec<PredictedMatch>,
    pub errors: Vec<String>,
}

pub fn fetch_round_snapshot(source: &DataSource, round: u32) -> RoundSnapshot {
    let files = [RESULTS_FILE, MAGIC_FILE, PREDICTIONS_FILE];
    let raws: Vec<Result<String>> = files
        .par_iter()
        .map(|file| source.read(round, file))
        .collect();
    let Ok([results_raw, magic_raw, predictions_raw]) =
        <[Result<String>; 3]>::try_from(raws)
    else {
        unreachable!("one slot per requested file");
    };

    let mut snapshot = RoundSnapshot {
        round,
        ..RoundSnapshot::default()
    };

    match results_raw {
        Ok(raw) => match ResultsSheet::parse(&raw) {
            Some(sheet) => snapshot.spreads = point_spreads(&ladder_rows(&sheet), round),
            None => snapshot.errors.push(format!("{RESULTS_FILE}: empty sheet")),
        },
        Err(err) => snapshot.errors.push(format!("{RESULTS_FILE}: {err:#}")),
    }

    match magic_raw {
        Ok(raw) => snapshot.curves = parse_outcome_curves(&raw),
        Err(err) => snapshot.errors.push(format!("{MAGIC_FILE}: {err:#}")),
    }

    match predictions_raw {
        Ok(raw) => {
            let (matches, mut errors) = parse_predictions(&raw);
            snapshot.predictions = matches;
            snapshot.errors.append(&mut errors);
        }
        Err(err) => snapshot.errors.push(format!("{PREDICTIONS_FILE}: {err:#}")),
    }

    snapshot
}

/// Fetch and build an outcome market's simulation table. Returns whether
/// the lenient counts-row fallback engaged so the caller can warn.
pub fn fetch_impact_table(
    source: &DataSource,
    round: u32,
    key: OutcomeKey,
) -> Result<(SimulationTable, bool)> {
    let raw = source.read(round, impact_factors_file(key))?;
    let (parsed, fell_back) = parse_table_lenient(&raw)
        .with_context(|| format!("{}: bad table shape", impact_factors_file(key)))?;
    Ok((SimulationTable::from_parsed(&parsed), fell_back))
}

/// Walk every published round up to `round` for the history sparkline.
pub fn fetch_metric_history(source: &DataSource, round: u32) -> MetricHistory {
    collect_history(round, &TRACKED_METRICS, |r| {
        source.read(r, RESULTS_FILE).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_round_dir(dir: &std::path::Path, round: u32) {
        let round_dir = dir.join(format!("Round{round}"));
        fs::create_dir_all(&round_dir).unwrap();
        fs::write(
            round_dir.join(RESULTS_FILE),
            "Team,Points,Wins,Draws,Losses,Projected Points\nStorm,30,14,0,2,44.5\n",
        )
        .unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nrl_terminal_test_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn latest_round_takes_the_highest_published() {
        let dir = temp_dir("latest");
        seed_round_dir(&dir, 3);
        seed_round_dir(&dir, 7);
        let source = DataSource::Local(dir.clone());
        assert_eq!(latest_round(&source), Some(7));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_degrades_missing_sections_to_errors() {
        let dir = temp_dir("snapshot");
        seed_round_dir(&dir, 5);
        let source = DataSource::Local(dir.clone());
        let snapshot = fetch_round_snapshot(&source, 5);
        assert_eq!(snapshot.spreads.len(), 1);
        // magic numbers.csv and Predictions.txt were never published.
        assert_eq!(snapshot.errors.len(), 2);
        let _ = fs::remove_dir_all(&dir);
    }
}
