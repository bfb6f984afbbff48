use std::collections::HashMap;

use crate::ladder::ResultsSheet;
use crate::tabular::parse_cell_f64;

/// results.csv columns tracked across rounds for the history sparkline.
pub const TRACKED_METRICS: [&str; 5] = ["Total Rating", "Top 8", "Top 4", "Minor Premiers", "Spoon"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub round: u32,
    pub value: f64,
}

/// metric name -> team -> ordered per-round values. Rounds that were missing
/// or unreadable are absent from every series and noted in `warnings`.
#[derive(Debug, Clone, Default)]
pub struct MetricHistory {
    pub series: HashMap<String, HashMap<String, Vec<MetricPoint>>>,
    pub warnings: Vec<String>,
}

impl MetricHistory {
    pub fn team_series(&self, metric: &str, team: &str) -> Option<&[MetricPoint]> {
        self.series
            .get(metric)
            .and_then(|teams| teams.get(team))
            .map(Vec::as_slice)
    }
}

/// Walk rounds 0..=max_round, reading each round's results.csv through the
/// supplied loader. Every missing round degrades to a warning; malformed
/// metric cells are skipped point-wise.
pub fn collect_history(
    max_round: u32,
    metrics: &[&str],
    load_round: impl Fn(u32) -> Option<String>,
) -> MetricHistory {
    let mut history = MetricHistory::default();

    for round in 0..=max_round {
        let Some(raw) = load_round(round) else {
            history
                .warnings
                .push(format!("Round{round}: results.csv missing or unreadable"));
            continue;
        };
        let Some(sheet) = ResultsSheet::parse(&raw) else {
            history.warnings.push(format!("Round{round}: empty results.csv"));
            continue;
        };

        for row in &sheet.rows {
            let Some(team) = sheet.cell(row, "Team").map(str::trim) else {
                continue;
            };
            if team.is_empty() {
                continue;
            }
            for metric in metrics {
                let Some(cell) = sheet.cell(row, metric) else {
                    continue;
                };
                let value = parse_cell_f64(cell);
                if !value.is_finite() {
                    continue;
                }
                history
                    .series
                    .entry((*metric).to_string())
                    .or_default()
                    .entry(team.to_string())
                    .or_default()
                    .push(MetricPoint { round, value });
            }
        }
    }

    history
}
