use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use rand::Rng;

use crate::ladder::{point_spreads, LadderRow};
use crate::magic::{OutcomeKey, ThresholdCurve};
use crate::predictions::PredictedMatch;
use crate::round_data::RoundSnapshot;
use crate::sgm_math::{self, TryCountDistribution};
use crate::sgm_session::{PlayerEntry, RoundMatch, Side, TeamLists, TeamTryModel};
use crate::sim_table::SimulationTable;
use crate::state::{Delta, ProviderCommand, SgmOutcome, SgmRequest, SGM_MAX_TRIES};
use crate::tabular::{parse_table, ParsedTable};
use crate::tracker::{MetricHistory, MetricPoint};

const DEMO_ROUND: u32 = 18;

const TEAMS: [&str; 8] = [
    "Storm", "Broncos", "Panthers", "Raiders", "Sharks", "Bulldogs", "Warriors", "Dolphins",
];

const POSITIONS: [&str; 5] = ["Fullback", "Wing", "Centre", "Five-Eighth", "Halfback"];

/// Demo provider: answers the same command protocol as the live feed with
/// synthesized data, so the binary runs with no data tree and no backend.
pub fn spawn_fake_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let mut rng = rand::thread_rng();
        let mut models: HashMap<(String, u32), TeamTryModel> = HashMap::new();

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::FetchSnapshot => {
                    let _ = tx.send(Delta::Log(format!(
                        "[INFO] Demo mode: synthesized Round{DEMO_ROUND}"
                    )));
                    let _ = tx.send(Delta::SetSnapshot(demo_snapshot(&mut rng)));
                    let _ = tx.send(Delta::SetHistory(demo_history(&mut rng)));
                }
                ProviderCommand::FetchImpactTable { category } => {
                    let _ = tx.send(Delta::SetImpactTable {
                        category,
                        table: demo_impact_table(&mut rng),
                        counts_fallback: false,
                    });
                }
                ProviderCommand::FetchSgmMatches => {
                    let _ = tx.send(Delta::SetSgmMatches(demo_matches()));
                }
                ProviderCommand::FetchTeamLists { match_id } => {
                    let lists = demo_team_lists(&match_id);
                    let team_ids: Vec<u32> = Side::ALL
                        .iter()
                        .filter_map(|&side| lists.team_id(side))
                        .collect();
                    let _ = tx.send(Delta::SetTeamLists(lists));
                    for team_id in team_ids {
                        let model = models
                            .entry((match_id.clone(), team_id))
                            .or_insert_with(|| demo_try_model(&mut rng, team_id))
                            .clone();
                        let _ = tx.send(Delta::SetTryModel {
                            match_id: match_id.clone(),
                            team_id,
                            model,
                        });
                    }
                }
                ProviderCommand::ComputeSgm(request) => {
                    compute_demo_sgm(&tx, &mut rng, &mut models, request);
                }
            }
        }
    });
}

fn demo_snapshot(rng: &mut impl Rng) -> RoundSnapshot {
    let rows: Vec<LadderRow> = TEAMS
        .iter()
        .enumerate()
        .map(|(idx, team)| {
            let wins = 14u32.saturating_sub(idx as u32);
            let losses = 16 - wins;
            let points = (wins * 2) as f64;
            LadderRow {
                team: (*team).to_string(),
                points,
                wins,
                draws: 0,
                losses,
                projected_points: points + rng.gen_range(6.0..14.0),
            }
        })
        .collect();

    let mut curves = HashMap::new();
    for key in OutcomeKey::ALL {
        curves.insert(key, demo_curve(key));
    }

    let predictions = (0..TEAMS.len() / 2)
        .map(|i| {
            let home_perc: f64 = rng.gen_range(0.35..0.65);
            PredictedMatch {
                home_team: TEAMS[2 * i].to_string(),
                away_team: TEAMS[2 * i + 1].to_string(),
                home_score: rng.gen_range(12.0..30.0_f64).round(),
                away_score: rng.gen_range(8.0..26.0_f64).round(),
                home_perc,
                away_perc: 1.0 - home_perc,
            }
        })
        .collect();

    RoundSnapshot {
        round: DEMO_ROUND,
        spreads: point_spreads(&rows, DEMO_ROUND),
        curves,
        predictions,
        errors: Vec::new(),
    }
}

/// A smooth S-curve over even point totals; the spoon curve slopes the
/// other way. Tails snap to 0/1 so the eligibility zone has hard edges.
fn demo_curve(key: OutcomeKey) -> ThresholdCurve {
    let points: Vec<f64> = (0..22).map(|i| 10.0 + 2.0 * i as f64).collect();
    let midpoint = match key {
        OutcomeKey::Finals => 30.0,
        OutcomeKey::Top4 => 36.0,
        OutcomeKey::MinorPremiership => 42.0,
        OutcomeKey::Spoon => 20.0,
    };
    let probs: Vec<f64> = points
        .iter()
        .map(|&p| {
            let raw = 1.0 / (1.0 + (-(p - midpoint) / 3.0).exp());
            let raw = if key == OutcomeKey::Spoon { 1.0 - raw } else { raw };
            if raw < 0.01 {
                0.0
            } else if raw > 0.99 {
                1.0
            } else {
                raw
            }
        })
        .collect();
    ThresholdCurve::from_rows(&points, &probs)
}

fn demo_history(rng: &mut impl Rng) -> MetricHistory {
    let mut history = MetricHistory::default();
    let mut series = HashMap::new();
    for team in TEAMS {
        let mut rating: f64 = rng.gen_range(75.0..90.0);
        let points = (0..=DEMO_ROUND)
            .map(|round| {
                rating += rng.gen_range(-1.5..1.5);
                MetricPoint { round, value: rating }
            })
            .collect();
        series.insert(team.to_string(), points);
    }
    history.series.insert("Total Rating".to_string(), series);
    history
}

/// Three decided matches, eight scenario columns, synthesized as a blob so
/// the demo path exercises the real parser.
fn demo_impact_table(rng: &mut impl Rng) -> SimulationTable {
    let matches = [
        (TEAMS[0], TEAMS[1]),
        (TEAMS[2], TEAMS[3]),
        (TEAMS[4], TEAMS[5]),
    ];
    let columns = 1usize << matches.len();

    let mut parsed = ParsedTable {
        header_rows: Vec::new(),
        team_rows: Vec::new(),
        counts_row: Vec::new(),
    };

    for (idx, (home, away)) in matches.iter().enumerate() {
        let mut row = vec![String::new()];
        for col in 0..columns {
            let winner = if col & (1 << idx) == 0 { home } else { away };
            row.push((*winner).to_string());
        }
        parsed.header_rows.push(row);
    }

    for team in TEAMS {
        let base: f64 = rng.gen_range(5.0..95.0);
        let mut row = vec![team.to_string()];
        for _ in 0..columns {
            let cell = (base + rng.gen_range(-5.0..5.0)).clamp(0.0, 100.0);
            row.push(format!("{cell:.1}"));
        }
        parsed.team_rows.push(row);
    }

    parsed.counts_row.push(String::new());
    for _ in 0..columns {
        parsed.counts_row.push(rng.gen_range(40u32..220).to_string());
    }

    match parse_table(&parsed.to_canonical_text()) {
        Ok(reparsed) => SimulationTable::from_parsed(&reparsed),
        Err(_) => SimulationTable::from_parsed(&parsed),
    }
}

fn demo_matches() -> Vec<RoundMatch> {
    (0..TEAMS.len() / 2)
        .map(|i| RoundMatch {
            match_id: format!("{}", 9000 + i),
            home_team: TEAMS[2 * i].to_string(),
            away_team: TEAMS[2 * i + 1].to_string(),
            date: Some("Thu, 26 Jun 2026 09:50:00 GMT".to_string()),
        })
        .collect()
}

fn demo_team_lists(match_id: &str) -> TeamLists {
    let idx = match_id
        .parse::<usize>()
        .unwrap_or(9000)
        .saturating_sub(9000)
        .min(TEAMS.len() / 2 - 1);
    let home = TEAMS[2 * idx];
    let away = TEAMS[2 * idx + 1];

    let players = |team: &str, team_id: u32| -> Vec<PlayerEntry> {
        POSITIONS
            .iter()
            .enumerate()
            .map(|(slot, pos)| PlayerEntry {
                id: team_id * 100 + slot as u32,
                name: format!("{team} {pos}"),
                position: Some((*pos).to_string()),
                team_id: Some(team_id),
            })
            .collect()
    };

    let home_id = (2 * idx + 1) as u32;
    let away_id = (2 * idx + 2) as u32;
    TeamLists {
        match_id: match_id.to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_players: players(home, home_id),
        away_players: players(away, away_id),
    }
}

/// Poisson-shaped try counts around a typical team total, with uniform-ish
/// per-player probabilities.
fn demo_try_model(rng: &mut impl Rng, team_id: u32) -> TeamTryModel {
    let mut player_probs = HashMap::new();
    for slot in 0..POSITIONS.len() as u32 {
        player_probs.insert(team_id * 100 + slot, rng.gen_range(0.12..0.55));
    }

    let lambda: f64 = rng.gen_range(3.2..5.2);
    let mut weight = (-lambda).exp();
    let mut pairs = Vec::new();
    for n in 0..=SGM_MAX_TRIES {
        if n > 0 {
            weight *= lambda / n as f64;
        }
        pairs.push((n, weight));
    }

    TeamTryModel {
        player_probs,
        try_dist: TryCountDistribution::from_pairs(pairs),
    }
}

fn compute_demo_sgm(
    tx: &Sender<Delta>,
    rng: &mut impl Rng,
    models: &mut HashMap<(String, u32), TeamTryModel>,
    request: SgmRequest,
) {
    let mut combined = 1.0;
    let mut picks_display = Vec::new();

    for side in &request.sides {
        let model = models
            .entry((request.match_id.clone(), side.team_id))
            .or_insert_with(|| demo_try_model(rng, side.team_id))
            .clone();

        let mut probs = Vec::new();
        let mut floors = Vec::new();
        for pick in &side.picks {
            if pick.min_tries == 1 {
                picks_display.push(pick.name.clone());
            } else {
                picks_display.push(format!("{} ({})", pick.name, pick.min_tries));
            }
            let Some(p) = model.player_probability(pick.player_id) else {
                continue;
            };
            probs.push(p);
            floors.push(pick.min_tries);
        }
        if probs.is_empty() {
            continue;
        }

        match sgm_math::sgm_probability(&model.try_dist, &probs, &floors, SGM_MAX_TRIES) {
            Ok(p) => combined *= p,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Demo SGM leg: {err}")));
            }
        }
    }

    let _ = tx.send(Delta::SetSgmResult {
        generation: request.generation,
        outcome: SgmOutcome {
            picks: picks_display,
            probability: combined,
            odds: sgm_math::decimal_odds(combined),
        },
    });
}
