use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use chrono::Local;

use crate::magic::OutcomeKey;
use crate::round_data::{self, DataSource};
use crate::sgm_math;
use crate::sgm_session::SgmSession;
use crate::state::{Delta, ProviderCommand, SgmOutcome, SgmRequest, SGM_MAX_TRIES};

/// The live provider: owns all I/O, drains commands from the UI thread and
/// answers with deltas. Every failure degrades to a `[WARN]` log line.
pub fn spawn_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let source = DataSource::from_env();
        let mut session = SgmSession::from_env();
        let mut current_round: Option<u32> = None;

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::FetchSnapshot => {
                    fetch_snapshot(&tx, &source, &mut session, &mut current_round);
                }
                ProviderCommand::FetchImpactTable { category } => {
                    fetch_impact_table(&tx, &source, current_round, category);
                }
                ProviderCommand::FetchSgmMatches => match session.fetch_round_matches() {
                    Ok(matches) => {
                        let _ = tx.send(Delta::SetSgmMatches(matches));
                    }
                    Err(err) => {
                        let _ = tx.send(Delta::Log(format!("[WARN] Round matches: {err:#}")));
                    }
                },
                ProviderCommand::FetchTeamLists { match_id } => {
                    fetch_team_lists(&tx, &mut session, &match_id);
                }
                ProviderCommand::ComputeSgm(request) => {
                    compute_sgm(&tx, &mut session, request);
                }
            }
        }
    });
}

fn fetch_snapshot(
    tx: &Sender<Delta>,
    source: &DataSource,
    session: &mut SgmSession,
    current_round: &mut Option<u32>,
) {
    let Some(round) = round_data::latest_round(source) else {
        let _ = tx.send(Delta::Log(
            "[WARN] No published round found in data source".to_string(),
        ));
        return;
    };
    if *current_round != Some(round) {
        // Session cache is scoped to one round's static data.
        session.clear();
        *current_round = Some(round);
    }

    let snapshot = round_data::fetch_round_snapshot(source, round);
    let _ = tx.send(Delta::Log(format!(
        "[INFO] Loaded Round{round} snapshot at {}",
        Local::now().format("%H:%M:%S")
    )));
    let _ = tx.send(Delta::SetSnapshot(snapshot));

    let history = round_data::fetch_metric_history(source, round);
    let _ = tx.send(Delta::SetHistory(history));
}

fn fetch_impact_table(
    tx: &Sender<Delta>,
    source: &DataSource,
    current_round: Option<u32>,
    category: OutcomeKey,
) {
    let Some(round) = current_round else {
        let _ = tx.send(Delta::Log(
            "[WARN] Impact table requested before any round was loaded".to_string(),
        ));
        return;
    };
    match round_data::fetch_impact_table(source, round, category) {
        Ok((table, counts_fallback)) => {
            let _ = tx.send(Delta::SetImpactTable {
                category,
                table,
                counts_fallback,
            });
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!(
                "[WARN] {} table: {err:#}",
                category.label()
            )));
        }
    }
}

fn fetch_team_lists(tx: &Sender<Delta>, session: &mut SgmSession, match_id: &str) {
    let lists = match session.fetch_team_lists(match_id) {
        Ok(lists) => lists,
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Team lists: {err:#}")));
            return;
        }
    };

    // Warm both sides' try models so the anytime column fills in without a
    // pick being made first. Each side degrades independently.
    let team_ids: Vec<u32> = crate::sgm_session::Side::ALL
        .iter()
        .filter_map(|&side| lists.team_id(side))
        .collect();
    let _ = tx.send(Delta::SetTeamLists(lists));

    for team_id in team_ids {
        match session.team_model(match_id, team_id) {
            Ok(model) => {
                let _ = tx.send(Delta::SetTryModel {
                    match_id: match_id.to_string(),
                    team_id,
                    model: model.clone(),
                });
            }
            Err(err) => {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] Try model for team {team_id}: {err:#}"
                )));
            }
        }
    }
}

/// Both sides' legs resolve against cached (or freshly joined) try models,
/// then combine as independent legs. A side that cannot be priced stays
/// neutral rather than sinking the whole multi.
fn compute_sgm(tx: &Sender<Delta>, session: &mut SgmSession, request: SgmRequest) {
    let mut combined = 1.0;
    let mut picks_display = Vec::new();

    for side in &request.sides {
        for pick in &side.picks {
            if pick.min_tries == 1 {
                picks_display.push(pick.name.clone());
            } else {
                picks_display.push(format!("{} ({})", pick.name, pick.min_tries));
            }
        }

        let model = match session.team_model(&request.match_id, side.team_id) {
            Ok(model) => model.clone(),
            Err(err) => {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] SGM model for team {}: {err:#}",
                    side.team_id
                )));
                continue;
            }
        };

        let mut probs = Vec::with_capacity(side.picks.len());
        let mut floors = Vec::with_capacity(side.picks.len());
        for pick in &side.picks {
            let Some(p) = model.player_probability(pick.player_id) else {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] No try probability for {}, pick skipped",
                    pick.name
                )));
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
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] SGM leg for team {}: {err}",
                    side.team_id
                )));
            }
        }
    }

    let outcome = SgmOutcome {
        picks: picks_display,
        probability: combined,
        odds: sgm_math::decimal_odds(combined),
    };
    let _ = tx.send(Delta::SetSgmResult {
        generation: request.generation,
        outcome,
    });
}
