use std::collections::{HashMap, VecDeque};

use crate::ladder::TeamPointSpread;
use crate::magic::{OutcomeKey, PointZone};
use crate::predictions::PredictedMatch;
use crate::round_data::RoundSnapshot;
use crate::sgm_math;
use crate::sgm_session::{RoundMatch, Side, TeamLists, TeamTryModel};
use crate::sim_table::{OutcomeSelection, SimulationTable, TeamProbability};
use crate::tracker::MetricHistory;

/// Marginalization caps: anytime markets look at the full modeled tail,
/// the SGM engine stops where the distributions upstream stop carrying mass.
pub const ANYTIME_MAX_TRIES: usize = 20;
pub const SGM_MAX_TRIES: usize = 12;
/// UI bound on a single player's minimum-tries pick.
pub const MAX_PICK_TRIES: usize = 5;

const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Ladder,
    Impact,
    Tryscorer,
}

/// One bar of the Impact chart: unfiltered baseline vs the probability
/// under the current winner selections, both in [0,1].
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactRow {
    pub team: String,
    pub base: f64,
    pub current: f64,
}

impl ImpactRow {
    pub fn gain(&self) -> f64 {
        (self.current - self.base).max(0.0)
    }

    pub fn loss(&self) -> f64 {
        (self.base - self.current).max(0.0)
    }

    /// The stacked-bar floor: whichever of base/current is lower.
    pub fn floor(&self) -> f64 {
        self.current.min(self.base)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SgmOutcome {
    pub picks: Vec<String>,
    pub probability: f64,
    pub odds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPick {
    pub player_id: u32,
    pub name: String,
    pub min_tries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgmSideRequest {
    pub team_id: u32,
    pub picks: Vec<PlayerPick>,
}

/// A compute request frozen at one selection state. The generation token is
/// echoed back with the result; anything computed for an older generation
/// is discarded on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgmRequest {
    pub generation: u64,
    pub match_id: String,
    pub sides: Vec<SgmSideRequest>,
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetSnapshot(RoundSnapshot),
    SetHistory(MetricHistory),
    SetImpactTable {
        category: OutcomeKey,
        table: SimulationTable,
        counts_fallback: bool,
    },
    SetSgmMatches(Vec<RoundMatch>),
    SetTeamLists(TeamLists),
    SetTryModel {
        match_id: String,
        team_id: u32,
        model: TeamTryModel,
    },
    SetSgmResult {
        generation: u64,
        outcome: SgmOutcome,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    FetchSnapshot,
    FetchImpactTable { category: OutcomeKey },
    FetchSgmMatches,
    FetchTeamLists { match_id: String },
    ComputeSgm(SgmRequest),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,

    pub round: Option<u32>,
    pub spreads: Vec<TeamPointSpread>,
    pub zones: HashMap<OutcomeKey, PointZone>,
    pub magic_numbers: HashMap<OutcomeKey, f64>,
    pub history: MetricHistory,
    pub ladder_selected: usize,

    pub impact_category: OutcomeKey,
    pub impact_tables: HashMap<OutcomeKey, SimulationTable>,
    pub impact_matches: Vec<PredictedMatch>,
    pub impact_selection: Vec<Option<String>>,
    pub impact_selected: usize,
    pub impact_rows: Vec<ImpactRow>,
    pub selection_chance: f64,
    // Keyed by outcome category: recomputed when the category's table
    // changes, reused across per-match filter edits.
    impact_baselines: HashMap<OutcomeKey, Vec<TeamProbability>>,

    pub sgm_matches: Vec<RoundMatch>,
    pub sgm_match_selected: usize,
    pub team_lists: Option<TeamLists>,
    pub try_models: HashMap<(String, u32), TeamTryModel>,
    pub anytime: HashMap<u32, f64>,
    pub picks: HashMap<u32, usize>,
    pub side_focus: Side,
    pub player_selected: usize,
    pub sgm_generation: u64,
    pub sgm_result: Option<SgmOutcome>,
    pub sgm_pending: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Ladder,
            help_overlay: false,
            logs: VecDeque::with_capacity(LOG_CAPACITY),
            round: None,
            spreads: Vec::new(),
            zones: HashMap::new(),
            magic_numbers: HashMap::new(),
            history: MetricHistory::default(),
            ladder_selected: 0,
            impact_category: OutcomeKey::Finals,
            impact_tables: HashMap::new(),
            impact_matches: Vec::new(),
            impact_selection: Vec::new(),
            impact_selected: 0,
            impact_rows: Vec::new(),
            selection_chance: 0.0,
            impact_baselines: HashMap::new(),
            sgm_matches: Vec::new(),
            sgm_match_selected: 0,
            team_lists: None,
            try_models: HashMap::new(),
            anytime: HashMap::new(),
            picks: HashMap::new(),
            side_focus: Side::Home,
            player_selected: 0,
            sgm_generation: 0,
            sgm_result: None,
            sgm_pending: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        if self.logs.len() >= LOG_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(msg.into());
    }

    pub fn selected_sgm_match(&self) -> Option<&RoundMatch> {
        self.sgm_matches.get(self.sgm_match_selected)
    }

    /// Advance the Impact screen's outcome market. The new category's table
    /// may still be in flight; rows clear until it lands.
    pub fn cycle_outcome_category(&mut self) -> OutcomeKey {
        let all = OutcomeKey::ALL;
        let pos = all
            .iter()
            .position(|k| *k == self.impact_category)
            .unwrap_or(0);
        self.impact_category = all[(pos + 1) % all.len()];
        self.recompute_impact();
        self.impact_category
    }

    /// Cycle the selected match's constraint: free -> home wins -> away
    /// wins -> free.
    pub fn cycle_winner(&mut self) {
        let Some((home, away)) = self
            .impact_matches
            .get(self.impact_selected)
            .map(|m| (m.home_team.clone(), m.away_team.clone()))
        else {
            return;
        };
        if self.impact_selection.len() < self.impact_matches.len() {
            self.impact_selection
                .resize(self.impact_matches.len(), None);
        }
        let slot = &mut self.impact_selection[self.impact_selected];
        *slot = match slot.as_deref() {
            None => Some(home),
            Some(w) if w == home => Some(away),
            Some(_) => None,
        };
        self.recompute_impact();
    }

    pub fn clear_winner_selection(&mut self) {
        self.impact_selection = vec![None; self.impact_matches.len()];
        self.recompute_impact();
    }

    /// Re-derive the Impact rows from the active table and selection. Pure
    /// over in-memory data; the per-category baseline is computed at most
    /// once per table.
    pub fn recompute_impact(&mut self) {
        let Some(table) = self.impact_tables.get(&self.impact_category) else {
            self.impact_rows.clear();
            self.selection_chance = 0.0;
            return;
        };

        let mut winners = self.impact_selection.clone();
        winners.resize(table.match_count(), None);
        let selection = OutcomeSelection(winners);

        let current = table.aggregate(&selection);
        self.selection_chance = table.match_probability(&selection);
        let baseline = self
            .impact_baselines
            .entry(self.impact_category)
            .or_insert_with(|| table.baseline());

        self.impact_rows = current
            .into_iter()
            .zip(baseline.iter())
            .map(|(now, base)| ImpactRow {
                team: now.team,
                base: base.probability,
                current: now.probability,
            })
            .collect();
    }

    /// Bump the selected player's minimum-tries pick by `delta`, clamped to
    /// [0, MAX_PICK_TRIES] and at most MAX_LEGS picked players per side.
    pub fn adjust_pick(&mut self, delta: i64) -> bool {
        let (player_id, side_picked) = {
            let Some(lists) = self.team_lists.as_ref() else {
                return false;
            };
            let players = lists.players(self.side_focus);
            let Some(player) = players.get(self.player_selected) else {
                return false;
            };
            let picked = players
                .iter()
                .filter(|p| self.picks.get(&p.id).copied().unwrap_or(0) > 0)
                .count();
            (player.id, picked)
        };

        let current = self.picks.get(&player_id).copied().unwrap_or(0) as i64;
        let next = (current + delta).clamp(0, MAX_PICK_TRIES as i64) as usize;
        if next == current as usize {
            return false;
        }
        if next > 0 && current == 0 && side_picked >= sgm_math::MAX_LEGS {
            self.push_log(format!(
                "[WARN] At most {} picked players per side",
                sgm_math::MAX_LEGS
            ));
            return false;
        }

        if next == 0 {
            self.picks.remove(&player_id);
        } else {
            self.picks.insert(player_id, next);
        }
        true
    }

    /// Freeze the current picks into a compute request under a fresh
    /// generation. None when nothing is picked (the result clears instead).
    pub fn build_sgm_request(&mut self) -> Option<SgmRequest> {
        let lists = self.team_lists.clone()?;
        let match_id = lists.match_id.clone();

        let mut sides = Vec::new();
        for side in Side::ALL {
            let picks: Vec<PlayerPick> = lists
                .players(side)
                .iter()
                .filter_map(|p| {
                    let min_tries = self.picks.get(&p.id).copied().unwrap_or(0);
                    (min_tries > 0).then(|| PlayerPick {
                        player_id: p.id,
                        name: p.name.clone(),
                        min_tries,
                    })
                })
                .collect();
            if picks.is_empty() {
                continue;
            }
            let Some(team_id) = lists.team_id(side) else {
                self.push_log(format!(
                    "[WARN] No team id for {} side, picks ignored",
                    side.label()
                ));
                continue;
            };
            sides.push(SgmSideRequest { team_id, picks });
        }

        self.sgm_generation += 1;
        if sides.is_empty() {
            self.sgm_result = None;
            self.sgm_pending = false;
            return None;
        }
        self.sgm_pending = true;
        Some(SgmRequest {
            generation: self.sgm_generation,
            match_id,
            sides,
        })
    }

    fn reset_round_derived(&mut self) {
        self.impact_tables.clear();
        self.impact_baselines.clear();
        self.impact_rows.clear();
        self.selection_chance = 0.0;
        self.try_models.clear();
        self.anytime.clear();
        self.picks.clear();
        self.team_lists = None;
        self.sgm_result = None;
        self.sgm_pending = false;
        self.sgm_generation += 1;
    }

    fn recompute_anytime(&mut self) {
        self.anytime.clear();
        let Some(lists) = self.team_lists.clone() else {
            return;
        };
        let match_id = lists.match_id.clone();
        for side in Side::ALL {
            let Some(team_id) = lists.team_id(side) else {
                continue;
            };
            let Some(model) = self.try_models.get(&(match_id.clone(), team_id)).cloned() else {
                continue;
            };
            for player in lists.players(side) {
                let Some(p) = model.player_probability(player.id) else {
                    continue;
                };
                match sgm_math::anytime_probability(p, &model.try_dist, ANYTIME_MAX_TRIES) {
                    Ok(prob) => {
                        self.anytime.insert(player.id, prob);
                    }
                    Err(err) => {
                        self.push_log(format!(
                            "[WARN] Anytime calc for {}: {err}",
                            player.name
                        ));
                    }
                }
            }
        }
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetSnapshot(snapshot) => {
            let round_changed = state.round != Some(snapshot.round);
            state.round = Some(snapshot.round);
            state.spreads = snapshot.spreads;

            state.zones.clear();
            state.magic_numbers.clear();
            for (key, curve) in &snapshot.curves {
                if let Some(zone) = curve.eligible_zone() {
                    state.zones.insert(*key, zone);
                }
                let number = match key {
                    OutcomeKey::Spoon => curve.spoon_number(),
                    _ => curve.magic_number(),
                };
                if let Some(number) = number {
                    state.magic_numbers.insert(*key, number);
                }
            }

            state.impact_matches = snapshot.predictions;
            state.impact_selection = vec![None; state.impact_matches.len()];
            state.impact_selected = 0;

            if round_changed {
                state.reset_round_derived();
            }
            for err in snapshot.errors {
                state.push_log(format!("[WARN] {err}"));
            }
        }
        Delta::SetHistory(history) => {
            for warning in &history.warnings {
                state.push_log(format!("[INFO] {warning}"));
            }
            state.history = history;
        }
        Delta::SetImpactTable {
            category,
            table,
            counts_fallback,
        } => {
            if counts_fallback {
                state.push_log(format!(
                    "[WARN] {} table had no counts row, used last row",
                    category.label()
                ));
            }
            state.impact_tables.insert(category, table);
            // The baseline belongs to the replaced table.
            state.impact_baselines.remove(&category);
            state.recompute_impact();
        }
        Delta::SetSgmMatches(matches) => {
            state.sgm_matches = matches;
            state.sgm_match_selected = state
                .sgm_match_selected
                .min(state.sgm_matches.len().saturating_sub(1));
        }
        Delta::SetTeamLists(lists) => {
            state.team_lists = Some(lists);
            state.picks.clear();
            state.player_selected = 0;
            state.side_focus = Side::Home;
            state.sgm_result = None;
            state.sgm_pending = false;
            state.sgm_generation += 1;
            state.recompute_anytime();
        }
        Delta::SetTryModel {
            match_id,
            team_id,
            model,
        } => {
            state.try_models.insert((match_id, team_id), model);
            state.recompute_anytime();
        }
        Delta::SetSgmResult { generation, outcome } => {
            if generation != state.sgm_generation {
                state.push_log(format!(
                    "[INFO] Dropped stale SGM result (gen {generation} != {})",
                    state.sgm_generation
                ));
                return;
            }
            state.sgm_result = Some(outcome);
            state.sgm_pending = false;
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
