use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::http_client::http_client;
use crate::sgm_math::TryCountDistribution;

const API_BASE_DEFAULT: &str = "https://nrl-edge-backend.onrender.com/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Home, Side::Away];

    pub fn label(self) -> &'static str {
        match self {
            Side::Home => "Home",
            Side::Away => "Away",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundMatch {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub date: Option<String>,
}

impl RoundMatch {
    /// "Thu, 26 Jun 2025 00:00:00 GMT" -> "26 Jun 2025"; anything else
    /// passes through untouched.
    pub fn short_date(&self) -> String {
        let Some(raw) = self.date.as_deref() else {
            return String::new();
        };
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        for window in tokens.windows(3) {
            let day_ok = window[0].len() == 2 && window[0].bytes().all(|b| b.is_ascii_digit());
            let month_ok = window[1].len() == 3 && window[1].bytes().all(|b| b.is_ascii_alphabetic());
            let year_ok = window[2].len() == 4 && window[2].bytes().all(|b| b.is_ascii_digit());
            if day_ok && month_ok && year_ok {
                return window.join(" ");
            }
        }
        raw.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEntry {
    pub id: u32,
    pub name: String,
    pub position: Option<String>,
    pub team_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamLists {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_players: Vec<PlayerEntry>,
    pub away_players: Vec<PlayerEntry>,
}

impl TeamLists {
    pub fn players(&self, side: Side) -> &[PlayerEntry] {
        match side {
            Side::Home => &self.home_players,
            Side::Away => &self.away_players,
        }
    }

    pub fn team_name(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    /// All of a side's players carry the same team id upstream.
    pub fn team_id(&self, side: Side) -> Option<u32> {
        self.players(side).iter().find_map(|p| p.team_id)
    }
}

/// Both halves of a team's try model. Always fetched and cached together;
/// a displayed figure never sees one half without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamTryModel {
    pub player_probs: HashMap<u32, f64>,
    pub try_dist: TryCountDistribution,
}

impl TeamTryModel {
    pub fn player_probability(&self, player_id: u32) -> Option<f64> {
        self.player_probs.get(&player_id).copied()
    }
}

/// One page-session's view of the SGM backend. The model cache is keyed by
/// (match, team); entries never expire within a session because the source
/// data is static per round, and the whole cache is dropped on round change.
#[derive(Debug)]
pub struct SgmSession {
    api_base: String,
    models: HashMap<(String, u32), TeamTryModel>,
}

impl SgmSession {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            models: HashMap::new(),
        }
    }

    pub fn from_env() -> Self {
        let base = env::var("NRL_API_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| API_BASE_DEFAULT.to_string());
        Self::new(base)
    }

    pub fn clear(&mut self) {
        self.models.clear();
    }

    pub fn cached_model(&self, match_id: &str, team_id: u32) -> Option<&TeamTryModel> {
        self.models.get(&(match_id.to_string(), team_id))
    }

    pub fn fetch_round_matches(&self) -> Result<Vec<RoundMatch>> {
        let raw = self.get("current_round_matches")?;
        parse_round_matches_json(&raw)
    }

    pub fn fetch_team_lists(&self, match_id: &str) -> Result<TeamLists> {
        let raw = self.get(&format!("match_team_lists/{match_id}"))?;
        parse_team_lists_json(match_id, &raw)
    }

    /// Joined fetch of a team's try probabilities and try distribution.
    /// Nothing is cached unless both halves arrive and parse.
    pub fn team_model(&mut self, match_id: &str, team_id: u32) -> Result<&TeamTryModel> {
        let key = (match_id.to_string(), team_id);
        if !self.models.contains_key(&key) {
            let probs_raw = self.get(&format!("player_try_probabilities/{match_id}/{team_id}"))?;
            let dist_raw = self.get(&format!("match_try_distribution/{match_id}/{team_id}"))?;
            let model = TeamTryModel {
                player_probs: parse_probability_map_json(&probs_raw)?,
                try_dist: parse_try_distribution_json(&dist_raw)?,
            };
            self.models.insert(key.clone(), model);
        }
        Ok(&self.models[&key])
    }

    fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}/{path}", self.api_base);
        let resp = http_client()?
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("http {status}: {body}"));
        }
        Ok(body)
    }
}

pub fn parse_round_matches_json(raw: &str) -> Result<Vec<RoundMatch>> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid round matches json")?;
    let mut out = Vec::new();
    if let Some(arr) = v.as_array() {
        for item in arr {
            let Some(match_id) = string_or_number(item.get("match_id")) else {
                continue;
            };
            out.push(RoundMatch {
                match_id,
                home_team: str_field(item, "home_team"),
                away_team: str_field(item, "away_team"),
                date: item
                    .get("date")
                    .and_then(|x| x.as_str())
                    .map(|s| s.to_string()),
            });
        }
    }
    Ok(out)
}

pub fn parse_team_lists_json(match_id: &str, raw: &str) -> Result<TeamLists> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid team lists json")?;
    Ok(TeamLists {
        match_id: match_id.to_string(),
        home_team: str_field(&v, "home_team"),
        away_team: str_field(&v, "away_team"),
        home_players: parse_players(v.get("home_players")),
        away_players: parse_players(v.get("away_players")),
    })
}

fn parse_players(v: Option<&Value>) -> Vec<PlayerEntry> {
    let Some(arr) = v.and_then(|x| x.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|item| {
            let id = value_u32(item.get("id"))?;
            Some(PlayerEntry {
                id,
                name: str_field(item, "name"),
                position: item
                    .get("position")
                    .and_then(|x| x.as_str())
                    .map(|s| s.to_string()),
                team_id: value_u32(item.get("team_id")),
            })
        })
        .collect()
}

/// Keys arrive as integers or strings depending on the serializer upstream;
/// both are accepted, unparseable keys are dropped.
pub fn parse_probability_map_json(raw: &str) -> Result<HashMap<u32, f64>> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid probability map json")?;
    let mut out = HashMap::new();
    if let Some(map) = v.as_object() {
        for (key, value) in map {
            let (Ok(id), Some(p)) = (key.trim().parse::<u32>(), value_f64(Some(value))) else {
                continue;
            };
            out.insert(id, p);
        }
    }
    Ok(out)
}

pub fn parse_try_distribution_json(raw: &str) -> Result<TryCountDistribution> {
    let v: Value = serde_json::from_str(raw.trim()).context("invalid try distribution json")?;
    let mut pairs = Vec::new();
    if let Some(map) = v.as_object() {
        for (key, value) in map {
            let (Ok(n), Some(p)) = (key.trim().parse::<usize>(), value_f64(Some(value))) else {
                continue;
            };
            pairs.push((n, p));
        }
    }
    Ok(TryCountDistribution::from_pairs(pairs))
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string()
}

fn string_or_number(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_u32(v: Option<&Value>) -> Option<u32> {
    match v? {
        Value::Number(n) => n.as_u64().map(|x| x as u32),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn value_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_round_matches_with_numeric_ids() {
        let raw = r#"[
            {"match_id": 4101, "home_team": "Storm", "away_team": "Broncos",
             "date": "Thu, 26 Jun 2025 00:00:00 GMT"},
            {"home_team": "orphan"}
        ]"#;
        let matches = parse_round_matches_json(raw).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_id, "4101");
        assert_eq!(matches[0].short_date(), "26 Jun 2025");
    }

    #[test]
    fn parses_team_lists_with_string_ids() {
        let raw = r#"{
            "home_team": "Storm", "away_team": "Broncos",
            "home_players": [{"id": "33", "name": "X. Coates", "position": "Wing", "team_id": 5}],
            "away_players": []
        }"#;
        let lists = parse_team_lists_json("4101", raw).unwrap();
        assert_eq!(lists.home_players.len(), 1);
        assert_eq!(lists.home_players[0].id, 33);
        assert_eq!(lists.team_id(Side::Home), Some(5));
        assert_eq!(lists.team_id(Side::Away), None);
    }

    #[test]
    fn probability_maps_accept_mixed_keys() {
        let probs = parse_probability_map_json(r#"{"33": 0.41, "oops": 0.5}"#).unwrap();
        assert_eq!(probs.len(), 1);
        assert_eq!(probs.get(&33), Some(&0.41));

        let dist = parse_try_distribution_json(r#"{"0": 0.05, "1": "0.2", "4": 0.1}"#).unwrap();
        assert_eq!(dist.probability_of(1), 0.2);
        assert_eq!(dist.probability_of(2), 0.0);
        assert_eq!(dist.probability_of(4), 0.1);
    }

    #[test]
    fn short_date_falls_through_on_odd_formats() {
        let m = RoundMatch {
            match_id: "1".into(),
            home_team: String::new(),
            away_team: String::new(),
            date: Some("2025-06-26".into()),
        };
        assert_eq!(m.short_date(), "2025-06-26");
    }
}
