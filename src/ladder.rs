use crate::tabular::{parse_cell_f64, split_rows, DEFAULT_DELIMITER};

/// Competition points awarded for a bye week.
pub const BYE_POINTS: f64 = 2.0;
/// Games each team plays across the home-and-away season.
pub const SEASON_GAMES: u32 = 24;
/// End-of-season bye bonus already baked into projected/zone point
/// encodings upstream. Applied where the source applies it, never derived.
pub const FINAL_BYE_BONUS: f64 = 6.0;

/// A results.csv parsed as a header row plus data rows, with column lookup
/// by header name. The tracker reads metric columns straight off this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultsSheet {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut rows = split_rows(raw, DEFAULT_DELIMITER);
        if rows.is_empty() {
            return None;
        }
        let headers = rows.remove(0);
        Some(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
    }

    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column(name)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LadderRow {
    pub team: String,
    pub points: f64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub projected_points: f64,
}

impl LadderRow {
    pub fn games_played(&self) -> u32 {
        self.wins + self.draws + self.losses
    }
}

/// Per-team point span for the ladder chart: where the team sits now and
/// the floor/projection/ceiling of where it can finish.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamPointSpread {
    pub team: String,
    pub current: f64,
    pub min: f64,
    pub projected: f64,
    pub max: f64,
}

/// Rows missing a team name, points, or projection are dropped rather than
/// failing the sheet; count cells default to zero.
pub fn ladder_rows(sheet: &ResultsSheet) -> Vec<LadderRow> {
    sheet
        .rows
        .iter()
        .filter_map(|row| {
            let team = sheet.cell(row, "Team")?.trim();
            if team.is_empty() {
                return None;
            }
            let points = parse_cell_f64(sheet.cell(row, "Points")?);
            let projected = parse_cell_f64(sheet.cell(row, "Projected Points")?);
            if !points.is_finite() || !projected.is_finite() {
                return None;
            }
            Some(LadderRow {
                team: team.to_string(),
                points,
                wins: parse_count(sheet.cell(row, "Wins")),
                draws: parse_count(sheet.cell(row, "Draws")),
                losses: parse_count(sheet.cell(row, "Losses")),
                projected_points: projected,
            })
        })
        .collect()
}

fn parse_count(cell: Option<&str>) -> u32 {
    cell.and_then(|c| c.trim().parse::<u32>().ok()).unwrap_or(0)
}

/// Derive the chart spans for the given round. Byes played so far are the
/// rounds a team did not take the field; each is worth two points that the
/// raw Points column has not credited yet.
pub fn point_spreads(rows: &[LadderRow], current_round: u32) -> Vec<TeamPointSpread> {
    rows.iter()
        .map(|row| {
            let games = row.games_played();
            let byes_played = current_round.saturating_sub(games) as f64;
            let games_left = SEASON_GAMES.saturating_sub(games) as f64;
            TeamPointSpread {
                team: row.team.clone(),
                current: row.points + BYE_POINTS * byes_played,
                min: row.points + FINAL_BYE_BONUS,
                projected: row.projected_points + FINAL_BYE_BONUS,
                max: row.points + BYE_POINTS * games_left + FINAL_BYE_BONUS,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
Rank,Team,Points,Wins,Draws,Losses,Projected Points,Total Rating\n\
1,Storm,30,14,0,2,44.5,87.2\n\
2,Broncos,26,12,0,4,40.0,81.0\n\
,,,,,,\n";

    #[test]
    fn parses_rows_by_header_name() {
        let sheet = ResultsSheet::parse(SHEET).unwrap();
        let rows = ladder_rows(&sheet);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].team, "Storm");
        assert_eq!(rows[0].points, 30.0);
        assert_eq!(rows[0].games_played(), 16);
    }

    #[test]
    fn spreads_apply_bye_and_bonus_adjustments() {
        let sheet = ResultsSheet::parse(SHEET).unwrap();
        let spreads = point_spreads(&ladder_rows(&sheet), 18);
        let storm = &spreads[0];
        // 16 games over 18 rounds: two byes played, eight games left.
        assert_eq!(storm.current, 30.0 + 2.0 * 2.0);
        assert_eq!(storm.min, 36.0);
        assert_eq!(storm.projected, 50.5);
        assert_eq!(storm.max, 30.0 + 2.0 * 8.0 + 6.0);
    }

    #[test]
    fn rows_without_projection_are_dropped() {
        let raw = "Team,Points,Projected Points\nStorm,30,\nBroncos,26,40\n";
        let sheet = ResultsSheet::parse(raw).unwrap();
        let rows = ladder_rows(&sheet);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].team, "Broncos");
    }

    #[test]
    fn empty_sheet_is_none() {
        assert!(ResultsSheet::parse("").is_none());
    }
}
