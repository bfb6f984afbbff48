use crate::tabular::{parse_cell_f64, ParsedTable};

/// One round's simulation sweep for a single outcome market: per-team
/// probabilities per scenario column, plus how many simulated seasons landed
/// in each column. Column c's header is the ordered list of winner labels,
/// one per decided match.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationTable {
    pub scenario_headers: Vec<Vec<String>>,
    pub team_names: Vec<String>,
    team_probs: Vec<Vec<f64>>,
    pub counts: Vec<u64>,
}

/// Per-match winner constraints. `None` leaves that match free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeSelection(pub Vec<Option<String>>);

impl OutcomeSelection {
    pub fn unconstrained(matches: usize) -> Self {
        Self(vec![None; matches])
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.iter().all(|w| w.is_none())
    }

    /// All constrained entries must equal the column's label at the same
    /// match index, trimmed and case-insensitive.
    fn matches_column(&self, header: &[String]) -> bool {
        self.0.iter().enumerate().all(|(idx, want)| match want {
            None => true,
            Some(want) => header
                .get(idx)
                .map(|label| label.trim().eq_ignore_ascii_case(want.trim()))
                .unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamProbability {
    pub team: String,
    pub probability: f64,
}

impl SimulationTable {
    /// Build from a parsed table blob. Team cells are percentages; malformed
    /// cells stay NaN and are excluded by the aggregation. Column count is
    /// fixed by the counts row; short team rows are padded with NaN,
    /// malformed counts collapse to 0.
    pub fn from_parsed(table: &ParsedTable) -> Self {
        let columns = table.counts_row.len().saturating_sub(1);

        let scenario_headers = (0..columns)
            .map(|col| {
                table
                    .header_rows
                    .iter()
                    .map(|row| row.get(col + 1).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        let team_names = table
            .team_rows
            .iter()
            .map(|row| row.first().cloned().unwrap_or_default())
            .collect();

        let team_probs = table
            .team_rows
            .iter()
            .map(|row| {
                (0..columns)
                    .map(|col| {
                        row.get(col + 1)
                            .map(|cell| parse_cell_f64(cell) / 100.0)
                            .unwrap_or(f64::NAN)
                    })
                    .collect()
            })
            .collect();

        let counts = table.counts_row[1..]
            .iter()
            .map(|cell| cell.parse::<u64>().unwrap_or(0))
            .collect();

        Self {
            scenario_headers,
            team_names,
            team_probs,
            counts,
        }
    }

    pub fn match_count(&self) -> usize {
        self.scenario_headers
            .first()
            .map(|h| h.len())
            .unwrap_or(0)
    }

    fn matching_columns(&self, selection: &OutcomeSelection) -> Vec<usize> {
        self.scenario_headers
            .iter()
            .enumerate()
            .filter(|(_, header)| selection.matches_column(header))
            .map(|(col, _)| col)
            .collect()
    }

    /// Count-weighted average probability per team over the columns
    /// consistent with the selection. Teams whose matching cells are all
    /// NaN, and selections with no matching simulations, come back as 0.
    pub fn aggregate(&self, selection: &OutcomeSelection) -> Vec<TeamProbability> {
        let matching = self.matching_columns(selection);

        self.team_names
            .iter()
            .enumerate()
            .map(|(row, team)| {
                let mut weighted = 0.0;
                let mut total = 0u64;
                for &col in &matching {
                    let cell = self.team_probs[row][col];
                    if !cell.is_finite() {
                        continue;
                    }
                    weighted += cell * self.counts[col] as f64;
                    total += self.counts[col];
                }
                TeamProbability {
                    team: team.clone(),
                    probability: if total > 0 {
                        weighted / total as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect()
    }

    /// The unfiltered weighted average, used as the gain/loss baseline.
    pub fn baseline(&self) -> Vec<TeamProbability> {
        self.aggregate(&OutcomeSelection::unconstrained(self.match_count()))
    }

    /// Chance of every selected outcome occurring: matching simulation count
    /// over total simulation count. 0 for a degenerate (all-zero) table.
    pub fn match_probability(&self, selection: &OutcomeSelection) -> f64 {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let matching: u64 = self
            .matching_columns(selection)
            .iter()
            .map(|&col| self.counts[col])
            .sum();
        matching as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::parse_table;

    fn fixture() -> SimulationTable {
        let blob = "\
,Storm,Storm,Panthers\n\
Storm,10.0,20.0,30.0\n\
Broncos,80.0,60.0,40.0\n\
,10,20,30\n";
        SimulationTable::from_parsed(&parse_table(blob).unwrap())
    }

    #[test]
    fn unfiltered_aggregate_is_global_weighted_average() {
        let table = fixture();
        let out = table.aggregate(&OutcomeSelection::unconstrained(1));
        // counts 10/20/30 against 0.1/0.2/0.3 -> 14/60.
        assert!((out[0].probability - 14.0 / 60.0).abs() < 1e-12);
        assert!((out[1].probability - (8.0 + 12.0 + 12.0) / 60.0).abs() < 1e-12);
    }

    #[test]
    fn selection_filters_columns_case_insensitively() {
        let table = fixture();
        let sel = OutcomeSelection(vec![Some(" storm ".to_string())]);
        let out = table.aggregate(&sel);
        // Columns 0 and 1 match; weighted (0.1*10 + 0.2*20) / 30.
        assert!((out[0].probability - 5.0 / 30.0).abs() < 1e-12);
        assert!((table.match_probability(&sel) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn no_matching_columns_yields_zero() {
        let table = fixture();
        let sel = OutcomeSelection(vec![Some("Raiders".to_string())]);
        for row in table.aggregate(&sel) {
            assert_eq!(row.probability, 0.0);
        }
        assert_eq!(table.match_probability(&sel), 0.0);
    }

    #[test]
    fn zero_count_table_degenerates_to_zero() {
        let blob = ",Storm\nStorm,50.0\n,0\n";
        let table = SimulationTable::from_parsed(&parse_table(blob).unwrap());
        assert_eq!(table.aggregate(&OutcomeSelection::unconstrained(1))[0].probability, 0.0);
        assert_eq!(
            table.match_probability(&OutcomeSelection::unconstrained(1)),
            0.0
        );
    }

    #[test]
    fn nan_cells_are_excluded_from_both_sides_of_the_average() {
        let blob = ",Storm,Panthers\nStorm,30.0,bad\n,10,30\n";
        let table = SimulationTable::from_parsed(&parse_table(blob).unwrap());
        let out = table.aggregate(&OutcomeSelection::unconstrained(1));
        // Only the 0.3 cell counts, weighted solely by its own column.
        assert!((out[0].probability - 0.3).abs() < 1e-12);
    }

    #[test]
    fn aggregate_is_pure() {
        let table = fixture();
        let sel = OutcomeSelection(vec![Some("Storm".to_string())]);
        assert_eq!(table.aggregate(&sel), table.aggregate(&sel));
    }
}
