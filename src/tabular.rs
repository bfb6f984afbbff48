use thiserror::Error;

/// Shape problems a simulation-table blob can have. Both are soft-recoverable
/// at the feed layer; see `parse_table_lenient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TableShapeError {
    #[error("no team row found (non-empty label followed by a numeric cell)")]
    HeaderNotFound,
    #[error("no counts row found after the team rows")]
    CountsRowNotFound,
}

pub const DEFAULT_DELIMITER: char = ',';

/// A loosely-structured table split into its three blocks: a variable-height
/// header block (one winner label per decided match, per scenario column),
/// the team rows, and the trailing simulation-counts row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub header_rows: Vec<Vec<String>>,
    pub team_rows: Vec<Vec<String>>,
    pub counts_row: Vec<String>,
}

impl ParsedTable {
    /// Canonical comma-joined serialization. Feeding this back through
    /// `parse_table` reproduces the identical structure.
    pub fn to_canonical_text(&self) -> String {
        let mut out = String::new();
        for row in self
            .header_rows
            .iter()
            .chain(self.team_rows.iter())
            .chain(std::iter::once(&self.counts_row))
        {
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

/// Split a raw blob into trimmed cells. Rows that are entirely empty
/// (blank lines, stray trailing newlines) are dropped.
pub fn split_rows(raw: &str, delimiter: char) -> Vec<Vec<String>> {
    raw.lines()
        .map(|line| {
            line.split(delimiter)
                .map(|cell| cell.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|cells: &Vec<String>| cells.iter().any(|c| !c.is_empty()))
        .collect()
}

/// Tolerant numeric cell parse: empty, "-", or malformed cells come back as
/// NaN so callers can exclude them from aggregation without aborting the row.
pub fn parse_cell_f64(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return f64::NAN;
    }
    let s = s.trim_end_matches('%');
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// A counts cell is a full-string non-negative integer; "12.0", "12%" and
/// "" all fail.
fn is_count_cell(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

fn is_team_row(row: &[String]) -> bool {
    let Some(label) = row.first() else {
        return false;
    };
    if label.is_empty() {
        return false;
    }
    row.get(1)
        .map(|cell| parse_cell_f64(cell).is_finite())
        .unwrap_or(false)
}

fn is_counts_row(row: &[String]) -> bool {
    row.len() > 1 && row[1..].iter().all(|cell| is_count_cell(cell))
}

/// Strict layout detection, default comma delimiter.
pub fn parse_table(raw: &str) -> Result<ParsedTable, TableShapeError> {
    parse_table_with(raw, DEFAULT_DELIMITER)
}

pub fn parse_table_with(raw: &str, delimiter: char) -> Result<ParsedTable, TableShapeError> {
    let rows = split_rows(raw, delimiter);

    let header_height = rows
        .iter()
        .position(|row| is_team_row(row))
        .ok_or(TableShapeError::HeaderNotFound)?;

    let counts_index = rows
        .iter()
        .enumerate()
        .position(|(idx, row)| idx > header_height && is_counts_row(row))
        .ok_or(TableShapeError::CountsRowNotFound)?;

    Ok(ParsedTable {
        header_rows: rows[..header_height].to_vec(),
        team_rows: rows[header_height..counts_index].to_vec(),
        counts_row: rows[counts_index].clone(),
    })
}

/// Lenient variant for the feed layer: when no integer-only counts row is
/// found, the last row is treated as the counts row (malformed cells there
/// become NaN downstream). Returns whether the fallback engaged so the
/// caller can surface a warning. A missing header block stays fatal.
pub fn parse_table_lenient(raw: &str) -> Result<(ParsedTable, bool), TableShapeError> {
    match parse_table(raw) {
        Ok(table) => Ok((table, false)),
        Err(TableShapeError::HeaderNotFound) => Err(TableShapeError::HeaderNotFound),
        Err(TableShapeError::CountsRowNotFound) => {
            let rows = split_rows(raw, DEFAULT_DELIMITER);
            let header_height = rows
                .iter()
                .position(|row| is_team_row(row))
                .ok_or(TableShapeError::HeaderNotFound)?;
            if rows.len() <= header_height + 1 {
                return Err(TableShapeError::CountsRowNotFound);
            }
            let counts_index = rows.len() - 1;
            Ok((
                ParsedTable {
                    header_rows: rows[..header_height].to_vec(),
                    team_rows: rows[header_height..counts_index].to_vec(),
                    counts_row: rows[counts_index].clone(),
                },
                true,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: &str = "\
,Storm,Storm,Panthers,Panthers\n\
,Broncos,Raiders,Broncos,Raiders\n\
Storm,81.2,79.9,76.4,75.0\n\
Broncos,55.0,49.1,58.3,51.7\n\
,120,95,140,101\n";

    #[test]
    fn detects_header_team_and_counts_blocks() {
        let table = parse_table(BLOB).unwrap();
        assert_eq!(table.header_rows.len(), 2);
        assert_eq!(table.team_rows.len(), 2);
        assert_eq!(table.team_rows[0][0], "Storm");
        assert_eq!(table.counts_row[1], "120");
    }

    #[test]
    fn trailing_blank_lines_are_ignored() {
        let padded = format!("{BLOB}\n\n,,,\n");
        assert_eq!(parse_table(&padded).unwrap(), parse_table(BLOB).unwrap());
    }

    #[test]
    fn round_trips_through_canonical_text() {
        let table = parse_table(BLOB).unwrap();
        let again = parse_table(&table.to_canonical_text()).unwrap();
        assert_eq!(table, again);
    }

    #[test]
    fn missing_counts_row_is_reported() {
        let blob = ",Storm\nStorm,81.2\nBroncos,55.0\n";
        assert_eq!(parse_table(blob), Err(TableShapeError::CountsRowNotFound));
    }

    #[test]
    fn lenient_falls_back_to_last_row_for_counts() {
        let blob = ",Storm,Panthers\nStorm,81.2,76.4\nBroncos,55.0,58.3\n";
        let (table, fell_back) = parse_table_lenient(blob).unwrap();
        assert!(fell_back);
        assert_eq!(table.counts_row[0], "Broncos");
        assert_eq!(table.team_rows.len(), 1);
    }

    #[test]
    fn header_not_found_stays_fatal_in_lenient_mode() {
        let blob = ",only,labels\n,more,labels\n";
        assert_eq!(
            parse_table_lenient(blob),
            Err(TableShapeError::HeaderNotFound)
        );
    }

    #[test]
    fn counts_cells_must_be_whole_integers() {
        assert!(is_count_cell("120"));
        assert!(!is_count_cell("120.5"));
        assert!(!is_count_cell("12%"));
        assert!(!is_count_cell(""));
    }

    #[test]
    fn malformed_numeric_cell_parses_to_nan() {
        assert!(parse_cell_f64("n/a").is_nan());
        assert!(parse_cell_f64("").is_nan());
        assert_eq!(parse_cell_f64("58%"), 58.0);
        assert_eq!(parse_cell_f64(" 1.72 "), 1.72);
    }
}
