use std::fs;
use std::path::PathBuf;

use nrl_terminal::sim_table::{OutcomeSelection, SimulationTable};
use nrl_terminal::tabular::parse_table;

fn fixture_table() -> SimulationTable {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("impact_factors.csv");
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    SimulationTable::from_parsed(&parse_table(&raw).expect("fixture should parse"))
}

#[test]
fn unfiltered_baseline_matches_hand_computed_average() {
    let table = fixture_table();
    let baseline = table.baseline();

    // Storm across all four columns, count-weighted by 120/95/140/101.
    let expect = (0.812 * 120.0 + 0.798 * 95.0 + 0.764 * 140.0 + 0.750 * 101.0) / 456.0;
    assert!((baseline[0].probability - expect).abs() < 1e-9);
}

#[test]
fn single_match_filter_keeps_consistent_columns_only() {
    let table = fixture_table();
    let selection = OutcomeSelection(vec![Some("Storm".to_string()), None]);

    let out = table.aggregate(&selection);
    let expect = (0.812 * 120.0 + 0.798 * 95.0) / 215.0;
    assert!((out[0].probability - expect).abs() < 1e-9);

    let chance = table.match_probability(&selection);
    assert!((chance - 215.0 / 456.0).abs() < 1e-9);
}

#[test]
fn fully_constrained_filter_pins_one_column() {
    let table = fixture_table();
    let selection = OutcomeSelection(vec![
        Some("broncos".to_string()),
        Some(" Sharks ".to_string()),
    ]);

    let out = table.aggregate(&selection);
    assert!((out[2].probability - 0.275).abs() < 1e-9);
    assert!((table.match_probability(&selection) - 101.0 / 456.0).abs() < 1e-9);
}

#[test]
fn contradictory_filter_returns_zero_everywhere() {
    let table = fixture_table();
    let selection = OutcomeSelection(vec![Some("Panthers".to_string()), None]);

    for row in table.aggregate(&selection) {
        assert_eq!(row.probability, 0.0);
    }
    assert_eq!(table.match_probability(&selection), 0.0);
}

#[test]
fn canonical_round_trip_reproduces_the_table() {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("impact_factors.csv");
    let raw = fs::read_to_string(path).expect("fixture file should be readable");

    let parsed = parse_table(&raw).expect("fixture should parse");
    let reparsed = parse_table(&parsed.to_canonical_text()).expect("canonical text should parse");
    assert_eq!(parsed, reparsed);
    assert_eq!(
        SimulationTable::from_parsed(&parsed),
        SimulationTable::from_parsed(&reparsed)
    );
}

#[test]
fn aggregation_is_idempotent() {
    let table = fixture_table();
    let selection = OutcomeSelection(vec![None, Some("Raiders".to_string())]);
    let first = table.aggregate(&selection);
    let second = table.aggregate(&selection);
    assert_eq!(first, second);
}
