use std::fs;
use std::path::PathBuf;

use nrl_terminal::ladder::{ladder_rows, point_spreads, ResultsSheet};
use nrl_terminal::magic::{parse_outcome_curves, OutcomeKey};
use nrl_terminal::predictions::parse_predictions;
use nrl_terminal::sim_table::SimulationTable;
use nrl_terminal::tabular::parse_table;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_impact_factors_fixture() {
    let raw = read_fixture("impact_factors.csv");
    let parsed = parse_table(&raw).expect("fixture should parse");
    assert_eq!(parsed.header_rows.len(), 2);
    assert_eq!(parsed.team_rows.len(), 3);
    assert_eq!(parsed.counts_row[1], "120");

    let table = SimulationTable::from_parsed(&parsed);
    assert_eq!(table.team_names, vec!["Storm", "Broncos", "Raiders"]);
    assert_eq!(table.match_count(), 2);
    assert_eq!(table.counts, vec![120, 95, 140, 101]);
    assert_eq!(
        table.scenario_headers[1],
        vec!["Storm".to_string(), "Sharks".to_string()]
    );
}

#[test]
fn parses_magic_numbers_fixture() {
    let raw = read_fixture("magic_numbers.csv");
    let curves = parse_outcome_curves(&raw);
    assert_eq!(curves.len(), 4);

    let finals = &curves[&OutcomeKey::Finals];
    assert_eq!(finals.magic_number(), Some(24.0));
    let zone = finals.eligible_zone().expect("finals should be live");
    assert_eq!((zone.min, zone.max), (24.0, 32.0));

    let spoon = &curves[&OutcomeKey::Spoon];
    assert_eq!(spoon.spoon_number(), Some(14.0));
    let zone = spoon.eligible_zone().expect("spoon should be live");
    assert_eq!((zone.min, zone.max), (16.0, 24.0));
}

#[test]
fn parses_results_fixture_into_spreads() {
    let raw = read_fixture("results.csv");
    let sheet = ResultsSheet::parse(&raw).expect("sheet should parse");
    let rows = ladder_rows(&sheet);
    assert_eq!(rows.len(), 4);

    let spreads = point_spreads(&rows, 18);
    let storm = &spreads[0];
    // 16 games over 18 rounds: two byes worth two points each.
    assert_eq!(storm.current, 34.0);
    assert_eq!(storm.min, 36.0);
    assert_eq!(storm.projected, 50.5);
    assert_eq!(storm.max, 52.0);
}

#[test]
fn parses_predictions_fixture() {
    let raw = read_fixture("predictions.txt");
    let (matches, errors) = parse_predictions(&raw);
    assert!(errors.is_empty());
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].predicted_winner(), Some("Storm"));
    assert_eq!(matches[1].expected_total(), 40.0);
}
