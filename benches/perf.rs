use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use nrl_terminal::sgm_math::{multinomial_at_least, sgm_probability, TryCountDistribution};
use nrl_terminal::sim_table::{OutcomeSelection, SimulationTable};
use nrl_terminal::tabular::parse_table;

const IMPACT_CSV: &str = include_str!("../tests/fixtures/impact_factors.csv");

fn bench_table_parse(c: &mut Criterion) {
    c.bench_function("impact_table_parse", |b| {
        b.iter(|| {
            let parsed = parse_table(black_box(IMPACT_CSV)).unwrap();
            black_box(SimulationTable::from_parsed(&parsed));
        })
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let table = SimulationTable::from_parsed(&parse_table(IMPACT_CSV).unwrap());
    let selection = OutcomeSelection(vec![Some("Storm".to_string()), None]);
    c.bench_function("aggregate_filtered", |b| {
        b.iter(|| {
            black_box(table.aggregate(black_box(&selection)));
        })
    });
}

fn bench_multinomial(c: &mut Criterion) {
    c.bench_function("multinomial_at_least_4legs", |b| {
        b.iter(|| {
            black_box(
                multinomial_at_least(
                    black_box(18),
                    black_box(&[0.35, 0.28, 0.22, 0.15]),
                    black_box(&[1, 1, 2, 1]),
                )
                .unwrap(),
            );
        })
    });
}

fn bench_sgm(c: &mut Criterion) {
    let dist = TryCountDistribution::from_pairs(
        [
            (0, 0.02),
            (1, 0.08),
            (2, 0.17),
            (3, 0.23),
            (4, 0.21),
            (5, 0.15),
            (6, 0.09),
            (7, 0.04),
            (8, 0.01),
        ],
    );
    c.bench_function("sgm_probability_3legs", |b| {
        b.iter(|| {
            black_box(
                sgm_probability(
                    black_box(&dist),
                    black_box(&[0.34, 0.22, 0.18]),
                    black_box(&[1, 1, 1]),
                    12,
                )
                .unwrap(),
            );
        })
    });
}

criterion_group!(
    benches,
    bench_table_parse,
    bench_aggregate,
    bench_multinomial,
    bench_sgm
);
criterion_main!(benches);
