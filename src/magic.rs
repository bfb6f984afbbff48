use std::collections::HashMap;

use crate::tabular::parse_cell_f64;

/// Offset applied to both zone endpoints. The curve files encode points
/// before the end-of-season bye bonus; the ladder encodes points after it.
/// Domain constant of the upstream encoding, not derived here.
pub const ZONE_POINT_OFFSET: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKey {
    Finals,
    Top4,
    MinorPremiership,
    Spoon,
}

impl OutcomeKey {
    pub const ALL: [OutcomeKey; 4] = [
        OutcomeKey::Finals,
        OutcomeKey::Top4,
        OutcomeKey::MinorPremiership,
        OutcomeKey::Spoon,
    ];

    /// Section tag as it appears in the curve file.
    pub fn tag(self) -> &'static str {
        match self {
            OutcomeKey::Finals => "finals:",
            OutcomeKey::Top4 => "top4:",
            OutcomeKey::MinorPremiership => "minor_premiership:",
            OutcomeKey::Spoon => "spoon:",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OutcomeKey::Finals => "Finals",
            OutcomeKey::Top4 => "Top 4",
            OutcomeKey::MinorPremiership => "Minor Prem",
            OutcomeKey::Spoon => "Spoon",
        }
    }
}

/// Contiguous point interval over which an outcome is neither guaranteed
/// nor impossible, already bye-adjusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointZone {
    pub min: f64,
    pub max: f64,
}

/// An ordered (points, probability) curve for one outcome. Points ascend;
/// the upstream model emits monotone probabilities, which is assumed rather
/// than enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCurve {
    points: Vec<f64>,
    probabilities: Vec<f64>,
}

impl ThresholdCurve {
    /// Pair up two parsed rows, dropping indices where either value is
    /// malformed (labels at the head of a row parse to NaN and fall out
    /// here).
    pub fn from_rows(points: &[f64], probabilities: &[f64]) -> Self {
        let mut ps = Vec::with_capacity(points.len());
        let mut qs = Vec::with_capacity(points.len());
        for (&point, &prob) in points.iter().zip(probabilities.iter()) {
            if point.is_finite() && prob.is_finite() {
                ps.push(point);
                qs.push(prob);
            }
        }
        Self {
            points: ps,
            probabilities: qs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point (ascending scan) whose probability satisfies the
    /// predicate.
    pub fn find_crossing(&self, pred: impl Fn(f64) -> bool) -> Option<f64> {
        self.points
            .iter()
            .zip(self.probabilities.iter())
            .find(|(_, &p)| pred(p))
            .map(|(&point, _)| point)
    }

    /// The "magic number": first point where the outcome becomes more
    /// likely than not.
    pub fn magic_number(&self) -> Option<f64> {
        self.find_crossing(|p| p > 0.5)
    }

    /// Spoon variant: first point where the outcome is live but still a
    /// minority chance.
    pub fn spoon_number(&self) -> Option<f64> {
        self.find_crossing(|p| p > 0.0 && p < 0.5)
    }

    /// Span of the indices with 0 < p < 1, endpoints bye-adjusted. Upstream
    /// curves make this set contiguous by construction; if it ever is not,
    /// the reported zone still runs first-to-last occurrence.
    pub fn eligible_zone(&self) -> Option<PointZone> {
        let mut first = None;
        let mut last = None;
        for (idx, &p) in self.probabilities.iter().enumerate() {
            if p > 0.0 && p < 1.0 {
                if first.is_none() {
                    first = Some(idx);
                }
                last = Some(idx);
            }
        }
        match (first, last) {
            (Some(lo), Some(hi)) => Some(PointZone {
                min: self.points[lo] + ZONE_POINT_OFFSET,
                max: self.points[hi] + ZONE_POINT_OFFSET,
            }),
            _ => None,
        }
    }
}

/// Parse the three-line sections of a `magic numbers.csv` blob: a tag line,
/// a points line, a probabilities line. Unrecognized lines are skipped;
/// truncated sections at EOF are dropped. Fields split on commas or
/// whitespace runs.
pub fn parse_outcome_curves(raw: &str) -> HashMap<OutcomeKey, ThresholdCurve> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut out = HashMap::new();

    let mut idx = 0;
    while idx < lines.len() {
        let lowered = lines[idx].to_lowercase();
        let Some(key) = OutcomeKey::ALL
            .into_iter()
            .find(|key| lowered.contains(key.tag()))
        else {
            idx += 1;
            continue;
        };
        let (Some(points_line), Some(probs_line)) = (lines.get(idx + 1), lines.get(idx + 2))
        else {
            break;
        };
        let curve = ThresholdCurve::from_rows(
            &split_curve_fields(points_line),
            &split_curve_fields(probs_line),
        );
        out.insert(key, curve);
        idx += 3;
    }

    out
}

fn split_curve_fields(line: &str) -> Vec<f64> {
    line.split([' ', ','])
        .filter(|field| !field.is_empty())
        .map(parse_cell_f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_spans_the_uncertain_indices_with_offset() {
        let curve = ThresholdCurve::from_rows(&[0.0, 2.0, 4.0, 6.0], &[0.0, 0.3, 0.7, 1.0]);
        let zone = curve.eligible_zone().unwrap();
        assert_eq!(zone, PointZone { min: 8.0, max: 10.0 });
    }

    #[test]
    fn crossing_takes_the_first_matching_point() {
        let curve = ThresholdCurve::from_rows(&[10.0, 12.0, 14.0, 16.0], &[0.2, 0.4, 0.6, 0.8]);
        assert_eq!(curve.find_crossing(|p| p > 0.5), Some(14.0));
        assert_eq!(curve.magic_number(), Some(14.0));
        assert_eq!(curve.spoon_number(), Some(10.0));
    }

    #[test]
    fn fully_decided_curve_has_no_zone() {
        let curve = ThresholdCurve::from_rows(&[0.0, 2.0], &[0.0, 1.0]);
        assert!(curve.eligible_zone().is_none());
        assert!(curve.magic_number().is_none());
    }

    #[test]
    fn gapped_curve_still_reports_first_to_last() {
        let curve = ThresholdCurve::from_rows(
            &[0.0, 2.0, 4.0, 6.0, 8.0],
            &[0.0, 0.4, 1.0, 0.6, 1.0],
        );
        let zone = curve.eligible_zone().unwrap();
        assert_eq!(zone, PointZone { min: 8.0, max: 12.0 });
    }

    #[test]
    fn parses_tagged_sections_and_skips_row_labels() {
        let raw = "\
finals:\n\
points, 20, 22, 24\n\
probs, 0.1, 0.6, 1.0\n\
noise line\n\
spoon:\n\
points 4 6 8\n\
probs 1.0 0.4 0.0\n";
        let curves = parse_outcome_curves(raw);
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[&OutcomeKey::Finals].magic_number(), Some(22.0));
        assert_eq!(curves[&OutcomeKey::Spoon].spoon_number(), Some(6.0));
        let zone = curves[&OutcomeKey::Spoon].eligible_zone().unwrap();
        assert_eq!(zone, PointZone { min: 12.0, max: 12.0 });
    }

    #[test]
    fn truncated_trailing_section_is_dropped() {
        let raw = "finals:\npoints, 20, 22\n";
        assert!(parse_outcome_curves(raw).is_empty());
    }
}
