use std::collections::HashMap;

use thiserror::Error;

/// Recursion depth and factorial growth both stay tame under these caps;
/// callers feeding the engine from user picks must stay inside them.
pub const MAX_TRIALS: usize = 20;
pub const MAX_LEGS: usize = 6;

/// Caller contract violations. These are hard local failures, never folded
/// into a displayed figure.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SgmError {
    #[error("per-trial probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("leg probabilities sum to {0}, more than the full trial mass")]
    ProbabilityMassExceeded(f64),
    #[error("{0} legs, cap is {MAX_LEGS}")]
    TooManyLegs(usize),
    #[error("{0} trials, cap is {MAX_TRIALS}")]
    TooManyTrials(usize),
    #[error("{probs} probabilities against {floors} floors")]
    MismatchedLegs { probs: usize, floors: usize },
}

/// P(exactly n qualifying events) per trial count for one team, truncated at
/// the modeled tail. Missing entries are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TryCountDistribution(Vec<f64>);

impl TryCountDistribution {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut weights = Vec::new();
        for (n, p) in pairs {
            if n >= weights.len() {
                weights.resize(n + 1, 0.0);
            }
            weights[n] = p;
        }
        Self(weights)
    }

    pub fn probability_of(&self, n: usize) -> f64 {
        self.0.get(n).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&p| p <= 0.0)
    }
}

/// Multiplicative binomial coefficient; exact enough in f64 for n up to 40.
fn choose(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut out = 1.0;
    for i in 1..=k {
        out *= (n - i + 1) as f64 / i as f64;
    }
    out
}

fn factorial(n: usize) -> f64 {
    (2..=n).fold(1.0, |acc, i| acc * i as f64)
}

fn check_probability(p: f64) -> Result<f64, SgmError> {
    if !(0.0..=1.0).contains(&p) || p.is_nan() {
        return Err(SgmError::ProbabilityOutOfRange(p));
    }
    Ok(p)
}

/// P(X >= k) for X ~ Binomial(n, p).
pub fn binomial_at_least(n: usize, p: f64, k: usize) -> Result<f64, SgmError> {
    check_probability(p)?;
    if n > 2 * MAX_TRIALS {
        return Err(SgmError::TooManyTrials(n));
    }
    let mut total = 0.0;
    for j in k..=n {
        total += choose(n, j) * p.powi(j as i32) * (1.0 - p).powi((n - j) as i32);
    }
    Ok(total.min(1.0))
}

/// P(every leg i registers at least `min_counts[i]` successes) when n
/// independent trials are split multinomially across the legs. The legs'
/// probabilities need not sum to 1: the remaining mass is an unmodeled
/// "other" outcome that never satisfies a positive floor. With one leg this
/// reduces exactly to the binomial tail, which is also the path taken
/// (closed form beats the recursion on both speed and rounding).
pub fn multinomial_at_least(
    n: usize,
    probs: &[f64],
    min_counts: &[usize],
) -> Result<f64, SgmError> {
    if probs.len() != min_counts.len() {
        return Err(SgmError::MismatchedLegs {
            probs: probs.len(),
            floors: min_counts.len(),
        });
    }
    if probs.len() > MAX_LEGS {
        return Err(SgmError::TooManyLegs(probs.len()));
    }
    if n > MAX_TRIALS {
        return Err(SgmError::TooManyTrials(n));
    }
    let mut mass = 0.0;
    for &p in probs {
        mass += check_probability(p)?;
    }
    if mass > 1.0 + 1e-9 {
        return Err(SgmError::ProbabilityMassExceeded(mass));
    }

    if min_counts.iter().sum::<usize>() > n {
        return Ok(0.0);
    }
    if probs.is_empty() {
        return Ok(1.0);
    }
    if probs.len() == 1 {
        return binomial_at_least(n, probs[0], min_counts[0]);
    }

    let other = (1.0 - mass).max(0.0);
    let mut memo: HashMap<(usize, usize), f64> = HashMap::new();
    let tail = enumerate(0, n, probs, min_counts, other, &mut memo);
    Ok((factorial(n) * tail).min(1.0))
}

/// Factorized tail of the multinomial sum: contribution of legs `pos..` when
/// `left` trials remain, with each leg's p^k / k! term accumulated locally
/// and the shared n! applied by the caller. Depends only on (pos, left),
/// which is the whole memo key.
fn enumerate(
    pos: usize,
    left: usize,
    probs: &[f64],
    min_counts: &[usize],
    other: f64,
    memo: &mut HashMap<(usize, usize), f64>,
) -> f64 {
    if pos == probs.len() {
        // Whatever is left goes to the unmodeled outcome.
        if left == 0 {
            return 1.0;
        }
        if other <= 0.0 {
            return 0.0;
        }
        return other.powi(left as i32) / factorial(left);
    }
    if let Some(&hit) = memo.get(&(pos, left)) {
        return hit;
    }

    let mut total = 0.0;
    for k in min_counts[pos]..=left {
        total += probs[pos].powi(k as i32) / factorial(k)
            * enumerate(pos + 1, left - k, probs, min_counts, other, memo);
    }
    memo.insert((pos, left), total);
    total
}

/// SGM probability for one team's legs: marginalize the at-least probability
/// over the team's try-count distribution. Trial counts that cannot satisfy
/// the floors, and zero-weight counts, are skipped outright.
pub fn sgm_probability(
    try_dist: &TryCountDistribution,
    player_probs: &[f64],
    min_counts: &[usize],
    max_n: usize,
) -> Result<f64, SgmError> {
    if max_n > MAX_TRIALS {
        return Err(SgmError::TooManyTrials(max_n));
    }
    let floor_sum: usize = min_counts.iter().sum();
    let mut prob = 0.0;
    for n in 0..=max_n {
        if n < floor_sum {
            continue;
        }
        let pn = try_dist.probability_of(n);
        if pn <= 0.0 {
            continue;
        }
        prob += pn * multinomial_at_least(n, player_probs, min_counts)?;
    }
    Ok(prob)
}

/// Chance of a player scoring at least once, marginalized over the team's
/// try counts.
pub fn anytime_probability(
    per_try: f64,
    try_dist: &TryCountDistribution,
    max_n: usize,
) -> Result<f64, SgmError> {
    check_probability(per_try)?;
    if max_n > MAX_TRIALS {
        return Err(SgmError::TooManyTrials(max_n));
    }
    let mut prob = 0.0;
    for n in 1..=max_n {
        let pn = try_dist.probability_of(n);
        if pn <= 0.0 {
            continue;
        }
        prob += pn * (1.0 - (1.0 - per_try).powi(n as i32));
    }
    Ok(prob)
}

/// Cross-market parlay: legs are combined as independent events. That is a
/// modeling assumption carried from upstream, not a verified property.
pub fn combined_probability(legs: &[f64]) -> f64 {
    legs.iter().product()
}

/// Decimal odds for a combined probability; None when the multi is dead.
pub fn decimal_odds(probability: f64) -> Option<f64> {
    (probability > 0.0).then(|| 1.0 / probability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binomial_tail_is_symmetric_at_half() {
        // sum_{k=3}^{5} C(5,k) 0.5^5 covers exactly half the mass.
        let p = binomial_at_least(5, 0.5, 3).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn binomial_floor_of_zero_is_certain() {
        assert!((binomial_at_least(7, 0.3, 0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(binomial_at_least(3, 0.9, 4).unwrap(), 0.0);
    }

    #[test]
    fn single_leg_matches_binomial_tail() {
        for &(n, p, k) in &[(12usize, 0.35, 2usize), (20, 0.08, 1), (6, 0.5, 3)] {
            let multi = multinomial_at_least(n, &[p], &[k]).unwrap();
            let bin = binomial_at_least(n, p, k).unwrap();
            assert!((multi - bin).abs() < 1e-9, "n={n} p={p} k={k}");
        }
    }

    #[test]
    fn two_leg_exact_case() {
        // Two trials, both floors 1: only the (1,1) split contributes,
        // 2!/(1!1!) * 0.3 * 0.3.
        let p = multinomial_at_least(2, &[0.3, 0.3], &[1, 1]).unwrap();
        assert!((p - 0.18).abs() < 1e-12);
    }

    #[test]
    fn other_mass_absorbs_unassigned_trials() {
        // Three trials, one must go to leg 1; legs cover 0.6 of each trial.
        // Complement check: P(leg1 >= 1) with p=0.3 over 3 trials.
        let p = multinomial_at_least(3, &[0.3, 0.3], &[1, 0]).unwrap();
        let expect = binomial_at_least(3, 0.3, 1).unwrap();
        assert!((p - expect).abs() < 1e-9);
    }

    #[test]
    fn raising_a_floor_never_raises_the_probability() {
        let dist = TryCountDistribution::from_pairs([(2, 0.3), (3, 0.4), (4, 0.3)]);
        let probs = [0.4, 0.25];
        let mut last = f64::INFINITY;
        for floor in 0..=3 {
            let p = sgm_probability(&dist, &probs, &[floor, 1], 4).unwrap();
            assert!(p <= last + 1e-12, "floor={floor}: {p} > {last}");
            last = p;
        }
    }

    #[test]
    fn trial_counts_below_the_floor_sum_are_skipped() {
        let dist = TryCountDistribution::from_pairs([(1, 1.0)]);
        let p = sgm_probability(&dist, &[0.9, 0.9], &[1, 1], 12).unwrap();
        assert_eq!(p, 0.0);
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        assert_eq!(
            binomial_at_least(5, 1.2, 1),
            Err(SgmError::ProbabilityOutOfRange(1.2))
        );
        assert!(matches!(
            multinomial_at_least(5, &[0.8, 0.8], &[1, 1]),
            Err(SgmError::ProbabilityMassExceeded(_))
        ));
        assert_eq!(
            multinomial_at_least(30, &[0.1, 0.1], &[1, 1]),
            Err(SgmError::TooManyTrials(30))
        );
        assert_eq!(
            multinomial_at_least(5, &[0.1], &[1, 1]),
            Err(SgmError::MismatchedLegs { probs: 1, floors: 2 })
        );
    }

    #[test]
    fn anytime_marginalizes_over_try_counts() {
        let dist = TryCountDistribution::from_pairs([(1, 0.5), (2, 0.5)]);
        let p = anytime_probability(0.5, &dist, 20).unwrap();
        assert!((p - 0.625).abs() < 1e-12);
    }

    #[test]
    fn string_keyed_tails_missing_counts_read_as_zero() {
        let dist = TryCountDistribution::from_pairs([(3, 0.9)]);
        assert_eq!(dist.probability_of(2), 0.0);
        assert_eq!(dist.probability_of(3), 0.9);
        assert_eq!(dist.probability_of(99), 0.0);
    }

    #[test]
    fn combined_legs_multiply() {
        let combined = combined_probability(&[0.25, 0.5]);
        assert!((combined - 0.125).abs() < 1e-12);
        assert_eq!(decimal_odds(combined), Some(8.0));
        assert_eq!(decimal_odds(0.0), None);
    }
}
