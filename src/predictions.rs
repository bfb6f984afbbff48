use serde::Deserialize;

/// One line of Predictions.txt. The file is python-repr style: one object
/// per line, single-quoted keys and strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictedMatch {
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub home_score: f64,
    #[serde(default)]
    pub away_score: f64,
    #[serde(default)]
    pub home_perc: f64,
    #[serde(default)]
    pub away_perc: f64,
}

impl PredictedMatch {
    /// None when the model has the game dead even.
    pub fn predicted_winner(&self) -> Option<&str> {
        if self.home_perc > self.away_perc {
            Some(&self.home_team)
        } else if self.away_perc > self.home_perc {
            Some(&self.away_team)
        } else {
            None
        }
    }

    pub fn win_probability(&self) -> f64 {
        self.home_perc.max(self.away_perc)
    }

    pub fn expected_total(&self) -> f64 {
        self.home_score + self.away_score
    }
}

/// Parse the whole file, line by line. A malformed line degrades to an
/// error entry instead of sinking the round's match list.
pub fn parse_predictions(raw: &str) -> (Vec<PredictedMatch>, Vec<String>) {
    let mut matches = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let normalized = line.replace('\'', "\"");
        match serde_json::from_str::<PredictedMatch>(&normalized) {
            Ok(m) => matches.push(m),
            Err(err) => errors.push(format!("predictions line {}: {err}", idx + 1)),
        }
    }
    (matches, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quoted_lines() {
        let raw = "\
{'home_team': 'Storm', 'away_team': 'Broncos', 'home_score': 24, 'away_score': 12, 'home_perc': 0.62, 'away_perc': 0.38}\n\
{'home_team': 'Raiders', 'away_team': 'Sharks', 'home_score': 18, 'away_score': 18, 'home_perc': 0.5, 'away_perc': 0.5}\n";
        let (matches, errors) = parse_predictions(raw);
        assert!(errors.is_empty());
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].predicted_winner(), Some("Storm"));
        assert_eq!(matches[0].win_probability(), 0.62);
        assert_eq!(matches[0].expected_total(), 36.0);
        assert_eq!(matches[1].predicted_winner(), None);
    }

    #[test]
    fn bad_line_degrades_without_sinking_the_rest() {
        let raw = "not json\n{'home_team': 'Storm', 'away_team': 'Broncos'}\n";
        let (matches, errors) = parse_predictions(raw);
        assert_eq!(matches.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("line 1"));
    }
}
