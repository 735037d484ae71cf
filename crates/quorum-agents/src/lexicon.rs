//! Rule-based financial sentiment scoring.
//!
//! Word valences sit on a −4..4 scale. A negation flips the next sentiment
//! word in the same sentence and an intensifier scales it. The summed valence
//! is squashed into [−1, 1] with `s / sqrt(s² + ALPHA)`.

use std::collections::HashMap;

/// Normalization constant for the compound score.
pub const ALPHA: f64 = 15.0;

const SUFFIXES: [&str; 5] = ["ing", "ed", "es", "s", "d"];

pub struct FinancialLexicon {
    words: HashMap<&'static str, f64>,
    negations: Vec<&'static str>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for FinancialLexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl FinancialLexicon {
    pub fn new() -> Self {
        let positive = [
            ("beat", 2.2),
            ("bullish", 2.9),
            ("boost", 1.8),
            ("breakthrough", 2.4),
            ("confident", 1.9),
            ("expand", 1.3),
            ("exceed", 2.0),
            ("gain", 1.8),
            ("good", 1.9),
            ("great", 3.1),
            ("growth", 1.9),
            ("improve", 1.7),
            ("innovative", 1.8),
            ("optimistic", 2.2),
            ("outperform", 2.4),
            ("positive", 2.0),
            ("profit", 1.9),
            ("profitable", 2.1),
            ("rally", 2.2),
            ("rebound", 1.7),
            ("record", 1.6),
            ("recovery", 1.6),
            ("rise", 1.4),
            ("robust", 1.9),
            ("soar", 2.7),
            ("solid", 1.5),
            ("strong", 2.3),
            ("success", 2.7),
            ("surge", 2.4),
            ("upgrade", 2.2),
            ("win", 2.8),
        ];
        let negative = [
            ("bad", -2.5),
            ("bankruptcy", -3.4),
            ("bearish", -2.9),
            ("concern", -1.6),
            ("crash", -3.1),
            ("cut", -1.4),
            ("decline", -1.8),
            ("default", -2.6),
            ("delay", -1.3),
            ("disappoint", -2.3),
            ("downgrade", -2.3),
            ("drop", -1.6),
            ("fail", -2.5),
            ("fall", -1.5),
            ("fear", -2.2),
            ("fraud", -3.3),
            ("investigation", -1.8),
            ("lawsuit", -2.1),
            ("layoff", -2.0),
            ("loss", -2.1),
            ("miss", -1.9),
            ("plunge", -2.8),
            ("poor", -2.1),
            ("recall", -1.7),
            ("risk", -1.1),
            ("slowdown", -1.7),
            ("slump", -2.3),
            ("tumble", -2.4),
            ("uncertainty", -1.4),
            ("underperform", -2.2),
            ("warning", -1.8),
            ("weak", -1.9),
        ];

        let negations = vec![
            "not", "no", "never", "neither", "nor", "none", "cannot", "can't", "cant",
            "don't", "dont", "doesn't", "doesnt", "didn't", "didnt", "isn't", "isnt",
            "aren't", "arent", "wasn't", "wasnt", "won't", "wont", "without", "hardly",
        ];

        let intensifiers = HashMap::from([
            ("very", 1.3),
            ("extremely", 1.5),
            ("highly", 1.3),
            ("significantly", 1.3),
            ("sharply", 1.4),
            ("substantially", 1.3),
            ("slightly", 0.6),
            ("somewhat", 0.7),
            ("marginally", 0.6),
        ]);

        Self {
            words: positive.into_iter().chain(negative).collect(),
            negations,
            intensifiers,
        }
    }

    /// Valence of a token, trying common inflections ("beats", "surged").
    pub fn valence(&self, token: &str) -> Option<f64> {
        if let Some(&v) = self.words.get(token) {
            return Some(v);
        }
        SUFFIXES.iter().find_map(|suffix| {
            let stem = token.strip_suffix(suffix)?;
            self.words
                .get(stem)
                .or_else(|| self.words.get(format!("{stem}e").as_str()))
                .copied()
        })
    }

    pub fn is_negation(&self, token: &str) -> bool {
        self.negations.contains(&token)
    }

    pub fn intensifier(&self, token: &str) -> Option<f64> {
        self.intensifiers.get(token).copied()
    }

    pub fn analyze(&self, text: &str) -> LexiconScore {
        let mut sum = 0.0;
        let mut matched = Vec::new();

        for sentence in text.split(['.', '!', '?', ';']) {
            let mut negate = false;
            let mut scale = 1.0;
            for token in tokens(sentence) {
                if self.is_negation(&token) {
                    negate = true;
                } else if let Some(mult) = self.intensifier(&token) {
                    scale = mult;
                } else if let Some(mut valence) = self.valence(&token) {
                    if negate {
                        valence = -valence;
                        negate = false;
                    }
                    valence *= scale;
                    scale = 1.0;
                    sum += valence;
                    matched.push((token, valence));
                }
            }
        }

        LexiconScore {
            compound: normalize(sum),
            sum,
            matched,
        }
    }
}

/// `s / sqrt(s² + ALPHA)`, always within (−1, 1).
pub fn normalize(sum: f64) -> f64 {
    sum / (sum * sum + ALPHA).sqrt()
}

fn tokens(sentence: &str) -> impl Iterator<Item = String> + '_ {
    sentence
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexiconScore {
    /// Normalized score in [−1, 1].
    pub compound: f64,
    /// Raw valence sum before normalization.
    pub sum: f64,
    pub matched: Vec<(String, f64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_headline() {
        let lexicon = FinancialLexicon::new();
        let result = lexicon.analyze("Apple beats estimates. Record revenue and strong growth");
        assert!(result.compound > 0.5, "compound {}", result.compound);
        assert_eq!(result.matched.len(), 4);
    }

    #[test]
    fn negative_headline() {
        let lexicon = FinancialLexicon::new();
        let result = lexicon.analyze("Shares plunge after guidance miss; analysts downgrade");
        assert!(result.compound < -0.5);
    }

    #[test]
    fn negation_flips_next_sentiment_word() {
        let lexicon = FinancialLexicon::new();
        let plain = lexicon.analyze("a strong quarter");
        let negated = lexicon.analyze("not a strong quarter");
        assert!((plain.sum + negated.sum).abs() < 1e-12);
        assert!(negated.compound < 0.0);
    }

    #[test]
    fn negation_does_not_cross_sentences() {
        let lexicon = FinancialLexicon::new();
        let result = lexicon.analyze("No surprises. Strong demand");
        assert!(result.sum > 0.0);
    }

    #[test]
    fn intensifier_scales() {
        let lexicon = FinancialLexicon::new();
        let plain = lexicon.analyze("weak outlook");
        let intense = lexicon.analyze("extremely weak outlook");
        assert!((intense.sum - plain.sum * 1.5).abs() < 1e-12);
    }

    #[test]
    fn inflections_resolve_to_stem() {
        let lexicon = FinancialLexicon::new();
        assert_eq!(lexicon.valence("beats"), Some(2.2));
        assert_eq!(lexicon.valence("surged"), Some(2.4));
        assert_eq!(lexicon.valence("rising"), Some(1.4));
        assert_eq!(lexicon.valence("quarterly"), None);
    }

    #[test]
    fn normalization_bounds() {
        assert_eq!(normalize(0.0), 0.0);
        assert!(normalize(1_000.0) < 1.0);
        assert!(normalize(-1_000.0) > -1.0);
        assert!((normalize(1.0) - 1.0 / 16.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn neutral_text_scores_zero() {
        let lexicon = FinancialLexicon::new();
        let result = lexicon.analyze("The company held its annual meeting on Tuesday");
        assert_eq!(result.compound, 0.0);
        assert!(result.matched.is_empty());
    }
}
