use chrono::NaiveDate;
use quorum_models::{
    AgentKind, Diagnostic, DiagnosticKind, MarketSnapshot, NewsItem, Rating, RatingLabel,
    SentimentConfig, Stage,
};
use tracing::{debug, warn};

use crate::agent::{AgentOutput, ScoringAgent};
use crate::lexicon::FinancialLexicon;

pub const NO_COVERAGE: &str = "no recent coverage";

/// Scores recent news with a recency-decayed lexicon compound.
pub struct SentimentAgent {
    config: SentimentConfig,
    lexicon: FinancialLexicon,
}

impl SentimentAgent {
    pub fn new(config: SentimentConfig) -> Self {
        Self {
            config,
            lexicon: FinancialLexicon::new(),
        }
    }

    /// Recency weight of an item published `days` before the as-of date.
    pub fn decay_weight(&self, days: i64) -> f64 {
        self.config.decay.powi(days.max(0) as i32)
    }

    /// Mean of decay-weighted compounds. `None` when there are no items.
    pub fn decayed_sentiment<'a>(
        &self,
        items: impl IntoIterator<Item = &'a NewsItem>,
        as_of: NaiveDate,
    ) -> Option<(f64, usize)> {
        let mut total = 0.0;
        let mut count = 0usize;
        for item in items {
            let days = (as_of - item.date).num_days();
            let compound = self.lexicon.analyze(&item.text()).compound;
            total += compound * self.decay_weight(days);
            count += 1;
        }
        (count > 0).then(|| (total / count as f64, count))
    }

    fn label_for(&self, score: f64) -> RatingLabel {
        if score > self.config.buy_threshold {
            RatingLabel::Buy
        } else if score < self.config.sell_threshold {
            RatingLabel::Sell
        } else {
            RatingLabel::Hold
        }
    }
}

impl ScoringAgent for SentimentAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Sentiment
    }

    fn name(&self) -> &str {
        "sentiment_agent"
    }

    fn score(&self, snapshot: &MarketSnapshot, as_of: NaiveDate) -> AgentOutput {
        let mut output = AgentOutput::default();

        for instrument_id in snapshot.instrument_ids() {
            let rating = match self.decayed_sentiment(snapshot.news_through(instrument_id, as_of), as_of)
            {
                Some((score, count)) => {
                    let label = self.label_for(score);
                    debug!(instrument = %instrument_id, score, count, label = %label, "Sentiment scored");
                    Rating {
                        instrument_id: instrument_id.to_string(),
                        agent: AgentKind::Sentiment,
                        label,
                        score,
                        rationale: format!(
                            "{count} news item(s), decayed sentiment {score:+.3} (decay {})",
                            self.config.decay
                        ),
                        as_of_date: as_of,
                        degraded: false,
                    }
                }
                None => {
                    warn!(instrument = %instrument_id, "No news on or before as-of date");
                    output.diagnostics.push(
                        Diagnostic::new(Stage::Agents, DiagnosticKind::MissingNewsCoverage, NO_COVERAGE)
                            .for_instrument(instrument_id)
                            .for_agent(AgentKind::Sentiment),
                    );
                    Rating {
                        instrument_id: instrument_id.to_string(),
                        agent: AgentKind::Sentiment,
                        label: RatingLabel::Hold,
                        score: 0.0,
                        rationale: NO_COVERAGE.to_string(),
                        as_of_date: as_of,
                        degraded: false,
                    }
                }
            };
            output.ratings.push(rating);
        }

        output
    }
}
