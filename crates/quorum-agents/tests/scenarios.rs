//! End-to-end pipeline scenarios.
//!
//! Most tests pin agent labels with `FixedAgent` so the coordinator and
//! backtest arithmetic can be checked exactly. The last tests run the
//! production agents over a synthetic market, one of them read back from an
//! in-memory SQLite store.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use quorum_agents::stats::approx_eq;
use quorum_agents::test_support::{as_of, metrics, FixedAgent, PanickingAgent, SnapshotBuilder};
use quorum_agents::{Pipeline, PipelineError, ScoringAgent};
use quorum_models::{
    AgentKind, AgentWeights, ConfigError, DiagnosticKind, Instrument, MarketSnapshot, NewsItem,
    QuorumConfig, RatingLabel::*, RunReport, Stage,
};
use quorum_store::{SnapshotReader, SqliteStore};

fn fixed(
    config: QuorumConfig,
    valuation: FixedAgent,
    sentiment: FixedAgent,
    fundamental: FixedAgent,
) -> Pipeline {
    let agents: Vec<Arc<dyn ScoringAgent>> =
        vec![Arc::new(valuation), Arc::new(sentiment), Arc::new(fundamental)];
    Pipeline::with_agents(config, agents)
}

/// Three instruments with 90-day forward returns of +10%, +20% and -5%.
fn market() -> Arc<MarketSnapshot> {
    Arc::new(
        SnapshotBuilder::new(as_of())
            .path("AAA", "technology", &[(0, 50.0), (90, 55.0)])
            .path("BBB", "technology", &[(0, 20.0), (90, 24.0)])
            .path("CCC", "utilities", &[(0, 80.0), (90, 76.0)])
            .build(),
    )
}

async fn run(pipeline: &Pipeline, snapshot: Arc<MarketSnapshot>) -> RunReport {
    pipeline.run(snapshot, as_of()).await.unwrap()
}

#[tokio::test]
async fn sell_buy_buy_is_hold() {
    let pipeline = fixed(
        QuorumConfig::default(),
        FixedAgent::new(AgentKind::Valuation).with("AAA", Sell, 0.2),
        FixedAgent::new(AgentKind::Sentiment).with("AAA", Buy, 0.6),
        FixedAgent::new(AgentKind::Fundamental).with("AAA", Buy, 0.8),
    );
    let report = run(&pipeline, market()).await;

    let decision = report.decision_for("AAA").unwrap();
    assert!((decision.numeric_coordinate - 1.2).abs() < 1e-12);
    assert_eq!(decision.final_label, Hold);
    // The lone SELL is dampened but keeps its label.
    assert!(decision.debate_applied);
    assert_eq!(report.debate_records.len(), 1);
    assert_eq!(report.debate_records[0].agent, AgentKind::Valuation);
}

#[tokio::test]
async fn buy_hold_buy_is_buy() {
    let pipeline = fixed(
        QuorumConfig::default(),
        FixedAgent::new(AgentKind::Valuation).with("AAA", Buy, 0.9),
        FixedAgent::new(AgentKind::Sentiment).with("AAA", Hold, 0.0),
        FixedAgent::new(AgentKind::Fundamental).with("AAA", Buy, 0.8),
    );
    let report = run(&pipeline, market()).await;

    let decision = report.decision_for("AAA").unwrap();
    assert!((decision.numeric_coordinate - 1.7).abs() < 1e-12);
    assert_eq!(decision.final_label, Buy);
    assert!(!decision.debate_applied);

    assert_eq!(report.portfolio.position_count, 1);
    assert!((report.portfolio.portfolio_return - 0.10).abs() < 1e-9);
}

#[tokio::test]
async fn zero_buys_is_all_cash() {
    let pipeline = fixed(
        QuorumConfig::default(),
        FixedAgent::new(AgentKind::Valuation).with("AAA", Hold, 0.5),
        FixedAgent::new(AgentKind::Sentiment).with("AAA", Hold, 0.0),
        FixedAgent::new(AgentKind::Fundamental).with("AAA", Sell, 0.1),
    );
    let report = run(&pipeline, market()).await;

    assert_eq!(report.portfolio.portfolio_return, 0.0);
    assert_eq!(report.portfolio.position_count, 0);
    assert!(report.attribution.is_empty());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::NoBuyPositions));
    // Benchmark still measured: (0.10 + 0.20 - 0.05) / 3
    assert!((report.portfolio.benchmark_return - 0.25 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn missing_forward_price_is_excluded() {
    let snapshot = Arc::new(
        SnapshotBuilder::new(as_of())
            .path("AAA", "technology", &[(0, 50.0), (90, 55.0)])
            .path("BBB", "technology", &[(0, 20.0), (90, 24.0)])
            .path("DELISTED", "technology", &[(-1, 10.0), (0, 10.0)])
            .build(),
    );
    let buy = |kind| {
        FixedAgent::new(kind)
            .with("AAA", Buy, 0.9)
            .with("BBB", Buy, 0.9)
            .with("DELISTED", Buy, 0.9)
    };
    let pipeline = fixed(
        QuorumConfig::default(),
        buy(AgentKind::Valuation),
        buy(AgentKind::Sentiment),
        buy(AgentKind::Fundamental),
    );
    let report = run(&pipeline, snapshot).await;

    assert_eq!(report.decision_for("DELISTED").unwrap().final_label, Buy);
    assert_eq!(report.portfolio.position_count, 2);
    assert!(report.portfolio.missing_instruments.contains("DELISTED"));
    for a in &report.attribution {
        assert_eq!(a.weight_in_portfolio, 0.5);
    }
    assert!((report.portfolio.portfolio_return - 0.15).abs() < 1e-9);
    // Benchmark keeps 1/3 per instrument and counts DELISTED as flat.
    assert!((report.portfolio.benchmark_return - 0.10).abs() < 1e-9);
    assert!(report.diagnostics.iter().any(|d| {
        d.kind == DiagnosticKind::MissingForwardPrice
            && d.instrument_id.as_deref() == Some("DELISTED")
    }));
}

#[tokio::test]
async fn invalid_weights_rejected_before_any_agent_runs() {
    let valuation = FixedAgent::new(AgentKind::Valuation).with("AAA", Buy, 0.9);
    let calls = valuation.calls();
    let mut config = QuorumConfig::default();
    config.pipeline.weights = AgentWeights::new(0.5, 0.3, 0.3);

    let pipeline = fixed(
        config,
        valuation,
        FixedAgent::new(AgentKind::Sentiment),
        FixedAgent::new(AgentKind::Fundamental),
    );
    let err = pipeline.run(market(), as_of()).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::ConfigurationInvalid(ConfigError::WeightSum(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicked_agent_is_treated_as_missing() {
    let agents: Vec<Arc<dyn ScoringAgent>> = vec![
        Arc::new(FixedAgent::new(AgentKind::Valuation).with("AAA", Buy, 0.9)),
        Arc::new(PanickingAgent(AgentKind::Sentiment)),
        Arc::new(FixedAgent::new(AgentKind::Fundamental).with("AAA", Buy, 0.8)),
    ];
    let pipeline = Pipeline::with_agents(QuorumConfig::default(), agents);
    let report = run(&pipeline, market()).await;

    let decision = report.decision_for("AAA").unwrap();
    // 0.4*2 + 0.3*1 (neutral) + 0.3*2
    assert!((decision.numeric_coordinate - 1.7).abs() < 1e-12);
    assert_eq!(decision.final_label, Buy);
    assert!(decision.degraded);
    assert_eq!(decision.missing_agents, vec![AgentKind::Sentiment]);

    let failures: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::AgentFailed)
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage, Stage::Agents);
    assert_eq!(failures[0].agent, Some(AgentKind::Sentiment));
    assert!(failures[0].instrument_id.is_none());

    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::DebateSkipped));
    assert!(report.diagnostics.iter().any(|d| {
        d.kind == DiagnosticKind::MissingAgentRating && d.agent == Some(AgentKind::Sentiment)
    }));
}

/// A small universe with history, news and fundamentals for the real agents.
fn synthetic_market() -> SnapshotBuilder {
    SnapshotBuilder::new(as_of())
        .trending("LEAD", "technology", 120, 0.004)
        .forward("LEAD", 90, 0.12)
        .news("LEAD", 1, "Record profit and strong growth", "Analysts upgrade the shares")
        .fundamentals("LEAD", "technology", 20, metrics(0.18, 0.35, 0.15, 0.05))
        .trending("STEADY", "technology", 120, 0.001)
        .forward("STEADY", 90, 0.03)
        .news("STEADY", 3, "Company schedules annual meeting", "Agenda published")
        .fundamentals("STEADY", "technology", 20, metrics(0.10, 0.25, 0.30, 0.095))
        .trending("LAG", "technology", 120, -0.004)
        .forward("LAG", 90, -0.08)
        .news("LAG", 2, "Shares plunge on fraud investigation", "Lawsuit filed")
        .fundamentals("LAG", "technology", 20, metrics(0.01, 0.11, 0.48, 0.14))
        .trending("UTIL", "utilities", 120, 0.0005)
        .forward("UTIL", 90, 0.01)
        .fundamentals("UTIL", "utilities", 20, metrics(0.04, 0.20, 1.4, 0.27))
}

#[tokio::test]
async fn production_agents_reconcile() {
    let report = run(
        &Pipeline::new(QuorumConfig::default()),
        Arc::new(synthetic_market().build()),
    )
    .await;

    assert_eq!(report.decisions.len(), 4);
    assert_eq!(report.ratings.len(), 12);
    assert_eq!(report.decision_for("LEAD").unwrap().final_label, Buy);
    assert_eq!(report.decision_for("LAG").unwrap().final_label, Sell);

    let total: f64 = report.attribution.iter().map(|a| a.contribution).sum();
    assert!(approx_eq(total, report.portfolio.portfolio_return, 1e-6));
    let weights: f64 = report.attribution.iter().map(|a| a.weight_in_portfolio).sum();
    assert!((weights - 1.0).abs() < 1e-9);
    assert!(
        (report.portfolio.active_return
            - (report.portfolio.portfolio_return - report.portfolio.benchmark_return))
            .abs()
            < 1e-12
    );
    // UTIL has no news coverage.
    assert!(report.diagnostics.iter().any(|d| {
        d.kind == DiagnosticKind::MissingNewsCoverage && d.instrument_id.as_deref() == Some("UTIL")
    }));
}

#[tokio::test]
async fn snapshot_read_from_store_matches_in_memory_run() {
    let built = synthetic_market().build();
    let mut store = SqliteStore::open_in_memory().unwrap();
    let far_future = as_of() + ChronoDuration::days(365);
    for instrument in &built.universe {
        let id = instrument.id.as_str();
        store.insert_prices(id, built.price_series(id)).unwrap();
        let items: Vec<NewsItem> = built.news_through(id, far_future).cloned().collect();
        for item in &items {
            store.insert_news(id, item).unwrap();
        }
        if let Some(record) = built.fundamentals_through(id, far_future) {
            store.insert_fundamentals(id, record).unwrap();
        }
    }

    let reader = SnapshotReader::new(store, 100, Duration::from_secs(60));
    let universe: Vec<Instrument> = built.universe.clone();
    let loaded = reader.load_snapshot(&universe).await.unwrap();

    let pipeline = Pipeline::new(QuorumConfig::default());
    let from_store = run(&pipeline, Arc::new(loaded)).await;
    let in_memory = run(&pipeline, Arc::new(built)).await;

    assert_eq!(from_store.decisions, in_memory.decisions);
    assert_eq!(from_store.portfolio, in_memory.portfolio);
}
