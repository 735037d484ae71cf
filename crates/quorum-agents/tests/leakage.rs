//! Records dated after the as-of date must not move any rating, decision or
//! score. Each test runs a clean market and the same market with future
//! records mixed in, then compares the reports field by field.

use std::sync::Arc;

use quorum_agents::test_support::{as_of, metrics, SnapshotBuilder};
use quorum_agents::Pipeline;
use quorum_models::{QuorumConfig, RunReport};

fn base() -> SnapshotBuilder {
    SnapshotBuilder::new(as_of())
        .trending("LEAD", "technology", 120, 0.004)
        .forward("LEAD", 90, 0.12)
        .news("LEAD", 1, "Record profit and strong growth", "Analysts upgrade the shares")
        .fundamentals("LEAD", "technology", 20, metrics(0.18, 0.35, 0.15, 0.05))
        .trending("MID", "technology", 120, 0.001)
        .forward("MID", 90, 0.02)
        .news("MID", 4, "Company schedules annual meeting", "Agenda published")
        .fundamentals("MID", "technology", 20, metrics(0.10, 0.25, 0.30, 0.095))
        .trending("LAG", "technology", 120, -0.004)
        .forward("LAG", 90, -0.06)
        .news("LAG", 2, "Shares plunge on fraud investigation", "Lawsuit filed")
        .fundamentals("LAG", "technology", 20, metrics(0.01, 0.11, 0.48, 0.14))
}

async fn run(builder: SnapshotBuilder) -> RunReport {
    Pipeline::new(QuorumConfig::default())
        .run(Arc::new(builder.build()), as_of())
        .await
        .unwrap()
}

fn assert_same_outcome(clean: &RunReport, leaky: &RunReport) {
    assert_eq!(clean.ratings, leaky.ratings);
    assert_eq!(clean.adjusted_ratings, leaky.adjusted_ratings);
    assert_eq!(clean.debate_records, leaky.debate_records);
    assert_eq!(clean.decisions, leaky.decisions);
    assert_eq!(clean.portfolio, leaky.portfolio);
    assert_eq!(clean.attribution, leaky.attribution);
    assert_eq!(clean.diagnostics, leaky.diagnostics);
}

#[tokio::test]
async fn future_news_has_no_influence() {
    let clean = run(base()).await;
    let leaky = run(
        base()
            .news("LAG", -1, "Record profit, great success", "Strong rally, analysts upgrade")
            .news("LEAD", -10, "Bankruptcy fraud crash", "Shares plunge"),
    )
    .await;
    assert_same_outcome(&clean, &leaky);
}

#[tokio::test]
async fn future_fundamentals_have_no_influence() {
    let clean = run(base()).await;
    // Quarter ended before the as-of date but was reported after it.
    let leaky = run(
        base()
            .fundamentals("LAG", "technology", -5, metrics(0.40, 0.50, 0.0, 0.01))
            .fundamentals("LEAD", "technology", -60, metrics(-0.3, 0.0, 2.0, 0.5)),
    )
    .await;
    assert_same_outcome(&clean, &leaky);
}

#[tokio::test]
async fn future_prices_have_no_influence() {
    let clean = run(base()).await;
    // A crash and a spike between the as-of date and the forward target.
    let leaky = run(
        base()
            .path("LEAD", "technology", &[(1, 10.0), (30, 5.0), (60, 400.0)])
            .path("LAG", "technology", &[(1, 900.0), (45, 1_000.0)]),
    )
    .await;
    assert_same_outcome(&clean, &leaky);
}
