//! End-to-end tests of the analysis state machine against a fake service.
//!
//! Every test asserts on the returned [`AnalysisOutcome`]; none of them can
//! observe an error because `run` has no error path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use dermascan_core::error::{AnalysisError, ErrorKind};
use dermascan_core::fallback::{FallbackGenerator, SKIN_BASELINE};
use dermascan_core::report::ReportSource;
use dermascan_core::schema::AnalysisKind;
use dermascan_pipeline::engine::AnalysisEngine;
use dermascan_pipeline::orchestrator::AnalysisOrchestrator;
use dermascan_pipeline::outcome::{AnalysisOutcome, DiagnosticKind};
use dermascan_pipeline::progress::{self, ImageStatus, ProgressEvent};
use dermascan_pipeline::settings::AnalysisSettings;
use dermascan_vision::policy::RetryPolicy;
use tokio_util::sync::CancellationToken;

use common::{batch, ok, settings, skin_json, FakeTransport};

async fn run_skin(
    transport: Arc<FakeTransport>,
    settings: AnalysisSettings,
    images: usize,
) -> AnalysisOutcome {
    AnalysisOrchestrator::new(AnalysisKind::Skin, transport, settings)
        .run(batch(images))
        .await
}

// ---------------------------------------------------------------------------
// Test: eligibility
// ---------------------------------------------------------------------------

/// Disabling remote analysis returns the fallback without touching the service.
#[tokio::test]
async fn skip_remote_returns_fallback_without_calls() {
    let transport = FakeTransport::new(vec![]);
    let settings = AnalysisSettings {
        skip_remote: true,
        ..settings()
    };

    let outcome = run_skin(transport.clone(), settings, 3).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::SkippedByRequest));
    assert_eq!(transport.probes(), 0);
    assert_eq!(transport.calls(), 0);
}

/// Without a key the jittered baseline is returned with zero sources.
#[tokio::test]
async fn missing_credential_returns_jittered_baseline() {
    let transport = FakeTransport::new(vec![]);
    let settings = AnalysisSettings {
        api_key: None,
        fallback_jitter: true,
        ..settings()
    };

    let outcome = run_skin(transport.clone(), settings, 2).await;
    let report = &outcome.report;

    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::NoCredential));
    assert_eq!(report.source, ReportSource::Fallback);
    assert_eq!(report.source_count, 0);
    assert!((55..=65).contains(&report.confidence));
    for &(field, base) in SKIN_BASELINE.scores {
        let value = i64::from(report.score(field).unwrap());
        assert!(
            (i64::from(base) - value).abs() <= 5,
            "{field}: {value} is not within 5 of {base}"
        );
    }
    assert_eq!(transport.calls(), 0);
}

/// A key copied from a sample file counts as no credential.
#[tokio::test]
async fn placeholder_credential_is_not_used() {
    let transport = FakeTransport::new(vec![]);
    let settings = AnalysisSettings {
        api_key: Some("your_api_key_goes_here_1234".into()),
        ..settings()
    };

    let outcome = run_skin(transport.clone(), settings, 1).await;

    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::NoCredential));
    assert_eq!(transport.probes(), 0);
}

/// An empty batch is answered with the fallback before any probe.
#[tokio::test]
async fn empty_batch_returns_fallback() {
    let transport = FakeTransport::new(vec![]);

    let outcome = run_skin(transport.clone(), settings(), 0).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::EmptyBatch));
    assert_eq!(transport.probes(), 0);
}

/// A failed probe means no analysis request is sent.
#[tokio::test]
async fn unreachable_service_falls_back() {
    let transport = FakeTransport::unreachable();

    let outcome = run_skin(transport.clone(), settings(), 3).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::Unreachable));
    assert_eq!(transport.probes(), 1);
    assert_eq!(transport.calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: aggregation of real answers
// ---------------------------------------------------------------------------

/// Failed images are skipped and the rest are averaged.
#[tokio::test]
async fn partial_success_averages_successful_images() {
    let transport = FakeTransport::new(vec![
        ok(skin_json(60, "Normal")),
        ok(r#"{"hydration": 50}"#.into()),
        ok(skin_json(80, "Normal")),
    ]);

    let outcome = run_skin(transport.clone(), settings(), 3).await;
    let report = &outcome.report;

    assert!(!outcome.is_fallback());
    assert_eq!(report.score("hydration"), Some(70));
    assert_eq!(report.source_count, 2);
    assert_eq!(report.confidence, 70);
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::PartialFailure));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert_eq!(outcome.failures[0].kind, ErrorKind::Validation);
    // Validation failures are not retried.
    assert_eq!(transport.calls(), 3);
}

/// A clean run has no diagnostic and no failures.
#[tokio::test]
async fn all_images_succeed() {
    let transport = FakeTransport::new(vec![]);

    let outcome = run_skin(transport.clone(), settings(), 3).await;

    assert!(outcome.diagnostic.is_none());
    assert!(outcome.failures.is_empty());
    assert!(!outcome.cached);
    assert_eq!(outcome.report.confidence, 90);
    assert_eq!(
        outcome.report.concerns,
        vec!["Trockenheit", "Rötungen", "Keine weiteren Auffälligkeiten"]
    );
}

/// Categorical ties go to the value seen first.
#[tokio::test]
async fn categorical_tie_goes_to_first_seen() {
    let transport = FakeTransport::new(vec![
        ok(skin_json(60, "Normal")),
        ok(skin_json(60, "Trocken")),
    ]);
    let outcome = run_skin(transport, settings(), 2).await;
    assert_eq!(outcome.report.category("skin_type"), Some("Normal"));

    let transport = FakeTransport::new(vec![
        ok(skin_json(60, "Trocken")),
        ok(skin_json(60, "Normal")),
    ]);
    let outcome = run_skin(transport, settings(), 2).await;
    assert_eq!(outcome.report.category("skin_type"), Some("Trocken"));
}

/// JSON wrapped in prose is accepted; a reply without JSON is retried and
/// then skipped.
#[tokio::test]
async fn prose_wrapped_json_is_accepted() {
    let wrapped = format!(
        "Here is the analysis:\n```json\n{}\n```\nLet me know if you need more.",
        skin_json(64, "Mischhaut")
    );
    let transport = FakeTransport::new(vec![
        ok(wrapped),
        ok("I'm sorry, I can't help with that.".into()),
        ok("I'm sorry, I can't help with that.".into()),
    ]);

    let outcome = run_skin(transport.clone(), settings(), 2).await;

    assert_eq!(outcome.report.score("hydration"), Some(64));
    assert_eq!(outcome.report.source_count, 1);
    assert_eq!(outcome.failures[0].kind, ErrorKind::MalformedResponse);
    assert_eq!(transport.calls(), 3);
}

/// An image the service declines is skipped without retry.
#[tokio::test]
async fn not_analyzable_image_is_skipped() {
    let transport = FakeTransport::new(vec![
        ok(r#"{"error": true, "message": "Bild ist zu unscharf"}"#.into()),
        ok(skin_json(55, "Normal")),
    ]);

    let outcome = run_skin(transport.clone(), settings(), 2).await;

    assert_eq!(outcome.report.source_count, 1);
    assert_eq!(outcome.failures[0].kind, ErrorKind::NotAnalyzable);
    assert!(outcome.failures[0].message.contains("unscharf"));
    assert_eq!(transport.calls(), 2);
}

/// Hair requests are validated against the hair schema.
#[tokio::test]
async fn hair_analysis_uses_hair_schema() {
    let hair = serde_json::json!({
        "moisture": 45,
        "shine": "70%",
        "density": 80.4,
        "hair_type": "Lockig",
        "scalp_condition": "Trocken",
    })
    .to_string();
    let transport = FakeTransport::new(vec![ok(hair)]);

    let outcome = AnalysisOrchestrator::new(AnalysisKind::Hair, transport, settings())
        .run(batch(1))
        .await;
    let report = &outcome.report;

    assert_eq!(report.kind, AnalysisKind::Hair);
    assert_eq!(report.score("shine"), Some(70));
    assert_eq!(report.score("density"), Some(80));
    assert_eq!(report.score("damage"), Some(50));
    assert_eq!(report.category("hair_type"), Some("Lockig"));
}

/// A zero batch limit still analyses one image instead of none.
#[tokio::test]
async fn zero_max_batch_analyses_one_image() {
    let transport = FakeTransport::new(vec![]);
    let settings = AnalysisSettings {
        max_batch: 0,
        ..settings()
    };

    let outcome = run_skin(transport.clone(), settings, 3).await;

    assert!(!outcome.is_fallback());
    assert_eq!(outcome.report.source_count, 1);
    assert_eq!(transport.calls(), 1);
}

/// Only the first `max_batch` images are sent.
#[tokio::test]
async fn batch_is_truncated_to_max_batch() {
    let transport = FakeTransport::new(vec![]);

    let outcome = run_skin(transport.clone(), settings(), 5).await;

    assert_eq!(transport.calls(), 3);
    assert_eq!(outcome.report.source_count, 3);
}

// ---------------------------------------------------------------------------
// Test: fatal errors
// ---------------------------------------------------------------------------

/// A rate limit stops the batch; earlier results are kept.
#[tokio::test]
async fn rate_limit_stops_remaining_images() {
    let transport = FakeTransport::new(vec![
        ok(skin_json(60, "Normal")),
        Err(AnalysisError::RateLimit("quota exhausted".into())),
    ]);

    let outcome = run_skin(transport.clone(), settings(), 3).await;

    assert!(!outcome.is_fallback());
    assert_eq!(transport.calls(), 2);
    assert_eq!(outcome.report.source_count, 1);
    assert_eq!(outcome.report.confidence, 50);
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::RateLimited));
    assert_eq!(outcome.failures[0].kind, ErrorKind::RateLimit);
}

/// An auth failure before any success ends in the fallback.
#[tokio::test]
async fn auth_failure_without_results_falls_back() {
    let transport = FakeTransport::new(vec![Err(AnalysisError::Auth("invalid api key".into()))]);

    let outcome = run_skin(transport.clone(), settings(), 3).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::AuthFailed));
    assert_eq!(transport.calls(), 1);
}

/// Every image failing transiently ends in the fallback.
#[tokio::test]
async fn all_calls_failing_falls_back() {
    let network = || Err(AnalysisError::Network("connection reset".into()));
    let transport = FakeTransport::new(vec![network(), network(), network(), network()]);

    let outcome = run_skin(transport.clone(), settings(), 2).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::AllCallsFailed));
    assert_eq!(outcome.failures.len(), 2);
    // Two attempts per image.
    assert_eq!(transport.calls(), 4);
}

// ---------------------------------------------------------------------------
// Test: progress and cancellation
// ---------------------------------------------------------------------------

/// One event per image, then a final event.
#[tokio::test]
async fn progress_reports_each_image() {
    let transport = FakeTransport::new(vec![
        ok(skin_json(60, "Normal")),
        ok("no json here".into()),
    ]);
    let settings = AnalysisSettings {
        retry: RetryPolicy::immediate(1),
        ..settings()
    };
    let (reporter, mut rx) = progress::channel();

    AnalysisOrchestrator::new(AnalysisKind::Skin, transport, settings)
        .with_progress(reporter)
        .run(batch(2))
        .await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        ProgressEvent::Image { index: 0, status: ImageStatus::Analyzed, .. }
    ));
    assert!(matches!(
        events[1],
        ProgressEvent::Image { index: 1, status: ImageStatus::Skipped, .. }
    ));
    assert_eq!(events[2], ProgressEvent::Finished { fallback: false });
}

/// The fallback path also emits the final event.
#[tokio::test]
async fn fallback_emits_finished_event() {
    let (reporter, mut rx) = progress::channel();

    AnalysisOrchestrator::new(AnalysisKind::Skin, FakeTransport::new(vec![]), settings())
        .with_progress(reporter)
        .run(batch(0))
        .await;

    assert_eq!(rx.try_recv().unwrap(), ProgressEvent::Finished { fallback: true });
}

/// Cancelling before the run still yields a report.
#[tokio::test]
async fn cancelled_before_start_falls_back() {
    let transport = FakeTransport::new(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = AnalysisOrchestrator::new(AnalysisKind::Skin, transport.clone(), settings())
        .with_cancellation(cancel)
        .run(batch(2))
        .await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::Cancelled));
    assert_eq!(transport.calls(), 0);
}

/// Cancelling mid-batch keeps the images already analysed.
#[tokio::test(start_paused = true)]
async fn cancelled_mid_batch_keeps_earlier_results() {
    let transport = FakeTransport::with_latency(vec![], Duration::from_secs(10));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        trigger.cancel();
    });

    let outcome = AnalysisOrchestrator::new(AnalysisKind::Skin, transport, settings())
        .with_cancellation(cancel)
        .run(batch(3))
        .await;

    assert!(!outcome.is_fallback());
    assert_eq!(outcome.report.source_count, 1);
    assert_eq!(outcome.diagnostic_kind(), Some(DiagnosticKind::Cancelled));
    assert!(outcome.failures.is_empty());
    canceller.await.unwrap();
}

/// Consecutive images are separated by the inter-call delay.
#[tokio::test(start_paused = true)]
async fn images_are_paced() {
    let settings = AnalysisSettings {
        retry: RetryPolicy {
            inter_call_delay: Duration::from_secs(1),
            ..RetryPolicy::immediate(1)
        },
        ..settings()
    };

    let start = tokio::time::Instant::now();
    run_skin(FakeTransport::new(vec![]), settings, 3).await;

    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

/// Each run gets its own identifier.
#[tokio::test]
async fn outcome_carries_orchestrator_id() {
    let orchestrator =
        AnalysisOrchestrator::new(AnalysisKind::Skin, FakeTransport::new(vec![]), settings())
            .with_fallback(FallbackGenerator::exact());
    let id = orchestrator.analysis_id();

    let outcome = orchestrator.run(batch(1)).await;

    assert_eq!(outcome.analysis_id, id);
}

// ---------------------------------------------------------------------------
// Test: engine and cache
// ---------------------------------------------------------------------------

fn cached_settings() -> AnalysisSettings {
    AnalysisSettings {
        cache_ttl: Duration::from_secs(600),
        ..settings()
    }
}

/// A repeated batch is served from the cache without calling the service.
#[tokio::test]
async fn cache_hit_skips_service() {
    let transport = FakeTransport::new(vec![]);
    let engine = AnalysisEngine::with_transport(transport.clone(), cached_settings());

    let first = engine.analyze(AnalysisKind::Skin, batch(2)).await;
    let second = engine.analyze(AnalysisKind::Skin, batch(2)).await;

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.report, first.report);
    assert_ne!(second.analysis_id, first.analysis_id);
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.probes(), 1);
}

/// Hair and skin requests for the same images do not share cache entries.
#[tokio::test]
async fn cache_is_keyed_by_kind() {
    let transport = FakeTransport::new(vec![]);
    let engine = AnalysisEngine::with_transport(transport.clone(), cached_settings());

    engine.analyze(AnalysisKind::Skin, batch(1)).await;
    let hair = engine.analyze(AnalysisKind::Hair, batch(1)).await;

    assert!(!hair.cached);
    assert_eq!(transport.probes(), 2);
}

/// Fallback outcomes are never cached.
#[tokio::test]
async fn fallback_is_not_cached() {
    let transport = FakeTransport::unreachable();
    let engine = AnalysisEngine::with_transport(transport.clone(), cached_settings());

    engine.analyze(AnalysisKind::Skin, batch(1)).await;
    let second = engine.analyze(AnalysisKind::Skin, batch(1)).await;

    assert!(!second.cached);
    assert_eq!(transport.probes(), 2);
    assert!(engine.cache().unwrap().is_empty().await);
}

/// Concurrent analyses run independently against the shared transport.
///
/// They are not coordinated against the service's rate limit: both calls
/// are in flight at once, so the pair finishes after one call latency.
#[tokio::test(start_paused = true)]
async fn concurrent_analyses_are_independent() {
    let latency = Duration::from_secs(10);
    let transport = FakeTransport::with_latency(
        vec![ok(skin_json(40, "Fettig")), ok(skin_json(40, "Fettig"))],
        latency,
    );
    let engine = Arc::new(AnalysisEngine::with_transport(transport.clone(), settings()));

    let start = tokio::time::Instant::now();
    let (a, b) = tokio::join!(
        engine.analyze(AnalysisKind::Skin, batch(1)),
        engine.analyze(AnalysisKind::Skin, batch(1)),
    );

    assert_eq!(start.elapsed(), latency);
    assert_ne!(a.analysis_id, b.analysis_id);
    assert_eq!(a.report.score("hydration"), Some(40));
    assert_eq!(b.report.score("hydration"), Some(40));
    assert_eq!(transport.calls(), 2);
}

/// Without a cache TTL the engine keeps no cache.
#[test]
fn engine_without_ttl_has_no_cache() {
    let engine = AnalysisEngine::with_transport(FakeTransport::new(vec![]), settings());
    assert!(engine.cache().is_none());
    assert_eq!(engine.settings().max_batch, 3);
}
