#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dermascan_core::error::AnalysisError;
use dermascan_core::request::{CaptureBatch, ImagePayload, InferenceRequest};
use dermascan_pipeline::settings::AnalysisSettings;
use dermascan_vision::policy::RetryPolicy;
use dermascan_vision::transport::InferenceTransport;

/// A syntactically valid credential that contains no placeholder marker.
pub const TEST_KEY: &str = "sk-proj-4f9a8b7c6d5e4f3a2b1c0d9e";

/// In-memory stand-in for the inference service.
///
/// `analyze` replays `script` one entry per call and answers with a valid
/// skin response once the script is exhausted.
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<String, AnalysisError>>>,
    probe: Result<(), AnalysisError>,
    latency: Duration,
    calls: AtomicUsize,
    probes: AtomicUsize,
}

impl FakeTransport {
    pub fn new(script: Vec<Result<String, AnalysisError>>) -> Arc<Self> {
        Self::build(script, Ok(()), Duration::ZERO)
    }

    pub fn unreachable() -> Arc<Self> {
        Self::build(
            vec![],
            Err(AnalysisError::Network("connection refused".into())),
            Duration::ZERO,
        )
    }

    pub fn with_latency(
        script: Vec<Result<String, AnalysisError>>,
        latency: Duration,
    ) -> Arc<Self> {
        Self::build(script, Ok(()), latency)
    }

    fn build(
        script: Vec<Result<String, AnalysisError>>,
        probe: Result<(), AnalysisError>,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            probe,
            latency,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    /// Number of `analyze` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceTransport for FakeTransport {
    async fn analyze(&self, _request: &InferenceRequest) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(skin_json(60, "Normal")))
    }

    async fn probe(&self) -> Result<(), AnalysisError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probe.clone()
    }
}

/// Settings with a usable key, no waiting, no jitter and no cache.
pub fn settings() -> AnalysisSettings {
    AnalysisSettings {
        api_key: Some(TEST_KEY.to_string()),
        retry: RetryPolicy::immediate(2),
        fallback_jitter: false,
        ..AnalysisSettings::default()
    }
}

/// A batch of `n` distinct images.
pub fn batch(n: usize) -> CaptureBatch {
    (0..n)
        .map(|i| ImagePayload::jpeg(format!("aW1hZ2Ut{i}")))
        .collect::<Vec<_>>()
        .into()
}

/// Complete skin response with the given hydration and skin type.
pub fn skin_json(hydration: u8, skin_type: &str) -> String {
    serde_json::json!({
        "hydration": hydration,
        "oiliness": 40,
        "elasticity": 70,
        "skin_type": skin_type,
        "texture": "Glatt",
        "concerns": ["Trockenheit", "Rötungen"],
    })
    .to_string()
}

pub fn ok(body: String) -> Result<String, AnalysisError> {
    Ok(body)
}
