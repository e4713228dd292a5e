//! Shared entry point that hands out one orchestrator per request.
//!
//! [`AnalysisEngine`] owns what independent analyses may share: the
//! transport (and with it the HTTP connection pool), the settings, and the
//! optional report cache. It holds no per-request state, so concurrent
//! analyses never observe each other. They do share the service's rate
//! limit, which the engine does not coordinate.

use std::sync::Arc;

use dermascan_core::request::CaptureBatch;
use dermascan_core::schema::AnalysisKind;
use dermascan_vision::http::{HttpTransport, HttpTransportError};
use dermascan_vision::transport::InferenceTransport;

use crate::cache::ReportCache;
use crate::orchestrator::AnalysisOrchestrator;
use crate::outcome::AnalysisOutcome;
use crate::settings::AnalysisSettings;

/// Factory for [`AnalysisOrchestrator`]s. Cheap to share behind an `Arc`.
pub struct AnalysisEngine {
    transport: Arc<dyn InferenceTransport>,
    settings: AnalysisSettings,
    cache: Option<Arc<ReportCache>>,
}

impl AnalysisEngine {
    /// Build an engine talking HTTP to the configured endpoint.
    pub fn from_settings(settings: AnalysisSettings) -> Result<Self, HttpTransportError> {
        let transport = HttpTransport::new(
            settings.api_url.clone(),
            settings.api_key.clone().unwrap_or_default(),
            settings.model.clone(),
            settings.retry.request_timeout,
        )?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    /// Build an engine around an arbitrary transport.
    pub fn with_transport(
        transport: Arc<dyn InferenceTransport>,
        settings: AnalysisSettings,
    ) -> Self {
        let cache = (!settings.cache_ttl.is_zero())
            .then(|| Arc::new(ReportCache::new(settings.cache_ttl)));
        Self {
            transport,
            settings,
            cache,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn cache(&self) -> Option<&Arc<ReportCache>> {
        self.cache.as_ref()
    }

    /// A fresh orchestrator for one request, for callers that need progress
    /// or cancellation hooks.
    pub fn orchestrator(&self, kind: AnalysisKind) -> AnalysisOrchestrator {
        let orchestrator =
            AnalysisOrchestrator::new(kind, Arc::clone(&self.transport), self.settings.clone());
        match &self.cache {
            Some(cache) => orchestrator.with_cache(Arc::clone(cache)),
            None => orchestrator,
        }
    }

    /// Run one analysis with default hooks.
    pub async fn analyze(&self, kind: AnalysisKind, batch: CaptureBatch) -> AnalysisOutcome {
        self.orchestrator(kind).run(batch).await
    }
}
