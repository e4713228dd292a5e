//! Command-line runner for a single analysis.
//!
//! ```text
//! dermascan-worker <skin|hair> <image.jpg.b64>...
//! ```
//!
//! Each image file holds base64 text; the media type is taken from the
//! extension in front of `.b64`. Configuration comes from the environment
//! (see `AnalysisSettings::from_env`). The outcome is printed to stdout as
//! JSON. Ctrl-C cancels the running analysis, which still prints a report.

use std::path::Path;

use anyhow::{bail, Context};
use dermascan_core::request::{CaptureBatch, ImagePayload};
use dermascan_core::schema::AnalysisKind;
use dermascan_pipeline::engine::AnalysisEngine;
use dermascan_pipeline::progress::{self, ProgressEvent};
use dermascan_pipeline::settings::AnalysisSettings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dermascan_worker=debug,dermascan_pipeline=debug,dermascan_vision=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let kind: AnalysisKind = match args.next() {
        Some(raw) => raw.parse().map_err(|e| anyhow::anyhow!("{e}"))?,
        None => bail!("usage: dermascan-worker <skin|hair> <image.b64>..."),
    };
    let batch = load_batch(args)?;

    let settings = AnalysisSettings::from_env()?;
    tracing::info!(
        %kind,
        images = batch.len(),
        max_batch = settings.max_batch,
        skip_remote = settings.skip_remote,
        "Worker starting",
    );

    let engine = AnalysisEngine::from_settings(settings).context("failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling analysis");
            on_signal.cancel();
        }
    });

    let (reporter, mut events) = progress::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::Image {
                    index,
                    total,
                    fraction,
                    status,
                } => tracing::info!(
                    image = index + 1,
                    total,
                    percent = (fraction * 100.0).round() as u32,
                    ?status,
                    "Progress",
                ),
                ProgressEvent::Finished { fallback } => {
                    tracing::info!(fallback, "Analysis finished")
                }
            }
        }
    });

    let outcome = engine
        .orchestrator(kind)
        .with_progress(reporter)
        .with_cancellation(cancel)
        .run(batch)
        .await;
    let _ = printer.await;

    if let Some(diagnostic) = &outcome.diagnostic {
        tracing::warn!(%diagnostic, "Analysis degraded");
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Read every path as a base64 image payload.
fn load_batch(paths: impl Iterator<Item = String>) -> anyhow::Result<CaptureBatch> {
    let mut images = Vec::new();
    for path in paths {
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {path}"))?;
        let data: String = data.split_whitespace().collect();
        if data.is_empty() {
            bail!("{path} is empty");
        }
        images.push(ImagePayload::new(media_type_for(Path::new(&path)), data));
    }
    Ok(CaptureBatch::new(images))
}

fn media_type_for(path: &Path) -> &'static str {
    let inner = match path.extension().and_then(|e| e.to_str()) {
        Some("b64") => path.file_stem().map(Path::new).and_then(|p| p.extension()),
        _ => path.extension(),
    };
    match inner.and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}
