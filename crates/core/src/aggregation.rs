//! Merging of per-image [`PartialResult`]s into one [`AnalysisReport`].
//!
//! All tie-breaks are by first appearance in input order, so the same input
//! always produces the same report.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::report::{AnalysisReport, ReportSource, CONCERN_PLACEHOLDER, REPORT_CONCERN_COUNT};
use crate::types::{clamp_score, Score};
use crate::validation::PartialResult;

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Confidence of a report built from zero images.
pub const CONFIDENCE_BASE: u32 = 30;
/// Confidence added per contributing image.
pub const CONFIDENCE_PER_SOURCE: u32 = 20;
/// Contributing images beyond this count add no confidence.
pub const CONFIDENCE_SOURCE_CAP: usize = 3;
/// Hard ceiling; a photo-based assessment is never reported as certain.
pub const CONFIDENCE_MAX: u32 = 95;

/// `min(95, 30 + 20 * min(source_count, 3))`.
pub fn confidence_for(source_count: usize) -> Score {
    let counted = source_count.min(CONFIDENCE_SOURCE_CAP) as u32;
    (CONFIDENCE_BASE + CONFIDENCE_PER_SOURCE * counted).min(CONFIDENCE_MAX) as Score
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Merge `results` into a single report.
///
/// Returns `None` for an empty slice; callers must route that case to the
/// fallback generator instead.
pub fn aggregate(results: &[PartialResult]) -> Option<AnalysisReport> {
    let first = results.first()?;

    Some(AnalysisReport {
        kind: first.kind,
        scores: mean_scores(results),
        categories: majority_categories(results),
        concerns: top_concerns(results),
        confidence: confidence_for(results.len()),
        source_count: results.len(),
        source: ReportSource::Aggregated,
        generated_at: Utc::now(),
    })
}

/// Per-field arithmetic mean, rounded half away from zero.
fn mean_scores(results: &[PartialResult]) -> BTreeMap<String, Score> {
    let mut sums: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for result in results {
        for (field, &value) in &result.scores {
            let entry = sums.entry(field.as_str()).or_default();
            entry.0 += u32::from(value);
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(field, (sum, count))| {
            let mean = f64::from(sum) / f64::from(count);
            (field.to_string(), clamp_score(mean.round() as i64))
        })
        .collect()
}

/// Most frequent value per categorical field; ties go to the value seen first.
fn majority_categories(results: &[PartialResult]) -> BTreeMap<String, String> {
    let mut per_field: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for result in results {
        for (field, value) in &result.categories {
            per_field.entry(field.as_str()).or_default().push(value.as_str());
        }
    }

    per_field
        .into_iter()
        .filter_map(|(field, values)| {
            let tally = tally_first_seen(values.iter().map(|v| (*v, *v)));
            let winner = tally.into_iter().max_by(by_count_then_first_seen)?;
            Some((field.to_string(), winner.display.to_string()))
        })
        .collect()
}

/// The [`REPORT_CONCERN_COUNT`] most frequent concerns, padded with
/// [`CONCERN_PLACEHOLDER`].
///
/// Labels are compared trimmed and case-insensitively; the spelling kept is
/// the first one encountered.
fn top_concerns(results: &[PartialResult]) -> Vec<String> {
    let normalized: Vec<(String, &str)> = results
        .iter()
        .flat_map(|r| r.concerns.iter())
        .map(|c| (c.trim().to_lowercase(), c.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    let mut tally = tally_first_seen(normalized.iter().map(|(k, d)| (k.as_str(), *d)));
    tally.sort_by(|a, b| by_count_then_first_seen(b, a));

    let mut concerns: Vec<String> = tally
        .into_iter()
        .take(REPORT_CONCERN_COUNT)
        .map(|t| t.display.to_string())
        .collect();
    concerns.resize(REPORT_CONCERN_COUNT, CONCERN_PLACEHOLDER.to_string());
    concerns
}

// ---------------------------------------------------------------------------
// Counting helpers
// ---------------------------------------------------------------------------

struct Tally<'a> {
    display: &'a str,
    count: usize,
    first_seen: usize,
}

/// Count `(key, display)` pairs, remembering where each key first appeared.
fn tally_first_seen<'a>(items: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<Tally<'a>> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    let mut tally: Vec<Tally<'a>> = Vec::new();

    for (key, display) in items {
        match index.get(key) {
            Some(&i) => tally[i].count += 1,
            None => {
                index.insert(key, tally.len());
                tally.push(Tally {
                    display,
                    count: 1,
                    first_seen: tally.len(),
                });
            }
        }
    }
    tally
}

/// Ordering where "greater" means higher count, then earlier appearance.
fn by_count_then_first_seen(a: &Tally<'_>, b: &Tally<'_>) -> std::cmp::Ordering {
    a.count
        .cmp(&b.count)
        .then_with(|| b.first_seen.cmp(&a.first_seen))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
