//! SHA-256 content hashing for capture batches.
//!
//! Used as the cache key for reports: two batches with the same kind and the
//! same images in the same order map to the same key.

use sha2::{Digest, Sha256};

use crate::request::CaptureBatch;
use crate::schema::AnalysisKind;

/// Content hash of `kind` plus every image (media type and data) in order.
///
/// Each component is length-prefixed so that adjacent fields cannot be
/// re-split into a colliding sequence.
pub fn batch_key(kind: AnalysisKind, batch: &CaptureBatch) -> String {
    let mut hasher = Sha256::new();
    update_framed(&mut hasher, kind.as_str().as_bytes());
    for image in batch.images() {
        update_framed(&mut hasher, image.media_type.as_bytes());
        update_framed(&mut hasher, image.data.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
