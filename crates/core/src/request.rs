//! Capture batches and the per-image inference requests built from them.

use serde::{Deserialize, Serialize};

use crate::prompt::build_prompt;
use crate::schema::AnalysisKind;

/// One already-encoded image as delivered by the capture layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/jpeg`.
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl ImagePayload {
    pub fn new(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// JPEG payload; the capture layer emits JPEG unless told otherwise.
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self::new("image/jpeg", data)
    }

    /// Render as a `data:` URL for the chat-completions image part.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Ordered images captured for one analysis. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureBatch {
    images: Vec<ImagePayload>,
}

impl CaptureBatch {
    pub fn new(images: Vec<ImagePayload>) -> Self {
        Self { images }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ImagePayload] {
        &self.images
    }

    /// The first `limit` images, in capture order.
    pub fn limited(&self, limit: usize) -> &[ImagePayload] {
        &self.images[..self.images.len().min(limit)]
    }
}

impl From<Vec<ImagePayload>> for CaptureBatch {
    fn from(images: Vec<ImagePayload>) -> Self {
        Self::new(images)
    }
}

/// A single image bound to the prompt for its [`AnalysisKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceRequest {
    index: usize,
    kind: AnalysisKind,
    prompt: String,
    image: ImagePayload,
}

impl InferenceRequest {
    /// Build the request for image `index` (zero-based) of a batch.
    pub fn new(index: usize, kind: AnalysisKind, image: ImagePayload) -> Self {
        Self {
            index,
            kind,
            prompt: build_prompt(kind),
            image,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn image(&self) -> &ImagePayload {
        &self.image
    }
}
