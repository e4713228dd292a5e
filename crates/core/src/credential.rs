//! Syntactic checks on the inference service credential.
//!
//! Absent, placeholder and malformed keys are all treated like an auth
//! failure: the orchestrator goes straight to the fallback report without
//! issuing a request.

use serde::Serialize;

/// Shortest key accepted as plausibly real.
pub const MIN_KEY_LEN: usize = 20;

/// Substrings that mark a key copied verbatim from a sample `.env` file.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your_api_key",
    "your-api-key",
    "your_openai",
    "placeholder",
    "changeme",
    "replace_me",
    "xxxx",
];

/// Result of inspecting a configured credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Missing,
    Placeholder,
    Malformed,
    Valid,
}

impl CredentialState {
    pub fn is_usable(self) -> bool {
        self == Self::Valid
    }
}

/// Classify an optional credential string.
pub fn check_credential(key: Option<&str>) -> CredentialState {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return CredentialState::Missing;
    };

    let lowered = key.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
        return CredentialState::Placeholder;
    }

    if key.len() < MIN_KEY_LEN || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return CredentialState::Malformed;
    }

    CredentialState::Valid
}
