//! Client plumbing for the external image-understanding service.
//!
//! Provides the [`transport::InferenceTransport`] seam, an HTTP
//! implementation for OpenAI-compatible chat-completions endpoints, the
//! explicit [`policy::RetryPolicy`], and the [`caller::RateLimitedCaller`]
//! that issues one request at a time with backoff and fatal-error
//! short-circuiting.

pub mod caller;
pub mod http;
pub mod policy;
pub mod transport;
