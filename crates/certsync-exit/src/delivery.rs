// crates/certsync-exit/src/delivery.rs
// ============================================================================
// Module: Delivery Client
// Description: Single-attempt HTTP delivery of certificate payloads.
// Purpose: POST payloads to the registry with producer credentials attached.
// Dependencies: certsync-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`HttpTransport`] performs exactly one POST per payload. It never retries:
//! any non-success status or transport failure is returned to the caller,
//! which buffers the payload for operator redelivery.
//! Invariants:
//! - Redirects are rejected.
//! - Connect and total timeouts are always set.
//!
//! Security posture: the bearer token never appears in errors; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use certsync_core::CertificatePayload;
use certsync_core::InstanceId;
use certsync_core::PRODUCER_INSTANCE_HEADER;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of response body characters kept in error details.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Successful delivery acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// HTTP status returned by the registry.
    pub status: u16,
}

/// Delivery failures. All of them lead to buffering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Client(String),
    /// The payload could not be serialized.
    #[error("payload encoding failed: {0}")]
    Encode(String),
    /// The request failed before a response arrived.
    #[error("http request failed: {0}")]
    Request(String),
    /// The registry answered with a non-success status.
    #[error("http status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        detail: String,
    },
}

/// Delivers payloads to the registry.
pub trait Transport: Send + Sync {
    /// Performs one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on any failure, including non-2xx statuses.
    fn deliver(&self, payload: &CertificatePayload) -> Result<DeliveryReceipt, TransportError>;
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Blocking HTTP transport.
pub struct HttpTransport {
    /// Shared HTTP client.
    client: Client,
    /// Ingestion endpoint.
    endpoint: Url,
    /// Bearer token.
    token: String,
    /// Producer instance identifier.
    instance: InstanceId,
}

impl HttpTransport {
    /// Builds a transport with a fresh client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] when the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        token: String,
        instance: InstanceId,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self::with_client(client, endpoint, token, instance))
    }

    /// Builds a transport around an existing client.
    #[must_use]
    pub const fn with_client(
        client: Client,
        endpoint: Url,
        token: String,
        instance: InstanceId,
    ) -> Self {
        Self {
            client,
            endpoint,
            token,
            instance,
        }
    }
}

impl Transport for HttpTransport {
    fn deliver(&self, payload: &CertificatePayload) -> Result<DeliveryReceipt, TransportError> {
        let body =
            serde_json::to_vec(payload).map_err(|err| TransportError::Encode(err.to_string()))?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .header(PRODUCER_INSTANCE_HEADER, self.instance.as_hyphenated())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| TransportError::Request(err.without_url().to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(DeliveryReceipt {
                status: status.as_u16(),
            });
        }
        let detail: String =
            response.text().unwrap_or_default().chars().take(MAX_ERROR_BODY_CHARS).collect();
        Err(TransportError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}
