// crates/certsync-server/src/service.rs
// ============================================================================
// Module: Ingestion Service
// Description: Synchronous request handling for every registry route.
// Purpose: Authenticate, authorize, validate, and delegate to the registry.
// Dependencies: axum, certsync-core, serde_json, time
// ============================================================================

//! ## Overview
//! [`IngestionService`] implements each route as a plain function from
//! request parts to an [`ApiResponse`], so the whole surface is testable
//! without a listener. Certificate submissions pass the gates in a fixed
//! order: ingest token, body size, JSON parse, producer instance header,
//! allow-list match on the declared `caId`, payload validation, and finally
//! the registry's upsert. Every request records one audit event.
//!
//! Security posture: request bodies and headers are untrusted input; see
//! `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::StatusCode;
use certsync_config::MAX_EXPIRING_HORIZON_DAYS;
use certsync_core::CertificateRegistry;
use certsync_core::FieldViolation;
use certsync_core::IngestRejection;
use certsync_core::InstanceId;
use certsync_core::PRODUCER_INSTANCE_HEADER;
use certsync_core::ProducerDraft;
use certsync_core::ProducerEntry;
use certsync_core::ProducerRegistry;
use certsync_core::RegistryError;
use certsync_core::RejectionKind;
use certsync_core::SubmitOutcome;
use certsync_core::payload::fields;
use certsync_core::payload::format_timestamp;
use certsync_core::producer::normalize_account;
use certsync_core::runtime::declared_text;
use certsync_core::runtime::parse_document;
use certsync_core::runtime::parse_submission;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;

use crate::audit::IngestAuditEvent;
use crate::audit::IngestAuditEventParams;
use crate::audit::IngestAuditSink;
use crate::audit::IngestOutcome;
use crate::auth::AuthError;
use crate::auth::TokenSet;

// ============================================================================
// SECTION: Route Labels
// ============================================================================

/// Audit label for certificate submissions.
pub const ROUTE_SUBMIT: &str = "submit_certificate";
/// Audit label for the expiring-certificates read.
pub const ROUTE_EXPIRING: &str = "expiring_certificates";
/// Audit label for the single-certificate read.
pub const ROUTE_CERTIFICATE: &str = "certificate_detail";
/// Audit label for listing allow-list entries.
pub const ROUTE_LIST_PRODUCERS: &str = "list_producers";
/// Audit label for creating an allow-list entry.
pub const ROUTE_CREATE_PRODUCER: &str = "create_producer";
/// Audit label for reading an allow-list entry.
pub const ROUTE_GET_PRODUCER: &str = "get_producer";
/// Audit label for replacing an allow-list entry.
pub const ROUTE_UPDATE_PRODUCER: &str = "update_producer";
/// Audit label for deactivating an allow-list entry.
pub const ROUTE_DEACTIVATE_PRODUCER: &str = "deactivate_producer";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Status and JSON body produced by a route.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body.
    pub body: Value,
}

impl ApiResponse {
    /// Serializes `body` into a response with `status`.
    #[must_use]
    pub fn json(status: StatusCode, body: &impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self {
                status,
                body,
            },
            Err(err) => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_failed",
                &err.to_string(),
            ),
        }
    }
}

/// Parts of a certificate submission request.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    /// `Authorization` header value.
    pub authorization: Option<&'a str>,
    /// Producer instance header value.
    pub instance_id: Option<&'a str>,
    /// Raw request body.
    pub body: &'a [u8],
}

/// Body of the expiring-certificates read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpiringResponse<T: Serialize> {
    /// Horizon applied, in days.
    days: u32,
    /// Validity cutoff (RFC 3339).
    cutoff: Option<String>,
    /// Matching certificates ordered by expiry.
    certificates: T,
}

/// Inputs required to construct the ingestion service.
pub struct IngestionServiceParams {
    /// Certificate registry.
    pub certificates: Arc<dyn CertificateRegistry>,
    /// Producer allow-list.
    pub producers: Arc<dyn ProducerRegistry>,
    /// Audit sink.
    pub audit: Arc<dyn IngestAuditSink>,
    /// Tokens accepted on ingestion and read routes.
    pub ingest_tokens: TokenSet,
    /// Tokens accepted on allow-list management routes.
    pub admin_tokens: TokenSet,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Default horizon for the expiring read, in days.
    pub expiring_horizon_days: u32,
}

/// Identity details collected while handling one request.
struct RequestTrail {
    /// Route label.
    route: &'static str,
    /// Declared producer account.
    producer_account: Option<String>,
    /// Declared producer instance identifier.
    instance_id: Option<String>,
    /// Certificate serial number.
    serial_number: Option<String>,
}

impl RequestTrail {
    /// Starts a trail for `route`.
    const fn new(route: &'static str) -> Self {
        Self {
            route,
            producer_account: None,
            instance_id: None,
            serial_number: None,
        }
    }

    /// Records the identity carried by an allow-list entry.
    fn with_producer(mut self, entry: &ProducerEntry) -> Self {
        self.producer_account = Some(entry.producer_account.clone());
        self.instance_id = Some(entry.instance_id.as_hyphenated());
        self
    }
}

// ============================================================================
// SECTION: Ingestion Service
// ============================================================================

/// Route implementations shared by every HTTP handler.
pub struct IngestionService {
    /// Certificate registry.
    certificates: Arc<dyn CertificateRegistry>,
    /// Producer allow-list.
    producers: Arc<dyn ProducerRegistry>,
    /// Audit sink.
    audit: Arc<dyn IngestAuditSink>,
    /// Tokens accepted on ingestion and read routes.
    ingest_tokens: TokenSet,
    /// Tokens accepted on allow-list management routes.
    admin_tokens: TokenSet,
    /// Maximum request body size in bytes.
    max_body_bytes: usize,
    /// Default horizon for the expiring read, in days.
    expiring_horizon_days: u32,
}

impl IngestionService {
    /// Creates the service.
    #[must_use]
    pub fn new(params: IngestionServiceParams) -> Self {
        Self {
            certificates: params.certificates,
            producers: params.producers,
            audit: params.audit,
            ingest_tokens: params.ingest_tokens,
            admin_tokens: params.admin_tokens,
            max_body_bytes: params.max_body_bytes,
            expiring_horizon_days: params.expiring_horizon_days,
        }
    }

    /// Returns the maximum accepted body size.
    #[must_use]
    pub const fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    // ------------------------------------------------------------------------
    // Certificates
    // ------------------------------------------------------------------------

    /// Handles `POST /api/certificate-data`.
    #[must_use]
    pub fn submit(&self, request: &SubmitRequest<'_>) -> ApiResponse {
        let mut trail = RequestTrail::new(ROUTE_SUBMIT);
        trail.instance_id = request.instance_id.map(|value| value.trim().to_string());
        if let Err(err) = self.ingest_tokens.authorize(request.authorization) {
            return self.unauthenticated(trail, &err);
        }
        if let Some(response) = self.oversized(request.body) {
            return self.conclude(trail, IngestOutcome::Rejected, response, 0, None);
        }
        let document = match parse_document(request.body) {
            Ok(document) => document,
            Err(rejection) => return self.rejected(trail, &rejection),
        };
        trail.producer_account =
            declared_text(&document, fields::CA_ID).map(|value| normalize_account(&value));
        trail.serial_number = declared_text(&document, fields::SERIAL_NUMBER);

        let instance = match request.instance_id.map(InstanceId::parse) {
            Some(Ok(instance)) => instance,
            Some(Err(detail)) => {
                return self
                    .forbidden(trail, format!("invalid {PRODUCER_INSTANCE_HEADER} header: {detail}"));
            }
            None => {
                return self.forbidden(trail, format!("missing {PRODUCER_INSTANCE_HEADER} header"));
            }
        };
        let Some(account) = trail.producer_account.clone() else {
            return self.forbidden(trail, "payload does not declare a producer account".to_string());
        };
        match self.producers.is_authorized(&account, &instance) {
            Ok(true) => {}
            Ok(false) => {
                return self
                    .forbidden(trail, "producer is not on the active allow-list".to_string());
            }
            Err(err) => return self.registry_failure(trail, &err),
        }

        let submission = match parse_submission(&document) {
            Ok(submission) => submission,
            Err(rejection) => return self.rejected(trail, &rejection),
        };
        match self.certificates.submit(&submission) {
            Ok(outcome) => {
                let (status, audit_outcome) = match outcome {
                    SubmitOutcome::Created {
                        ..
                    } => (StatusCode::OK, IngestOutcome::Created),
                    SubmitOutcome::Updated {
                        ..
                    } => (StatusCode::OK, IngestOutcome::Updated),
                    SubmitOutcome::Conflict {
                        ..
                    } => (StatusCode::CONFLICT, IngestOutcome::Conflict),
                };
                let response = ApiResponse::json(status, &outcome);
                self.conclude(trail, audit_outcome, response, 0, None)
            }
            Err(err) => self.storage_error(trail, &err),
        }
    }

    /// Handles `GET /api/certificates/expiring`.
    #[must_use]
    pub fn expiring(&self, authorization: Option<&str>, days: Option<&str>) -> ApiResponse {
        let trail = RequestTrail::new(ROUTE_EXPIRING);
        if let Err(err) = self.ingest_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        let days = match parse_days(days, self.expiring_horizon_days) {
            Ok(days) => days,
            Err(violation) => return self.rejected(trail, &IngestRejection::schema(violation)),
        };
        let cutoff = OffsetDateTime::now_utc() + Duration::days(i64::from(days));
        match self.certificates.expiring_before(cutoff) {
            Ok(certificates) => {
                let body = ExpiringResponse {
                    days,
                    cutoff: format_timestamp(cutoff),
                    certificates,
                };
                let response = ApiResponse::json(StatusCode::OK, &body);
                self.conclude(trail, IngestOutcome::Served, response, 0, None)
            }
            Err(err) => self.storage_error(trail, &err),
        }
    }

    /// Handles `GET /api/certificates/{caId}/{serialNumber}`.
    #[must_use]
    pub fn certificate(
        &self,
        authorization: Option<&str>,
        ca_id: &str,
        serial_number: &str,
    ) -> ApiResponse {
        let ca_id = normalize_account(ca_id);
        let mut trail = RequestTrail::new(ROUTE_CERTIFICATE);
        trail.producer_account = Some(ca_id.clone());
        trail.serial_number = Some(serial_number.to_string());
        if let Err(err) = self.ingest_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        match self.certificates.certificate(&ca_id, serial_number) {
            Ok(Some(detail)) => {
                let response = ApiResponse::json(StatusCode::OK, &detail);
                self.conclude(trail, IngestOutcome::Served, response, 0, None)
            }
            Ok(None) => {
                let message = format!("certificate {ca_id}/{serial_number} not found");
                self.not_found(trail, &message)
            }
            Err(err) => self.storage_error(trail, &err),
        }
    }

    // ------------------------------------------------------------------------
    // Producer Allow-List
    // ------------------------------------------------------------------------

    /// Handles `GET /api/manage/producers`.
    #[must_use]
    pub fn list_producers(&self, authorization: Option<&str>) -> ApiResponse {
        let trail = RequestTrail::new(ROUTE_LIST_PRODUCERS);
        if let Err(err) = self.admin_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        match self.producers.list_producers() {
            Ok(entries) => {
                let response = ApiResponse::json(StatusCode::OK, &entries);
                self.conclude(trail, IngestOutcome::Served, response, 0, None)
            }
            Err(err) => self.registry_failure(trail, &err),
        }
    }

    /// Handles `POST /api/manage/producers`.
    #[must_use]
    pub fn create_producer(&self, authorization: Option<&str>, body: &[u8]) -> ApiResponse {
        let mut trail = RequestTrail::new(ROUTE_CREATE_PRODUCER);
        if let Err(err) = self.admin_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        let draft = match self.read_draft(body) {
            Ok(draft) => draft,
            Err(response) => return self.conclude(trail, IngestOutcome::Rejected, response, 0, None),
        };
        trail.producer_account.clone_from(&draft.producer_account);
        trail.instance_id.clone_from(&draft.instance_id);
        let producer = match draft.into_new() {
            Ok(producer) => producer,
            Err(violations) => return self.rejected(trail, &schema_rejection(violations)),
        };
        match self.producers.create_producer(&producer) {
            Ok(entry) => {
                let response = ApiResponse::json(StatusCode::CREATED, &entry);
                self.conclude(trail.with_producer(&entry), IngestOutcome::Created, response, 0, None)
            }
            Err(err) => self.registry_failure(trail, &err),
        }
    }

    /// Handles `GET /api/manage/producers/{id}`.
    #[must_use]
    pub fn producer(&self, authorization: Option<&str>, producer_id: &str) -> ApiResponse {
        let trail = RequestTrail::new(ROUTE_GET_PRODUCER);
        if let Err(err) = self.admin_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        let producer_id = match parse_producer_id(producer_id) {
            Ok(producer_id) => producer_id,
            Err(violation) => return self.rejected(trail, &IngestRejection::schema(violation)),
        };
        match self.producers.producer(producer_id) {
            Ok(Some(entry)) => {
                let response = ApiResponse::json(StatusCode::OK, &entry);
                self.conclude(trail.with_producer(&entry), IngestOutcome::Served, response, 0, None)
            }
            Ok(None) => self.not_found(trail, &format!("producer {producer_id} not found")),
            Err(err) => self.registry_failure(trail, &err),
        }
    }

    /// Handles `PUT /api/manage/producers/{id}`.
    #[must_use]
    pub fn update_producer(
        &self,
        authorization: Option<&str>,
        producer_id: &str,
        body: &[u8],
    ) -> ApiResponse {
        let mut trail = RequestTrail::new(ROUTE_UPDATE_PRODUCER);
        if let Err(err) = self.admin_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        let producer_id = match parse_producer_id(producer_id) {
            Ok(producer_id) => producer_id,
            Err(violation) => return self.rejected(trail, &IngestRejection::schema(violation)),
        };
        let draft = match self.read_draft(body) {
            Ok(draft) => draft,
            Err(response) => return self.conclude(trail, IngestOutcome::Rejected, response, 0, None),
        };
        trail.producer_account.clone_from(&draft.producer_account);
        trail.instance_id.clone_from(&draft.instance_id);
        let update = match draft.into_update(producer_id) {
            Ok(update) => update,
            Err(violations) => return self.rejected(trail, &schema_rejection(violations)),
        };
        match self.producers.update_producer(producer_id, &update) {
            Ok(entry) => {
                let response = ApiResponse::json(StatusCode::OK, &entry);
                self.conclude(trail.with_producer(&entry), IngestOutcome::Updated, response, 0, None)
            }
            Err(err) => self.registry_failure(trail, &err),
        }
    }

    /// Handles `DELETE /api/manage/producers/{id}` as a soft delete.
    #[must_use]
    pub fn deactivate_producer(&self, authorization: Option<&str>, producer_id: &str) -> ApiResponse {
        let trail = RequestTrail::new(ROUTE_DEACTIVATE_PRODUCER);
        if let Err(err) = self.admin_tokens.authorize(authorization) {
            return self.unauthenticated(trail, &err);
        }
        let producer_id = match parse_producer_id(producer_id) {
            Ok(producer_id) => producer_id,
            Err(violation) => return self.rejected(trail, &IngestRejection::schema(violation)),
        };
        match self.producers.deactivate_producer(producer_id) {
            Ok(entry) => {
                let response = ApiResponse::json(StatusCode::OK, &entry);
                self.conclude(trail.with_producer(&entry), IngestOutcome::Updated, response, 0, None)
            }
            Err(err) => self.registry_failure(trail, &err),
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Returns a 413 response when `body` exceeds the configured limit.
    fn oversized(&self, body: &[u8]) -> Option<ApiResponse> {
        (body.len() > self.max_body_bytes).then(|| {
            error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                &format!("request body exceeds {} bytes", self.max_body_bytes),
            )
        })
    }

    /// Decodes an allow-list draft from a request body.
    fn read_draft(&self, body: &[u8]) -> Result<ProducerDraft, ApiResponse> {
        if let Some(response) = self.oversized(body) {
            return Err(response);
        }
        serde_json::from_slice(body).map_err(|err| {
            let rejection = IngestRejection::schema(FieldViolation::invalid_value(
                "$",
                format!("invalid producer document: {err}"),
            ));
            ApiResponse::json(StatusCode::BAD_REQUEST, &rejection)
        })
    }

    /// Records the audit event and returns `response`.
    fn conclude(
        &self,
        trail: RequestTrail,
        outcome: IngestOutcome,
        response: ApiResponse,
        violation_count: usize,
        detail: Option<String>,
    ) -> ApiResponse {
        self.audit.record(&IngestAuditEvent::new(IngestAuditEventParams {
            route: trail.route,
            producer_account: trail.producer_account,
            instance_id: trail.instance_id,
            serial_number: trail.serial_number,
            outcome,
            status: response.status.as_u16(),
            violation_count,
            detail,
        }));
        response
    }

    /// Responds 401.
    fn unauthenticated(&self, trail: RequestTrail, err: &AuthError) -> ApiResponse {
        let message = err.to_string();
        let response = error_response(StatusCode::UNAUTHORIZED, "unauthenticated", &message);
        self.conclude(trail, IngestOutcome::Unauthenticated, response, 0, Some(message))
    }

    /// Responds 403.
    fn forbidden(&self, trail: RequestTrail, message: String) -> ApiResponse {
        let response = error_response(StatusCode::FORBIDDEN, "forbidden", &message);
        self.conclude(trail, IngestOutcome::Forbidden, response, 0, Some(message))
    }

    /// Responds 404.
    fn not_found(&self, trail: RequestTrail, message: &str) -> ApiResponse {
        let response = error_response(StatusCode::NOT_FOUND, "not_found", message);
        self.conclude(trail, IngestOutcome::NotFound, response, 0, Some(message.to_string()))
    }

    /// Responds 400 with every violation.
    fn rejected(&self, trail: RequestTrail, rejection: &IngestRejection) -> ApiResponse {
        let response = ApiResponse::json(StatusCode::BAD_REQUEST, rejection);
        let detail = Some(rejection.kind.to_string());
        self.conclude(trail, IngestOutcome::Rejected, response, rejection.violations.len(), detail)
    }

    /// Responds 500 for a persistence failure.
    fn storage_error(&self, trail: RequestTrail, err: &RegistryError) -> ApiResponse {
        let message = err.to_string();
        let response =
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", &message);
        self.conclude(trail, IngestOutcome::Error, response, 0, Some(message))
    }

    /// Maps allow-list registry errors onto responses.
    fn registry_failure(&self, trail: RequestTrail, err: &RegistryError) -> ApiResponse {
        match err {
            RegistryError::Conflict(message) => {
                let response = error_response(StatusCode::CONFLICT, "conflict", message);
                self.conclude(trail, IngestOutcome::Conflict, response, 0, Some(message.clone()))
            }
            RegistryError::NotFound(message) => self.not_found(trail, message),
            _ => self.storage_error(trail, err),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a `{error, message}` response.
fn error_response(status: StatusCode, error: &str, message: &str) -> ApiResponse {
    ApiResponse {
        status,
        body: json!({ "error": error, "message": message }),
    }
}

/// Wraps allow-list violations as a schema rejection.
const fn schema_rejection(violations: Vec<FieldViolation>) -> IngestRejection {
    IngestRejection {
        kind: RejectionKind::Schema,
        violations,
    }
}

/// Parses the `days` query parameter.
fn parse_days(raw: Option<&str>, default_days: u32) -> Result<u32, FieldViolation> {
    let Some(raw) = raw else {
        return Ok(default_days);
    };
    let detail = format!("must be an integer between 1 and {MAX_EXPIRING_HORIZON_DAYS}");
    match raw.trim().parse::<u32>() {
        Ok(days) if (1 ..= MAX_EXPIRING_HORIZON_DAYS).contains(&days) => Ok(days),
        _ => Err(FieldViolation::invalid_value("days", detail)),
    }
}

/// Parses an allow-list entry identifier from the path.
fn parse_producer_id(raw: &str) -> Result<i64, FieldViolation> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| FieldViolation::invalid_value("producerId", "must be a positive integer"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
