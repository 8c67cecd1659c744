// crates/certsync-exit/src/module.rs
// ============================================================================
// Module: Exit Module
// Description: Host-facing entry point for certificate lifecycle notifications.
// Purpose: Run extract, build, validate, deliver, and buffer for one event.
// Dependencies: certsync-config, certsync-core
// ============================================================================

//! ## Overview
//! [`ExitModule`] is built once at host startup from [`ExitConfig`] and then
//! invoked for every notification. Each call ends in exactly one of three
//! places: delivered to the registry, preserved in the buffer store, or an
//! [`ExitError::BufferWrite`] naming why the payload could not be preserved.
//! Each call records one audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use certsync_config::ConfigError;
use certsync_config::ExitConfig;
use certsync_core::EventKind;
use certsync_core::TemplateNameResolver;
use serde::Serialize;
use thiserror::Error;

use crate::audit::ExitAuditEvent;
use crate::audit::ExitAuditEventParams;
use crate::audit::ExitAuditSink;
use crate::audit::ExitOutcome;
use crate::audit::FileExitAuditSink;
use crate::audit::StderrExitAuditSink;
use crate::buffer::BufferError;
use crate::buffer::BufferFailure;
use crate::buffer::BufferReceipt;
use crate::buffer::BufferStore;
use crate::buffer::BufferedPayload;
use crate::buffer::FailureKind;
use crate::builder::build_payload;
use crate::builder::validate_for_delivery;
use crate::delivery::DeliveryReceipt;
use crate::delivery::HttpTransport;
use crate::delivery::Transport;
use crate::delivery::TransportError;
use crate::extractor::EventExtractor;
use crate::properties::PropertyBag;
use crate::properties::PropertyValue;
use crate::properties::names;
use crate::template::CachedTemplateResolver;
use crate::template::StaticTemplateResolver;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Template resolver used by config-built modules.
pub type ConfiguredResolver = CachedTemplateResolver<StaticTemplateResolver>;

/// Result of handling one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryReport {
    /// The registry accepted the payload.
    Delivered {
        /// HTTP status returned by the registry.
        status: u16,
    },
    /// The payload was preserved locally.
    Buffered {
        /// Why delivery did not happen.
        failure: BufferFailure,
        /// Files written.
        receipt: BufferReceipt,
    },
}

/// Exit module errors.
#[derive(Debug, Error)]
pub enum ExitError {
    /// Configuration could not be turned into a module.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Delivery failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Buffer store access failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// The diagnostic log could not be opened.
    #[error("diagnostic log unavailable: {0}")]
    AuditLog(String),
    /// A failed event could not be preserved.
    #[error("{} failure could not be buffered: {error}", .failure.kind.as_str())]
    BufferWrite {
        /// Original failure.
        failure: BufferFailure,
        /// Buffer write failure.
        error: BufferError,
    },
}

// ============================================================================
// SECTION: Exit Module
// ============================================================================

/// Producer pipeline for one issuing authority.
pub struct ExitModule<R> {
    /// Event extractor.
    extractor: EventExtractor<R>,
    /// Delivery client.
    transport: Box<dyn Transport>,
    /// Local buffer store.
    buffer: BufferStore,
    /// Diagnostic sink.
    audit: Arc<dyn ExitAuditSink>,
}

impl ExitModule<ConfiguredResolver> {
    /// Builds the module from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExitError`] when the credential cannot be resolved, the HTTP
    /// client cannot be built, or the buffer or log directories are unusable.
    pub fn from_config(config: &ExitConfig) -> Result<Self, ExitError> {
        let token = config.credential.resolve()?;
        let transport = HttpTransport::new(
            config.endpoint()?,
            token,
            config.instance()?,
            config.connect_timeout(),
            config.request_timeout(),
        )?;
        let buffer = BufferStore::open(&config.buffer_dir)?;
        let audit: Arc<dyn ExitAuditSink> = match &config.log_dir {
            Some(dir) => Arc::new(
                FileExitAuditSink::in_dir(dir)
                    .map_err(|err| ExitError::AuditLog(err.to_string()))?,
            ),
            None => Arc::new(StderrExitAuditSink),
        };
        let templates =
            CachedTemplateResolver::new(StaticTemplateResolver::new(config.templates.clone()));
        let extractor = EventExtractor::new(
            &config.ca_id,
            &config.issuer_name,
            templates,
            &config.fallback_template_name,
        );
        Ok(Self::new(extractor, Box::new(transport), buffer, audit))
    }
}

impl<R: TemplateNameResolver> ExitModule<R> {
    /// Assembles a module from its parts.
    #[must_use]
    pub fn new(
        extractor: EventExtractor<R>,
        transport: Box<dyn Transport>,
        buffer: BufferStore,
        audit: Arc<dyn ExitAuditSink>,
    ) -> Self {
        Self {
            extractor,
            transport,
            buffer,
            audit,
        }
    }

    /// Returns the buffer store.
    #[must_use]
    pub const fn buffer(&self) -> &BufferStore {
        &self.buffer
    }

    /// Handles one certificate lifecycle notification.
    ///
    /// # Errors
    ///
    /// Returns [`ExitError::BufferWrite`] only when delivery did not happen
    /// and the payload could not be buffered either.
    pub fn on_certificate_event(
        &self,
        context: i64,
        kind: EventKind,
        properties: &PropertyBag,
    ) -> Result<DeliveryReport, ExitError> {
        let event = match self.extractor.extract(kind, properties) {
            Ok(event) => event,
            Err(err) => {
                let serial = properties.get(names::SERIAL_NUMBER).and_then(PropertyValue::as_text);
                let failure = buffer_failure(FailureKind::Extraction, err.to_string());
                let envelope = BufferedPayload::from_properties(
                    context,
                    kind,
                    properties,
                    serial.clone(),
                    failure.clone(),
                );
                return self.preserve(context, kind, serial, envelope, failure, None);
            }
        };
        let payload = build_payload(&event);
        let serial = payload.serial_number().map(str::to_string);
        if let Err(err) = validate_for_delivery(&payload, kind) {
            let failure = buffer_failure(FailureKind::Validation, err.to_string());
            let envelope =
                BufferedPayload::from_payload(context, kind, &payload, failure.clone());
            return self.preserve(context, kind, serial, envelope, failure, None);
        }
        match self.transport.deliver(&payload) {
            Ok(receipt) => {
                self.record(ExitAuditEventParams {
                    context,
                    event_kind: kind,
                    serial_number: serial,
                    outcome: ExitOutcome::Delivered,
                    http_status: Some(receipt.status),
                    failure_kind: None,
                    failure_detail: None,
                    buffer_files: Vec::new(),
                });
                Ok(DeliveryReport::Delivered {
                    status: receipt.status,
                })
            }
            Err(err) => {
                let http_status = match &err {
                    TransportError::Status {
                        status, ..
                    } => Some(*status),
                    _ => None,
                };
                let failure = buffer_failure(FailureKind::Transport, err.to_string());
                let envelope =
                    BufferedPayload::from_payload(context, kind, &payload, failure.clone());
                self.preserve(context, kind, serial, envelope, failure, http_status)
            }
        }
    }

    /// Redelivers one buffered envelope and removes it on success.
    ///
    /// # Errors
    ///
    /// Returns [`ExitError`] when the file cannot be loaded, holds a raw
    /// extraction failure, or delivery fails. The file is kept on failure.
    pub fn redeliver(&self, name: &str, keep: bool) -> Result<DeliveryReceipt, ExitError> {
        let envelope = self.buffer.load(name)?;
        let payload = envelope.certificate_payload()?;
        let receipt = self.transport.deliver(&payload)?;
        if !keep {
            self.buffer.remove(name)?;
        }
        self.record(ExitAuditEventParams {
            context: envelope.context,
            event_kind: envelope.event_kind,
            serial_number: envelope.serial_number,
            outcome: ExitOutcome::Delivered,
            http_status: Some(receipt.status),
            failure_kind: None,
            failure_detail: None,
            buffer_files: vec![name.to_string()],
        });
        Ok(receipt)
    }

    /// Writes a failed event to the buffer store and records the outcome.
    fn preserve(
        &self,
        context: i64,
        kind: EventKind,
        serial_number: Option<String>,
        envelope: Result<BufferedPayload, BufferError>,
        failure: BufferFailure,
        http_status: Option<u16>,
    ) -> Result<DeliveryReport, ExitError> {
        match envelope.and_then(|envelope| self.buffer.put(&envelope)) {
            Ok(receipt) => {
                let mut buffer_files = vec![receipt.attempt_file.clone()];
                buffer_files.extend(receipt.serial_file.clone());
                let detail = match &receipt.serial_error {
                    Some(error) => format!("{}; serial snapshot: {error}", failure.detail),
                    None => failure.detail.clone(),
                };
                self.record(ExitAuditEventParams {
                    context,
                    event_kind: kind,
                    serial_number,
                    outcome: ExitOutcome::Buffered,
                    http_status,
                    failure_kind: Some(failure.kind),
                    failure_detail: Some(detail),
                    buffer_files,
                });
                Ok(DeliveryReport::Buffered {
                    failure,
                    receipt,
                })
            }
            Err(error) => {
                self.record(ExitAuditEventParams {
                    context,
                    event_kind: kind,
                    serial_number,
                    outcome: ExitOutcome::BufferFailed,
                    http_status,
                    failure_kind: Some(failure.kind),
                    failure_detail: Some(format!("{}; buffer: {error}", failure.detail)),
                    buffer_files: Vec::new(),
                });
                Err(ExitError::BufferWrite {
                    failure,
                    error,
                })
            }
        }
    }

    /// Records one audit event.
    fn record(&self, params: ExitAuditEventParams) {
        self.audit.record(&ExitAuditEvent::new(params));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a buffer failure record.
const fn buffer_failure(kind: FailureKind, detail: String) -> BufferFailure {
    BufferFailure {
        kind,
        detail,
    }
}
