//! Trait interfaces for domain services the gateway delegates to.
//! Each trait has a `Noop` implementation so the gateway can run standalone
//! before a real scanner or webhook consumer is wired in.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    tracing::debug,
    warden_auth::Principal,
};

/// Error type returned by service methods.
pub type ServiceError = String;
pub type ServiceResult<T = Value> = Result<T, ServiceError>;

// ── Scan ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub severity: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[async_trait]
pub trait ScanService: Send + Sync {
    async fn scan(&self, principal: &Principal, request: ScanRequest)
    -> ServiceResult<Vec<Finding>>;
}

pub struct NoopScanService;

#[async_trait]
impl ScanService for NoopScanService {
    async fn scan(
        &self,
        principal: &Principal,
        request: ScanRequest,
    ) -> ServiceResult<Vec<Finding>> {
        debug!(principal = %principal.id, language = %request.language, "noop scan");
        Ok(Vec::new())
    }
}

// ── Webhooks ─────────────────────────────────────────────────────────────────

/// A webhook payload whose signature has already been verified.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub source: String,
    pub event: String,
    pub delivery_id: Option<String>,
    pub payload: Value,
}

#[async_trait]
pub trait WebhookService: Send + Sync {
    async fn dispatch(&self, event: WebhookEvent) -> ServiceResult;
}

pub struct NoopWebhookService;

#[async_trait]
impl WebhookService for NoopWebhookService {
    async fn dispatch(&self, event: WebhookEvent) -> ServiceResult {
        if event.event == "ping" {
            return Ok(json!({ "message": "pong", "source": event.source }));
        }
        debug!(source = %event.source, event = %event.event, "webhook acknowledged");
        Ok(json!({ "received": true, "event": event.event }))
    }
}

// ── Bundled services ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GatewayServices {
    pub scan: Arc<dyn ScanService>,
    pub webhooks: Arc<dyn WebhookService>,
}

impl GatewayServices {
    pub fn noop() -> Self {
        Self {
            scan: Arc::new(NoopScanService),
            webhooks: Arc::new(NoopWebhookService),
        }
    }

    #[must_use]
    pub fn with_scan(mut self, scan: Arc<dyn ScanService>) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn with_webhooks(mut self, webhooks: Arc<dyn WebhookService>) -> Self {
        self.webhooks = webhooks;
        self
    }
}
