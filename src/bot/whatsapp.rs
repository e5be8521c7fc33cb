//! WhatsApp Cloud API adapter.
//!
//! Meta calls `GET /webhook/whatsapp` once to verify the endpoint and then
//! `POST /webhook/whatsapp` for every inbound message. Replies go back out
//! through the Graph API `/{phone_number_id}/messages` endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::ApiError;
use crate::bot::commands::BotHandler;
use crate::config::WhatsAppConfig;

// ═══════════════════════════════════════════════════════════
// Webhook payload
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// A text message pulled out of a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingText {
    pub from: String,
    pub body: String,
}

impl WebhookPayload {
    /// All text messages in the payload. Statuses and media are skipped.
    pub fn text_messages(&self) -> Vec<IncomingText> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .filter(|change| change.field.is_empty() || change.field == "messages")
            .flat_map(|change| &change.value.messages)
            .filter(|msg| msg.kind == "text")
            .filter_map(|msg| {
                let body = msg.text.as_ref()?.body.trim();
                (!body.is_empty()).then(|| IncomingText {
                    from: msg.from.clone(),
                    body: body.to_string(),
                })
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════
// Outbound client
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
struct OutboundMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: OutboundText<'a>,
}

#[derive(Serialize)]
struct OutboundText<'a> {
    body: &'a str,
}

/// Sends text replies through the Graph API.
pub struct WhatsAppClient {
    http: reqwest::Client,
    messages_url: String,
    access_token: String,
}

impl WhatsAppClient {
    pub fn new(api_base: &str, phone_number_id: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            messages_url: format!("{}/{}/messages", api_base.trim_end_matches('/'), phone_number_id),
            access_token: access_token.to_string(),
        }
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), String> {
        let message = OutboundMessage {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: OutboundText { body },
        };

        let response = self
            .http
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&message)
            .send()
            .await
            .map_err(|e| format!("WhatsApp request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("WhatsApp API returned {status}: {detail}"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Webhook routes
// ═══════════════════════════════════════════════════════════

/// State behind the webhook routes.
pub struct WhatsAppBridge {
    verify_token: String,
    handler: Arc<BotHandler>,
    client: Option<Arc<WhatsAppClient>>,
}

impl WhatsAppBridge {
    pub fn new(config: &WhatsAppConfig, handler: Arc<BotHandler>) -> Self {
        let client = match (&config.access_token, &config.phone_number_id) {
            (Some(token), Some(phone_number_id)) => {
                Some(Arc::new(WhatsAppClient::new(&config.api_base, phone_number_id, token)))
            }
            _ => {
                warn!("WhatsApp access token not configured; replies will be logged only");
                None
            }
        };
        Self {
            verify_token: config.verify_token.clone(),
            handler,
            client,
        }
    }
}

pub fn routes(bridge: Arc<WhatsAppBridge>) -> Router {
    Router::new()
        .route("/webhook/whatsapp", get(verify).post(receive))
        .with_state(bridge)
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /webhook/whatsapp` - echo the challenge when the token matches.
pub async fn verify(
    State(bridge): State<Arc<WhatsAppBridge>>,
    Query(params): Query<VerifyParams>,
) -> Result<String, ApiError> {
    let subscribed = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(bridge.verify_token.as_str());

    match params.challenge {
        Some(challenge) if subscribed && token_ok => {
            info!("✅ WhatsApp webhook verified");
            Ok(challenge)
        }
        _ => {
            warn!("WhatsApp webhook verification rejected");
            Err(ApiError::Forbidden)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveResponse {
    pub processed: usize,
}

/// `POST /webhook/whatsapp` - answer each text message.
///
/// Replies are sent from spawned tasks so the webhook is acknowledged
/// without waiting on the Graph API.
pub async fn receive(
    State(bridge): State<Arc<WhatsAppBridge>>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<ReceiveResponse>, ApiError> {
    let Json(payload) = payload?;
    let messages = payload.text_messages();

    for msg in &messages {
        let key = format!("wa:{}", msg.from);
        let preview: String = msg.body.chars().take(50).collect();
        info!("📨 WhatsApp {}: \"{}\"", msg.from, preview);

        let reply = bridge.handler.handle(&key, &key, &msg.body);

        match &bridge.client {
            Some(client) => {
                let client = client.clone();
                let to = msg.from.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.send_text(&to, &reply).await {
                        warn!("Failed to reply on WhatsApp to {}: {}", to, e);
                    }
                });
            }
            None => info!("[no access token] Would reply to {}: {}", msg.from, reply),
        }
    }

    Ok(Json(ReceiveResponse { processed: messages.len() }))
}
