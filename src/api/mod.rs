//! Remote service boundary.
//!
//! [`AdminApi`] is the only way the console talks to the platform. The
//! production adapter is [`http::HttpAdminApi`]; tests substitute an
//! in-memory implementation.

pub mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::content::model::{ContentItem, ContentPage, ContentQuery, ContentStats};
use crate::content::validate::Submission;
use crate::error::{AdminError, AdminResult};
use crate::taxonomy::model::Grade;
use crate::taxonomy::mutation::NodePayload;
use crate::types::NodeKind;

pub use http::HttpAdminApi;

#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn fetch_tree(&self) -> AdminResult<Vec<Grade>>;

    async fn create_node(&self, kind: NodeKind, payload: &NodePayload) -> AdminResult<Committed>;
    async fn update_node(&self, kind: NodeKind, id: &str, payload: &NodePayload) -> AdminResult<Committed>;
    async fn delete_node(&self, kind: NodeKind, id: &str) -> AdminResult<()>;

    async fn list_content(&self, query: &ContentQuery) -> AdminResult<ContentPage>;
    async fn get_content(&self, id: &str) -> AdminResult<ContentItem>;
    async fn content_stats(&self) -> AdminResult<ContentStats>;
    async fn create_content(&self, submission: &Submission) -> AdminResult<Committed>;
    async fn update_content(&self, id: &str, submission: &Submission) -> AdminResult<Committed>;
    async fn approve_content(&self, id: &str) -> AdminResult<()>;
    async fn delete_content(&self, id: &str) -> AdminResult<()>;
}

/// Reply body of a write the service accepted.
///
/// The write has happened whatever the body holds, so callers reconcile their
/// caches first and decode afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Committed(Value);

impl Committed {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    /// Serialize an echoed record
    pub fn echo<T: Serialize>(record: &T) -> AdminResult<Self> {
        Ok(Self(serde_json::to_value(record)?))
    }

    /// `None` for an empty body or `data: null`
    pub fn decode<T: DeserializeOwned>(self) -> AdminResult<Option<T>> {
        unwrap_data(self.0)
    }
}

/// Supplies the bearer credential; owned by the session layer, not by the console
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Called when the service rejects the credential (401)
    fn on_unauthorized(&self) {}
}

/// Fixed token held in memory
#[derive(Debug, Default)]
pub struct StaticToken {
    token: Mutex<Option<String>>,
}

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn on_unauthorized(&self) {
        if let Ok(mut token) = self.token.lock() {
            *token = None;
        }
    }
}

/// Failure body: `{ "success": false, "error": "...", "field_errors": {...} }`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field_errors: Option<HashMap<String, String>>,
}

impl ErrorEnvelope {
    pub fn into_error(self, status: u16) -> AdminError {
        let message = self
            .message
            .or(self.error)
            .unwrap_or_else(|| format!("request failed with status {}", status));
        AdminError::from_status(status, message, self.field_errors.unwrap_or_default())
    }
}

/// Unwrap a `{ "success": true, "data": ... }` envelope; bare bodies pass through
pub fn unwrap_data<T: DeserializeOwned>(body: Value) -> AdminResult<T> {
    let data = match body {
        Value::Object(mut map) if map.contains_key("success") && map.contains_key("data") => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                let envelope: ErrorEnvelope = serde_json::from_value(Value::Object(map))?;
                return Err(AdminError::invalid_response(
                    envelope
                        .message
                        .or(envelope.error)
                        .unwrap_or_else(|| "service reported failure".to_string()),
                ));
            }
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(data).map_err(AdminError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_success_envelope() {
        let stats: ContentStats =
            unwrap_data(json!({ "success": true, "data": { "total": 3, "pending": 1, "approved": 2 } })).unwrap();
        assert_eq!(stats.approved, 2);
    }

    #[test]
    fn accepts_bare_bodies() {
        let stats: ContentStats = unwrap_data(json!({ "total": 1, "pending": 1, "approved": 0 })).unwrap();
        assert_eq!(stats.pending, 1);
    }

    #[test]
    fn failure_envelope_with_ok_status_is_invalid() {
        let err = unwrap_data::<ContentStats>(json!({ "success": false, "data": null, "error": "nope" })).unwrap_err();
        assert!(matches!(err, AdminError::InvalidResponse(msg) if msg == "nope"));
    }

    #[test]
    fn error_envelope_maps_status() {
        let envelope = ErrorEnvelope {
            error: Some("Slug already exists".into()),
            field_errors: Some(HashMap::from([("slug".to_string(), "taken".to_string())])),
            ..Default::default()
        };
        let err = envelope.into_error(422);
        assert_eq!(err.field_errors().unwrap()["slug"], "taken");
    }

    #[test]
    fn committed_replies_tolerate_empty_bodies() {
        let empty: Option<ContentStats> = Committed::default().decode().unwrap();
        assert_eq!(empty, None);

        let null: Option<ContentStats> = Committed::new(json!({ "success": true, "data": null })).decode().unwrap();
        assert_eq!(null, None);

        let echoed: Option<ContentStats> =
            Committed::new(json!({ "total": 1, "pending": 0, "approved": 1 })).decode().unwrap();
        assert_eq!(echoed.map(|s| s.approved), Some(1));
    }

    #[test]
    fn static_token_clears_on_unauthorized() {
        let token = StaticToken::new(Some("abc".into()));
        assert_eq!(token.bearer_token().as_deref(), Some("abc"));
        token.on_unauthorized();
        assert_eq!(token.bearer_token(), None);
    }
}
