use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::{unwrap_data, AdminApi, Committed, CredentialSource, ErrorEnvelope};
use crate::config::ApiConfig;
use crate::content::model::{ContentItem, ContentPage, ContentQuery, ContentStats};
use crate::content::validate::{LocalFile, Submission, UploadPayload};
use crate::error::{AdminError, AdminResult};
use crate::taxonomy::model::Grade;
use crate::taxonomy::mutation::NodePayload;
use crate::types::NodeKind;

/// reqwest adapter for the platform's REST endpoints
pub struct HttpAdminApi {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialSource>,
    upload_timeout: Duration,
}

impl HttpAdminApi {
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialSource>) -> AdminResult<Self> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            AdminError::field("base_url", format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AdminError::field(
                "base_url",
                format!("'{}' cannot be used as a base URL", config.base_url),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("cwadmin/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            credentials,
            upload_timeout: config.upload_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> AdminResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::field("base_url", "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> AdminResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "request");

        let mut req = self.client.request(method.clone(), url);
        if let Some(token) = self.credentials.bearer_token() {
            req = req.bearer_auth(token);
        }
        if method != Method::GET {
            req = req.header("X-Request-Id", Uuid::new_v4().to_string());
        }
        Ok(req)
    }

    /// Send and return the decoded body (`Null` for empty success bodies)
    async fn execute(&self, req: RequestBuilder) -> AdminResult<Value> {
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(AdminError::from);
        }

        let envelope = serde_json::from_str::<ErrorEnvelope>(&text).unwrap_or_else(|_| ErrorEnvelope {
            message: Some(text.trim().to_string()).filter(|m| !m.is_empty()),
            ..Default::default()
        });
        let err = envelope.into_error(status.as_u16());
        if matches!(err, AdminError::Unauthorized(_)) {
            self.credentials.on_unauthorized();
        }
        warn!(status = status.as_u16(), code = err.error_code(), "request failed: {}", err);
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> AdminResult<T> {
        unwrap_data(self.execute(req).await?)
    }

    fn content_form(submission: &Submission) -> AdminResult<Form> {
        let classification = &submission.classification;
        let mut form = Form::new()
            .text("title", submission.title.clone())
            .text("description", submission.description.clone())
            .text("grade_id", classification.grade_id.clone())
            .text("topic_id", classification.topic_id.clone())
            .text("section_id", classification.section_id.clone())
            .text("content_type", submission.kind.as_str())
            .text("tags", submission.tags.join(","));

        match &submission.payload {
            UploadPayload::File(file) => form = form.part("file", file_part(file, "file")?),
            UploadPayload::Video { url, video_id } => {
                form = form
                    .text("youtube_url", url.clone())
                    .text("youtube_id", video_id.clone())
            }
            UploadPayload::KeepExisting => {}
        }
        if let Some(banner) = &submission.banner {
            form = form.part("banner", file_part(banner, "banner")?);
        }
        if submission.reset_approval {
            form = form.text("is_approved", "false");
        }
        Ok(form)
    }
}

fn file_part(file: &LocalFile, field: &str) -> AdminResult<Part> {
    Part::bytes(file.bytes.clone())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime)
        .map_err(|e| AdminError::field(field, format!("Invalid MIME type '{}': {}", file.mime, e)))
}

#[async_trait]
impl AdminApi for HttpAdminApi {
    async fn fetch_tree(&self) -> AdminResult<Vec<Grade>> {
        let req = self.request(Method::GET, &["api", "taxonomy", "tree"])?;
        self.fetch(req).await
    }

    async fn create_node(&self, kind: NodeKind, payload: &NodePayload) -> AdminResult<Committed> {
        let req = self.request(Method::POST, &["api", kind.collection()])?.json(payload);
        self.execute(req).await.map(Committed::new)
    }

    async fn update_node(&self, kind: NodeKind, id: &str, payload: &NodePayload) -> AdminResult<Committed> {
        let req = self.request(Method::PUT, &["api", kind.collection(), id])?.json(payload);
        self.execute(req).await.map(Committed::new)
    }

    async fn delete_node(&self, kind: NodeKind, id: &str) -> AdminResult<()> {
        let req = self.request(Method::DELETE, &["api", kind.collection(), id])?;
        self.execute(req).await.map(|_| ())
    }

    async fn list_content(&self, query: &ContentQuery) -> AdminResult<ContentPage> {
        let req = self.request(Method::GET, &["api", "content"])?.query(&query.to_params());
        self.fetch(req).await
    }

    async fn get_content(&self, id: &str) -> AdminResult<ContentItem> {
        let req = self.request(Method::GET, &["api", "content", id])?;
        self.fetch(req).await
    }

    async fn content_stats(&self) -> AdminResult<ContentStats> {
        let req = self.request(Method::GET, &["api", "content", "stats"])?;
        self.fetch(req).await
    }

    async fn create_content(&self, submission: &Submission) -> AdminResult<Committed> {
        let form = Self::content_form(submission)?;
        let req = self
            .request(Method::POST, &["api", "content"])?
            .multipart(form)
            .timeout(self.upload_timeout);
        self.execute(req).await.map(Committed::new)
    }

    async fn update_content(&self, id: &str, submission: &Submission) -> AdminResult<Committed> {
        let form = Self::content_form(submission)?;
        let req = self
            .request(Method::PUT, &["api", "content", id])?
            .multipart(form)
            .timeout(self.upload_timeout);
        self.execute(req).await.map(Committed::new)
    }

    async fn approve_content(&self, id: &str) -> AdminResult<()> {
        let req = self.request(Method::POST, &["api", "content", id, "approve"])?;
        self.execute(req).await.map(|_| ())
    }

    async fn delete_content(&self, id: &str) -> AdminResult<()> {
        let req = self.request(Method::DELETE, &["api", "content", id])?;
        self.execute(req).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StaticToken;
    use crate::config::AppConfig;

    fn api_for(base_url: &str) -> AdminResult<HttpAdminApi> {
        let mut config = AppConfig::default().api;
        config.base_url = base_url.to_string();
        HttpAdminApi::new(&config, Arc::new(StaticToken::anonymous()))
    }

    #[test]
    fn endpoints_escape_ids_and_keep_base_path() {
        let api = api_for("https://admin.example.com/v1/").unwrap();
        let url = api.endpoint(&["api", "grades", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://admin.example.com/v1/api/grades/a%20b%2Fc");

        let api = api_for("https://admin.example.com").unwrap();
        let url = api.endpoint(&["api", "taxonomy", "tree"]).unwrap();
        assert_eq!(url.as_str(), "https://admin.example.com/api/taxonomy/tree");
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(api_for("not a url"), Err(AdminError::Validation { .. })));
        assert!(matches!(api_for("mailto:admin@example.com"), Err(AdminError::Validation { .. })));
    }
}
