use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::types::{DirectoryError, ErrorResponse, ModelTagsResponse};
use crate::config::DEFAULT_HOST;

/// Source of the model names available on a host
#[async_trait]
pub trait ModelDirectory: Send + Sync {
    async fn list_models(
        &self,
        host: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<String>, DirectoryError>;
}

/// HTTP client for a single Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http_client: Client,
}

#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    host: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl OllamaClientBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Bearer token for servers behind an authenticating proxy
    pub fn api_key(mut self, api_key: Option<impl Into<String>>) -> Self {
        self.api_key = api_key.map(Into::into).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> OllamaClient {
        OllamaClient {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            api_key: self.api_key,
            timeout: self.timeout,
            http_client: self.http_client.unwrap_or_default(),
        }
    }
}

impl OllamaClient {
    pub fn builder() -> OllamaClientBuilder {
        OllamaClientBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetch `GET /api/tags`
    pub async fn model_tags(&self) -> Result<ModelTagsResponse, DirectoryError> {
        let url = tags_url(&self.host)?;
        tracing::debug!("Fetching model tags from {}", url);

        let mut request = self.http_client.get(url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            let detail = detail.trim();
            return Err(if detail.is_empty() {
                DirectoryError::other(status.to_string())
            } else {
                DirectoryError::other(format!("{}: {}", status, detail))
            });
        }

        response
            .json::<ModelTagsResponse>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.map_transport_error(e)
                } else {
                    DirectoryError::other(format!("Invalid model list response: {}", e))
                }
            })
    }

    /// Names of the installed models, in server order
    pub async fn list_models(&self) -> Result<Vec<String>, DirectoryError> {
        let tags = self.model_tags().await?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| m.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    fn map_transport_error(&self, e: reqwest::Error) -> DirectoryError {
        if e.is_connect() {
            tracing::debug!("Connection to {} failed: {}", self.host, e);
            DirectoryError::Connection {
                host: self.host.clone(),
            }
        } else if e.is_timeout() {
            match self.timeout {
                Some(timeout) => {
                    DirectoryError::other(format!("Request timed out after {:?}", timeout))
                }
                None => DirectoryError::other("Request timed out"),
            }
        } else {
            DirectoryError::other(e.to_string())
        }
    }
}

/// Builds an [`OllamaClient`] per request from the draft's host and key
#[derive(Debug, Clone, Default)]
pub struct OllamaDirectory {
    timeout: Option<Duration>,
    http_client: Client,
}

impl OllamaDirectory {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl ModelDirectory for OllamaDirectory {
    async fn list_models(
        &self,
        host: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<String>, DirectoryError> {
        OllamaClient::builder()
            .host(host)
            .api_key(api_key)
            .timeout(self.timeout)
            .http_client(self.http_client.clone())
            .build()
            .list_models()
            .await
    }
}

/// Validate the host and derive the tags endpoint
pub fn tags_url(host: &str) -> Result<Url, DirectoryError> {
    let base = Url::parse(host.trim())
        .map_err(|e| DirectoryError::other(format!("Invalid host URL '{}': {}", host, e)))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(DirectoryError::other(format!(
            "Invalid host URL '{}': scheme must be http or https",
            host
        )));
    }

    let endpoint = format!("{}/api/tags", base.as_str().trim_end_matches('/'));
    Url::parse(&endpoint)
        .map_err(|e| DirectoryError::other(format!("Invalid host URL '{}': {}", host, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use pretty_assertions::assert_eq;

    async fn serve(app: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}", addr), server)
    }

    /// A port that was just bound and released, so nothing listens on it
    async fn closed_port_host() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_tags_url() {
        assert_eq!(
            tags_url("http://localhost:11434").unwrap().as_str(),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            tags_url("http://localhost:11434/").unwrap().as_str(),
            "http://localhost:11434/api/tags"
        );
        assert_eq!(
            tags_url("https://proxy.example.com/ollama").unwrap().as_str(),
            "https://proxy.example.com/ollama/api/tags"
        );
    }

    #[test]
    fn test_tags_url_rejects_invalid_hosts() {
        assert!(tags_url("localhost:11434").is_err());
        assert!(tags_url("ftp://localhost").is_err());
        assert!(tags_url("").is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let client = OllamaClient::builder().build();
        assert_eq!(client.host(), "http://localhost:11434");
        assert!(client.api_key.is_none());

        let client = OllamaClient::builder().api_key(Some("")).build();
        assert!(client.api_key.is_none());
    }

    #[tokio::test]
    async fn test_list_models() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(serde_json::json!({
                    "models": [
                        {"name": "llama3"},
                        {"name": "mistral"}
                    ]
                }))
            }),
        );
        let (host, server) = serve(app).await;

        let models = OllamaClient::builder()
            .host(&host)
            .build()
            .list_models()
            .await
            .unwrap();
        server.abort();

        assert_eq!(models, vec!["llama3".to_string(), "mistral".to_string()]);
    }

    #[tokio::test]
    async fn test_list_models_tolerates_odd_timestamps() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(serde_json::json!({
                    "models": [{"name": "llama3", "modified_at": "2024-05-01 10:20:30"}]
                }))
            }),
        );
        let (host, server) = serve(app).await;

        let models = OllamaDirectory::default().list_models(&host, None).await;
        server.abort();

        assert_eq!(models.unwrap(), vec!["llama3".to_string()]);
    }

    #[tokio::test]
    async fn test_api_key_sent_as_bearer() {
        let app = Router::new().route(
            "/api/tags",
            get(|headers: axum::http::HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer secret-key");
                if authorized {
                    Ok(Json(serde_json::json!({"models": [{"name": "qwen2.5-coder"}]})))
                } else {
                    Err((
                        StatusCode::UNAUTHORIZED,
                        Json(serde_json::json!({"error": "unauthorized"})),
                    ))
                }
            }),
        );
        let (host, server) = serve(app).await;

        let directory = OllamaDirectory::default();
        let ok = directory.list_models(&host, Some("secret-key")).await;
        let denied = directory.list_models(&host, None).await;
        server.abort();

        assert_eq!(ok.unwrap(), vec!["qwen2.5-coder".to_string()]);
        assert_eq!(
            denied.unwrap_err(),
            DirectoryError::other("401 Unauthorized: unauthorized")
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let host = closed_port_host().await;
        let err = OllamaDirectory::default()
            .list_models(&host, None)
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert_eq!(err.user_message(), "Unable to connect to host");
    }

    #[tokio::test]
    async fn test_malformed_body_is_other_error() {
        let app = Router::new().route("/api/tags", get(|| async { "not json" }));
        let (host, server) = serve(app).await;

        let err = OllamaDirectory::default()
            .list_models(&host, None)
            .await
            .unwrap_err();
        server.abort();

        assert!(!err.is_connection());
        assert!(err.user_message().starts_with("Invalid model list response"));
    }

    #[tokio::test]
    async fn test_timeout_is_other_error() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({"models": []}))
            }),
        );
        let (host, server) = serve(app).await;

        let err = OllamaDirectory::new(Some(Duration::from_millis(100)))
            .list_models(&host, None)
            .await
            .unwrap_err();
        server.abort();

        assert_eq!(err, DirectoryError::other("Request timed out after 100ms"));
    }
}
