//! Elasticsearch index client over the HTTP document API.
//!
//! # Configuration
//!
//! ```ignore
//! let client = ElasticsearchIndexClient::connect(&config.index).await?;
//! client.index("logs", json!({"@timestamp": "...", "log_entry": {...}})).await?;
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};

use crate::config::IndexConfig;
use crate::ports::{IndexClient, IndexError};

/// Elasticsearch implementation of the index port.
pub struct ElasticsearchIndexClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<Secret<String>>,
}

impl ElasticsearchIndexClient {
    /// Build the client and check that the cluster answers.
    ///
    /// An unreachable cluster is a fatal startup error.
    pub async fn connect(config: &IndexConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| IndexError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        let es = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        };

        let response = es
            .authorized(es.client.get(format!("{}/", es.base_url)))
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;
        tracing::info!(url = %es.base_url, status = %response.status(), "Index store reachable");

        Ok(es)
    }

    /// Document endpoint for `collection`.
    fn doc_url(&self, collection: &str) -> String {
        format!("{}/{}/_doc", self.base_url, collection)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(
                user,
                self.password.as_ref().map(|p| p.expose_secret().clone()),
            ),
            None => request,
        }
    }
}

#[async_trait]
impl IndexClient for ElasticsearchIndexClient {
    async fn index(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Result<(), IndexError> {
        let response = self
            .authorized(self.client.post(self.doc_url(collection)))
            .json(&document)
            .send()
            .await
            .map_err(map_transport_error)?;

        check_status(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ElasticsearchIndexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchIndexClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn map_transport_error(e: reqwest::Error) -> IndexError {
    if e.is_timeout() {
        IndexError::Unavailable(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        IndexError::Unavailable(format!("Connection failed: {}", e))
    } else {
        IndexError::Unavailable(e.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(url: &str) -> ElasticsearchIndexClient {
        ElasticsearchIndexClient {
            client: Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn doc_url_joins_base_and_collection() {
        let es = client_for("http://localhost:9200/");
        assert_eq!(es.doc_url("logs"), "http://localhost:9200/logs/_doc");
    }

    #[test]
    fn debug_does_not_leak_password() {
        let mut es = client_for("http://localhost:9200");
        es.username = Some("elastic".to_string());
        es.password = Some(Secret::new("hunter2".to_string()));

        let rendered = format!("{:?}", es);
        assert!(rendered.contains("elastic"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_unavailable() {
        let config = IndexConfig {
            url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let result = ElasticsearchIndexClient::connect(&config).await;
        assert!(matches!(result, Err(IndexError::Unavailable(_))));
    }
}
