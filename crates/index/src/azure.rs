//! Azure AI Search adapter.
//!
//! Speaks the REST API directly:
//! - `POST /indexes/{index}/docs/search` for ranked retrieval
//! - `POST /indexes/{index}/docs/index` with `@search.action = upload` for ingestion

use anmi_config::ResolvedSearch;
use anmi_core::error::IndexError;
use anmi_core::index::{SearchHit, SearchIndex, SearchRequest, UploadSummary};
use anmi_core::passage::Passage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct AzureSearchIndex {
    endpoint: String,
    index_name: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureSearchIndex {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            api_key: api_key.into(),
            api_version: "2023-11-01".into(),
            client: build_client(30),
        }
    }

    /// Build from validated configuration.
    pub fn from_config(search: &ResolvedSearch) -> Self {
        Self {
            endpoint: search.endpoint.trim_end_matches('/').to_string(),
            index_name: search.index_name.clone(),
            api_key: search.api_key.clone(),
            api_version: search.api_version.clone(),
            client: build_client(search.timeout_secs),
        }
    }

    fn docs_url(&self, op: &str) -> String {
        format!(
            "{}/indexes/{}/docs/{op}?api-version={}",
            self.endpoint, self.index_name, self.api_version
        )
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, IndexError> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IndexError::Timeout(e.to_string())
                } else {
                    IndexError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 401 || status == 403 {
            return Err(IndexError::AuthenticationFailed(
                "Invalid search API key".into(),
            ));
        }

        // 207 is a partial upload; the per-item statuses say which failed
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Search index returned error");
            return Err(IndexError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait]
impl SearchIndex for AzureSearchIndex {
    fn name(&self) -> &str {
        "azure_search"
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, IndexError> {
        let url = self.docs_url("search");
        let body = SearchBody {
            search: &request.text,
            select: request.select.join(","),
            top: request.top,
        };

        debug!(index = %self.index_name, top = request.top, "Searching index");

        let response = self.post(&url, &body).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

        Ok(parsed.value)
    }

    async fn upload(&self, passages: &[Passage]) -> Result<UploadSummary, IndexError> {
        let url = self.docs_url("index");
        let body = UploadBody {
            value: passages
                .iter()
                .map(|p| UploadAction {
                    action: "upload",
                    passage: p,
                })
                .collect(),
        };

        debug!(index = %self.index_name, count = passages.len(), "Uploading batch");

        let response = self.post(&url, &body).await?;
        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

        Ok(UploadSummary {
            succeeded: parsed.value.iter().filter(|r| r.status).count(),
            total: passages.len(),
        })
    }
}

// --- REST payloads (internal) ---

#[derive(Serialize)]
struct SearchBody<'a> {
    search: &'a str,
    select: String,
    top: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchHit>,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    value: Vec<UploadAction<'a>>,
}

#[derive(Serialize)]
struct UploadAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    passage: &'a Passage,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    value: Vec<UploadItemResult>,
}

#[derive(Deserialize)]
struct UploadItemResult {
    #[serde(default)]
    status: bool,
}
