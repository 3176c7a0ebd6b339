// Notion REST client implementing the ContactStore port

use crate::properties::{decode_page, encode_create, encode_update, schema_patch};
use async_trait::async_trait;
use contactsync_core::domain::{
    Cadence, CandidateRecord, ExistingRecord, FieldSet, RecordId, StoreCredentials,
};
use contactsync_core::port::{ContactStore, ContactStoreFactory, StoreError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Notion API version header sent with every request
pub const NOTION_VERSION: &str = "2022-06-28";

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";

/// Largest page size accepted by database queries
const QUERY_PAGE_SIZE: u32 = 100;

/// Notion adapter configuration
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Schedule given to new pages whose candidate has none
    pub default_cadence: Cadence,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            default_cadence: Cadence::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Database {
    #[serde(default)]
    properties: Value,
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Map a failed response to a store error.
///
/// `400 validation_error` means the payload does not fit the database schema
/// and is not retried; any other status is.
fn classify(status: StatusCode, body: &str) -> StoreError {
    let api: ApiError = serde_json::from_str(body).unwrap_or_default();
    let message = if api.message.is_empty() {
        body.chars().take(200).collect()
    } else {
        api.message
    };
    if status == StatusCode::BAD_REQUEST && api.code == "validation_error" {
        StoreError::Schema(message)
    } else {
        StoreError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

/// One database, one integration token
pub struct NotionContactStore {
    client: Client,
    config: NotionConfig,
    token: String,
    database_id: String,
}

impl NotionContactStore {
    pub fn new(client: Client, config: NotionConfig, credentials: &StoreCredentials) -> Self {
        Self {
            client,
            config,
            token: credentials.token.trim().to_string(),
            database_id: credentials.database_id.trim().to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorized(request).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = classify(status, &body);
        warn!(status = status.as_u16(), error = %err, "Notion request failed");
        Err(err)
    }
}

#[async_trait]
impl ContactStore for NotionContactStore {
    async fn fetch_all(&self) -> Result<Vec<ExistingRecord>, StoreError> {
        let url = self.url(&format!("databases/{}/query", self.database_id));
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
            if let Some(start) = &cursor {
                body["start_cursor"] = json!(start);
            }

            let response = self.send(self.client.post(&url).json(&body)).await?;
            let page: QueryResponse = response.json().await.map_err(transport)?;

            let before = records.len();
            records.extend(page.results.iter().filter_map(decode_page));
            debug!(
                database_id = %self.database_id,
                fetched = records.len() - before,
                total = records.len(),
                "Fetched page of contacts"
            );

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    async fn ensure_schema(&self) -> Result<Vec<String>, StoreError> {
        let url = self.url(&format!("databases/{}", self.database_id));
        let response = self.send(self.client.get(&url)).await?;
        let database: Database = response.json().await.map_err(transport)?;

        let patch = schema_patch(&database.properties)?;
        if patch.is_empty() {
            debug!(database_id = %self.database_id, "Contact database schema is complete");
            return Ok(Vec::new());
        }

        let body = json!({ "properties": patch.properties });
        self.send(self.client.patch(&url).json(&body)).await?;
        info!(
            database_id = %self.database_id,
            added = ?patch.added,
            "Added missing contact properties"
        );
        Ok(patch.added)
    }

    async fn create(&self, record: &CandidateRecord) -> Result<RecordId, StoreError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": encode_create(record, &self.config.default_cadence),
        });
        let response = self
            .send(self.client.post(self.url("pages")).json(&body))
            .await?;
        let page: CreatedPage = response.json().await.map_err(transport)?;
        debug!(page_id = %page.id, "Created contact page");
        Ok(page.id)
    }

    async fn update(&self, id: &RecordId, changes: &FieldSet) -> Result<(), StoreError> {
        let body = json!({ "properties": encode_update(changes) });
        self.send(self.client.patch(self.url(&format!("pages/{}", id))).json(&body))
            .await?;
        debug!(page_id = %id, fields = changes.len(), "Updated contact page");
        Ok(())
    }
}

/// Shares one HTTP connection pool across per-request stores
pub struct NotionStoreFactory {
    client: Client,
    config: NotionConfig,
}

impl NotionStoreFactory {
    pub fn new(config: NotionConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { client, config })
    }
}

impl ContactStoreFactory for NotionStoreFactory {
    fn connect(&self, credentials: &StoreCredentials) -> Result<Arc<dyn ContactStore>, StoreError> {
        if credentials.token.trim().is_empty() || credentials.database_id.trim().is_empty() {
            return Err(StoreError::InvalidCredentials(
                "Both Notion token and database ID are required".to_string(),
            ));
        }
        Ok(Arc::new(NotionContactStore::new(
            self.client.clone(),
            self.config.clone(),
            credentials,
        )))
    }
}
