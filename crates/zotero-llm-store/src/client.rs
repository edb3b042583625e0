//! Zotero Web API v3 client.
//!
//! Implements [`DocumentStore`] over HTTP. Bulk listings page through the
//! API with `start`/`limit`, using the `Total-Results` header to know when
//! to stop, so a full snapshot costs one logical call regardless of
//! library size.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use zotero_llm_core::defaults::{PAGE_LIMIT, ZOTERO_API_VERSION};
use zotero_llm_core::{Collection, Document, DocumentStore, Error, NewDocument, Result};

use crate::config::ZoteroConfig;

/// Header carrying the total size of a paginated listing.
const TOTAL_RESULTS: &str = "Total-Results";

/// API object wrapper. The `data` payload carries the editable fields.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    pub data: T,
}

/// Response to a multi-object write.
#[derive(Debug, Default, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub success: HashMap<String, String>,
    #[serde(default)]
    pub failed: HashMap<String, WriteFailure>,
}

#[derive(Debug, Deserialize)]
pub struct WriteFailure {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct FulltextResponse {
    #[serde(default)]
    content: String,
}

/// HTTP client for one Zotero library.
pub struct ZoteroClient {
    client: Client,
    base_url: String,
    prefix: String,
}

impl ZoteroClient {
    /// Create a new client with the given configuration.
    pub fn new(config: &ZoteroConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "zotero-api-key",
            HeaderValue::from_str(&config.api_key)
                .map_err(|_| Error::Config("Zotero api_key is not a valid header value".into()))?,
        );
        headers.insert(
            "zotero-api-version",
            HeaderValue::from_static(ZOTERO_API_VERSION),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Store(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "store",
            library_id = %config.library_id,
            library_type = %config.library_type,
            "Connected to Zotero Web API"
        );

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            prefix: config.library_prefix(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.prefix, path)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        debug!(subsystem = "store", op = "GET", path, "Zotero request");
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Store(format!("GET {} failed: {}", path, e)))?;
        check_status("GET", path, response).await
    }

    async fn get_object<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: Envelope<T> = self
            .get(path, &[])
            .await?
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("GET {}: {}", path, e)))?;
        Ok(envelope.data)
    }

    /// Fetch every object of a listing, one page at a time.
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut start = 0usize;

        loop {
            let mut params = query.to_vec();
            params.push(("start", start.to_string()));
            params.push(("limit", PAGE_LIMIT.to_string()));

            let response = self.get(path, &params).await?;
            let total = response
                .headers()
                .get(TOTAL_RESULTS)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok());
            let page: Vec<Envelope<T>> = response
                .json()
                .await
                .map_err(|e| Error::Serialization(format!("GET {}: {}", path, e)))?;

            let page_len = page.len();
            out.extend(page.into_iter().map(|e| e.data));
            start += page_len;

            let done = match total {
                Some(total) => start >= total,
                None => page_len < PAGE_LIMIT,
            };
            if done || page_len == 0 {
                break;
            }
        }

        debug!(subsystem = "store", path, result_count = out.len(), "Listing complete");
        Ok(out)
    }

    /// POST a single object to a write endpoint and return its new key.
    async fn create_object(&self, path: &str, object: JsonValue) -> Result<String> {
        debug!(subsystem = "store", op = "POST", path, "Zotero request");
        let response = self
            .client
            .post(self.url(path))
            .json(&json!([object]))
            .send()
            .await
            .map_err(|e| Error::Store(format!("POST {} failed: {}", path, e)))?;
        let response = check_status("POST", path, response).await?;

        let result: WriteResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("POST {}: {}", path, e)))?;

        if let Some(key) = result.success.get("0") {
            return Ok(key.clone());
        }
        let reason = result
            .failed
            .get("0")
            .map(|f| format!("{} {}", f.code, f.message))
            .unwrap_or_else(|| "no object created".to_string());
        Err(Error::Store(format!("POST {} rejected: {}", path, reason)))
    }
}

/// Map a non-success status to an error, keeping the response body.
async fn check_status(method: &str, path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(path.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    warn!(
        subsystem = "store",
        op = method,
        path,
        status = status.as_u16(),
        "Zotero request failed"
    );
    Err(Error::Store(format!(
        "{} {} returned {}: {}",
        method,
        path,
        status,
        body.trim()
    )))
}

#[async_trait]
impl DocumentStore for ZoteroClient {
    async fn get_document(&self, id: &str) -> Result<Document> {
        self.get_object(&format!("/items/{}", id)).await
    }

    async fn children(&self, id: &str) -> Result<Vec<Document>> {
        self.get_all(&format!("/items/{}/children", id), &[]).await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let collections: Vec<Collection> = self.get_all("/collections", &[]).await?;
        info!(
            subsystem = "store",
            result_count = collections.len(),
            "Retrieved collections"
        );
        Ok(collections)
    }

    async fn collection_documents(&self, collection_id: &str) -> Result<Vec<Document>> {
        self.get_all(&format!("/collections/{}/items/top", collection_id), &[])
            .await
    }

    async fn create_collection(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let mut object = json!({ "name": name });
        if let Some(parent) = parent_id {
            object["parentCollection"] = json!(parent);
        }
        let key = self.create_object("/collections", object).await?;
        info!(subsystem = "store", collection = name, key = %key, "Created collection");
        Ok(key)
    }

    async fn create_document(&self, doc: NewDocument) -> Result<String> {
        let object = serde_json::to_value(&doc)?;
        self.create_object("/items", object).await
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        let path = format!("/items/{}", doc.key);
        debug!(subsystem = "store", op = "PUT", path = %path, "Zotero request");
        let response = self
            .client
            .put(self.url(&path))
            .header("If-Unmodified-Since-Version", doc.version.to_string())
            .json(doc)
            .send()
            .await
            .map_err(|e| Error::Store(format!("PUT {} failed: {}", path, e)))?;
        check_status("PUT", &path, response).await?;
        Ok(())
    }

    async fn all_documents(&self) -> Result<Vec<Document>> {
        let items: Vec<Document> = self.get_all("/items", &[]).await?;
        info!(subsystem = "store", result_count = items.len(), "Retrieved all items");
        Ok(items)
    }

    async fn fulltext(&self, attachment_id: &str) -> Result<Option<String>> {
        let path = format!("/items/{}/fulltext", attachment_id);
        let response = match self.get(&path, &[]).await {
            Ok(response) => response,
            Err(Error::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body: FulltextResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("GET {}: {}", path, e)))?;
        Ok(Some(body.content).filter(|c| !c.is_empty()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let params = [
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("itemType", "-attachment".to_string()),
        ];
        let page: Vec<Envelope<Document>> = self
            .get("/items", &params)
            .await?
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("search: {}", e)))?;
        info!(subsystem = "store", query, result_count = page.len(), "Search complete");
        Ok(page.into_iter().map(|e| e.data).collect())
    }
}
