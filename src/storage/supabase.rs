use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{object_ref, storage_error, ObjectStore, Query, TableStore};
use crate::error::{AppError, Result};

const LIST_PAGE_SIZE: usize = 1000;

/// Supabase Storage and PostgREST client authenticated with a service key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: Url,
    key: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("voyager-seeds/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            key: key.into(),
        })
    }

    fn url(&self, prefix: &[&str], path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(prefix)
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn object_url(&self, action: &[&str], bucket: &str, path: &str) -> Result<Url> {
        let mut prefix = vec!["storage", "v1", "object"];
        prefix.extend_from_slice(action);
        prefix.push(bucket);
        self.url(&prefix, path)
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.url(&["rest", "v1", table], "")
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.key).header("apikey", &self.key)
    }

    async fn check_storage(response: Response, bucket: &str, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(storage_error(status.as_u16(), bucket, path, &body))
    }

    async fn check_table(response: Response, table: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(database_error(status, table, &body))
    }
}

fn database_error(status: StatusCode, table: &str, body: &str) -> AppError {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => {
            let mut message = format!(
                "{} {}: {}",
                status.as_u16(),
                table,
                err.message.unwrap_or_default()
            );
            if let Some(details) = err.details.filter(|d| !d.is_empty()) {
                message.push_str(&format!(" ({})", details));
            }
            if let Some(hint) = err.hint.filter(|h| !h.is_empty()) {
                message.push_str(&format!(" hint: {}", hint));
            }
            AppError::Database {
                code: err.code,
                message,
            }
        }
        Err(_) => AppError::Database {
            code: None,
            message: format!("{} {}: {}", status.as_u16(), table, body.trim()),
        },
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let url = self.object_url(&[], bucket, path)?;
        let response = self.authorized(self.client.head(url)).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            status => Err(storage_error(status.as_u16(), bucket, path, "")),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = self.object_url(&[], bucket, path)?;
        tracing::debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, path);

        let response = self
            .authorized(self.client.post(url))
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check_storage(response, bucket, path).await?;

        Ok(object_ref(bucket, path))
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(&[], bucket, path)?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::check_storage(response, bucket, path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String> {
        let url = self.object_url(&["sign"], bucket, path)?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await?;
        let response = Self::check_storage(response, bucket, path).await?;
        let signed: SignedUrlResponse = response.json().await?;

        if signed.signed_url.starts_with("http") {
            return Ok(signed.signed_url);
        }
        // Relative to the storage API root, e.g. `/object/sign/flags/US.png?token=...`
        Ok(format!(
            "{}/storage/v1{}",
            self.base_url.as_str().trim_end_matches('/'),
            signed.signed_url
        ))
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let url = self.url(&["storage", "v1", "object", "list", bucket], "")?;
        let mut names = Vec::new();
        let mut offset = 0;

        loop {
            let response = self
                .authorized(self.client.post(url.clone()))
                .json(&json!({
                    "prefix": "",
                    "limit": LIST_PAGE_SIZE,
                    "offset": offset,
                    "sortBy": { "column": "name", "order": "asc" },
                }))
                .send()
                .await?;
            let response = Self::check_storage(response, bucket, "").await?;
            let page: Vec<ListedObject> = response.json().await?;
            let count = page.len();
            names.extend(page.into_iter().map(|object| object.name));

            if count < LIST_PAGE_SIZE {
                break;
            }
            offset += count;
        }

        Ok(names)
    }
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let url = self.table_url(table)?;
        let response = self
            .authorized(self.client.get(url))
            .query(&query.params())
            .send()
            .await?;
        let response = Self::check_table(response, table).await?;
        Ok(response.json().await?)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.table_url(table)?;
        let response = self
            .authorized(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        let response = Self::check_table(response, table).await?;
        Ok(response.json().await?)
    }
}
