use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};

mod supabase;

pub use supabase::SupabaseClient;

/// Reference stored in database rows for an uploaded object.
pub fn object_ref(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket, path)
}

pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool>;

    /// Upload (or overwrite) an object and return its reference.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String>;

    /// Object names at the root of a bucket.
    async fn list(&self, bucket: &str) -> Result<Vec<String>>;

    async fn upload_if_absent(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        if self.exists(bucket, path).await? {
            tracing::debug!("{}/{} already stored, skipping upload", bucket, path);
            return Ok(object_ref(bucket, path));
        }
        self.upload(bucket, path, bytes, content_type).await
    }

    async fn upload_file(&self, local_path: &Path, bucket: &str, path: &str) -> Result<String> {
        let bytes = tokio::fs::read(local_path).await?;
        self.upload(bucket, path, bytes, content_type_for(path)).await
    }
}

/// Outcome of [`store_once`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    Existing(String),
    Uploaded(String),
}

impl Stored {
    pub fn reference(&self) -> &str {
        match self {
            Stored::Existing(reference) | Stored::Uploaded(reference) => reference,
        }
    }
}

/// Like [`ObjectStore::upload_if_absent`], but only produces the bytes when
/// the object is missing.
pub async fn store_once<F, Fut>(
    store: &dyn ObjectStore,
    bucket: &str,
    path: &str,
    content_type: &str,
    produce: F,
) -> Result<Stored>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    if store.exists(bucket, path).await? {
        return Ok(Stored::Existing(object_ref(bucket, path)));
    }
    let bytes = produce().await?;
    store
        .upload(bucket, path, bytes, content_type)
        .await
        .map(Stored::Uploaded)
}

// Table access

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
    IsNull(String),
}

impl Filter {
    fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::In(column, _) | Filter::IsNull(column) => column,
        }
    }

    /// PostgREST operator expression, e.g. `eq.US` or `in.("a","b")`.
    fn expression(&self) -> String {
        match self {
            Filter::Eq(_, value) => format!("eq.{}", value),
            Filter::In(_, values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect();
                format!("in.({})", quoted.join(","))
            }
            Filter::IsNull(_) => "is.null".to_string(),
        }
    }

    /// Evaluate the filter against a JSON row.
    #[cfg(test)]
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, value) => value_text(field).as_deref() == Some(value.as_str()),
            Filter::In(_, values) => value_text(field)
                .map(|text| values.iter().any(|v| *v == text))
                .unwrap_or(false),
            Filter::IsNull(_) => field.is_null(),
        }
    }
}

#[cfg(test)]
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Row selection for [`TableStore::select`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_in<I, S>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn order(mut self, columns: &[&str]) -> Self {
        self.order = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Query string pairs in PostgREST syntax.
    pub fn params(&self) -> Vec<(String, String)> {
        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };

        let mut params = vec![("select".to_string(), select)];
        params.extend(
            self.filters
                .iter()
                .map(|f| (f.column().to_string(), f.expression())),
        );
        if !self.order.is_empty() {
            params.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Matching rows. A server may return fewer rows than `limit` asks for
    /// (PostgREST `max-rows`), so callers wanting every row must page.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>>;

    /// Insert rows and return them as stored (with generated columns).
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>>;
}

pub(crate) fn storage_error(status: u16, bucket: &str, path: &str, body: &str) -> AppError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    AppError::Storage(format!("{} {}/{}: {}", status, bucket, path, message))
}
