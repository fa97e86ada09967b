//! In-memory stand-ins for the remote services, shared by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::ai::{CompletionClient, CompletionRequest, SpeechClient};
use crate::app::Services;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Country;
use crate::services::{CountrySource, Fetcher, RestCountry};
use crate::storage::{object_ref, Filter, ObjectStore, Query, TableStore};

/// Tables whose rows have no generated `id` column.
const KEYLESS_TABLES: [&str; 1] = ["vibes_country"];

// Backend

#[derive(Default)]
struct BackendState {
    objects: BTreeMap<(String, String), Vec<u8>>,
    tables: HashMap<String, Vec<Value>>,
    unique: HashMap<String, Vec<String>>,
    failing: HashMap<String, (String, String)>,
    failing_selects: Vec<(String, Filter, String)>,
    max_rows: Option<usize>,
    next_id: usize,
    object_writes: usize,
    table_writes: usize,
}

impl BackendState {
    fn with_id(&mut self, table: &str, mut row: Value) -> Value {
        if KEYLESS_TABLES.contains(&table) {
            return row;
        }
        if let Some(fields) = row.as_object_mut() {
            if !fields.contains_key("id") {
                self.next_id += 1;
                fields.insert("id".to_string(), json!(format!("id-{}", self.next_id)));
            }
        }
        row
    }

    fn unique_key(&self, table: &str, row: &Value) -> Option<Vec<Value>> {
        self.unique.get(table).map(|columns| {
            columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                .collect()
        })
    }
}

/// Object store and table store kept in memory. Inserts are atomic per
/// call and honour configured unique constraints like Postgres does.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        self.state.lock().unwrap().unique.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Cap every select response like PostgREST `max-rows` does.
    pub fn with_max_rows(self, max_rows: usize) -> Self {
        self.state.lock().unwrap().max_rows = Some(max_rows);
        self
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let row = state.with_id(table, row);
            state.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn fail_inserts(&self, table: &str, code: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(table.to_string(), (code.to_string(), message.to_string()));
    }

    /// Fail selects on `table` that filter `column` to `value`.
    pub fn fail_selects(&self, table: &str, column: &str, value: &str, message: &str) {
        self.state.lock().unwrap().failing_selects.push((
            table.to_string(),
            Filter::Eq(column.to_string(), value.to_string()),
            message.to_string(),
        ));
    }

    /// Store an object without counting it as a write.
    pub fn put_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Uploads made through [`ObjectStore`].
    pub fn object_writes(&self) -> usize {
        self.state.lock().unwrap().object_writes
    }

    /// Insert calls made through [`TableStore`], including rejected ones.
    pub fn table_writes(&self) -> usize {
        self.state.lock().unwrap().table_writes
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        Ok(self.object(bucket, path).is_some())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.object_writes += 1;
        state
            .objects
            .insert((bucket.to_string(), path.to_string()), bytes);
        Ok(object_ref(bucket, path))
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.object(bucket, path)
            .ok_or_else(|| AppError::Storage(format!("404 {}/{}: Object not found", bucket, path)))
    }

    async fn signed_url(&self, bucket: &str, path: &str, _ttl: Duration) -> Result<String> {
        if self.object(bucket, path).is_none() {
            return Err(AppError::Storage(format!("404 {}/{}: Object not found", bucket, path)));
        }
        Ok(format!("memory://{}/{}", bucket, path))
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, path)| path.clone())
            .collect())
    }
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>> {
        let state = self.state.lock().unwrap();
        let failure = state
            .failing_selects
            .iter()
            .find(|(t, filter, _)| t == table && query.filters.contains(filter));
        if let Some((_, _, message)) = failure {
            return Err(AppError::Database {
                code: None,
                message: message.clone(),
            });
        }

        let rows = state.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        let mut matching: Vec<&Value> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
            .collect();
        matching.sort_by_cached_key(|row| {
            query
                .order
                .iter()
                .map(|column| row.get(column).map(Value::to_string).unwrap_or_default())
                .collect::<Vec<_>>()
        });

        let cap = match (query.limit, state.max_rows) {
            (Some(limit), Some(max)) => limit.min(max),
            (limit, max) => limit.or(max).unwrap_or(usize::MAX),
        };
        Ok(matching
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(cap)
            .map(|row| project(row, &query.columns))
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let mut state = self.state.lock().unwrap();
        state.table_writes += 1;

        if let Some((code, message)) = state.failing.get(table) {
            return Err(AppError::Database {
                code: Some(code.clone()),
                message: message.clone(),
            });
        }

        let mut keys: Vec<Vec<Value>> = state
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter_map(|row| state.unique_key(table, row))
            .collect();
        for row in &rows {
            if let Some(key) = state.unique_key(table, row) {
                if keys.contains(&key) {
                    return Err(AppError::Database {
                        code: Some("23505".to_string()),
                        message: format!(
                            "duplicate key value violates unique constraint on {}",
                            table
                        ),
                    });
                }
                keys.push(key);
            }
        }

        let stored: Vec<Value> = rows
            .into_iter()
            .map(|row| state.with_id(table, row))
            .collect();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    if columns.is_empty() {
        return row.clone();
    }
    let fields: Map<String, Value> = columns
        .iter()
        .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
        .collect();
    Value::Object(fields)
}

// Upstream APIs

type CompletionHandler = dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync;

/// Completion client answering from a closure and recording every request.
pub struct FakeCompletions {
    handler: Box<CompletionHandler>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletions {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(content: &str) -> Self {
        let content = content.to_string();
        Self::new(move |_| Ok(content.clone()))
    }

    pub fn unexpected() -> Self {
        Self::new(|request| {
            Err(AppError::Other(anyhow::anyhow!(
                "unexpected completion request: {}",
                request.user
            )))
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

enum SpeechReply {
    Audio(Vec<u8>),
    QuotaExceeded,
    Failure,
}

pub struct FakeSpeech {
    reply: SpeechReply,
    scripts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    fn with_reply(reply: SpeechReply) -> Self {
        Self {
            reply,
            scripts: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(audio: Vec<u8>) -> Self {
        Self::with_reply(SpeechReply::Audio(audio))
    }

    pub fn quota_exceeded() -> Self {
        Self::with_reply(SpeechReply::QuotaExceeded)
    }

    pub fn failing() -> Self {
        Self::with_reply(SpeechReply::Failure)
    }

    /// Scripts received so far.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechClient for FakeSpeech {
    async fn synthesize(&self, script: &str) -> Result<Vec<u8>> {
        self.scripts.lock().unwrap().push(script.to_string());
        match &self.reply {
            SpeechReply::Audio(audio) => Ok(audio.clone()),
            SpeechReply::QuotaExceeded => Err(AppError::QuotaExceeded {
                service: "Gemini",
                message: "RESOURCE_EXHAUSTED".to_string(),
            }),
            SpeechReply::Failure => Err(AppError::Api {
                service: "Gemini",
                status: 500,
                message: "internal error".to_string(),
            }),
        }
    }
}

/// Serves fixed bytes per URL; anything else is a 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Vec<u8>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), bytes);
        self
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.responses.get(url).cloned().ok_or_else(|| AppError::Api {
            service: "HTTP",
            status: 404,
            message: format!("no response for {}", url),
        })
    }
}

pub struct FakeCountries {
    countries: Vec<RestCountry>,
}

impl FakeCountries {
    pub fn new(countries: Vec<RestCountry>) -> Self {
        Self { countries }
    }
}

#[async_trait]
impl CountrySource for FakeCountries {
    async fn fetch_all(&self) -> Result<Vec<RestCountry>> {
        Ok(self.countries.clone())
    }
}

// Fixtures

pub fn country(id: &str, iso2: &str, name: &str) -> Country {
    Country {
        id: id.to_string(),
        iso2: iso2.to_string(),
        name: name.to_string(),
        capital: format!("{} City", name),
        continent: "Testland".to_string(),
        primary_language: "Testish".to_string(),
        primary_language_code: "TST".to_string(),
        primary_currency: "Test Coin".to_string(),
        primary_currency_code: "TSC".to_string(),
        flag_full_path: format!("flags/{}.png", iso2),
        background_hex: "#CC000000".to_string(),
    }
}

/// A `countries` row as the database returns it.
pub fn country_row(id: &str, iso2: &str, name: &str) -> Value {
    serde_json::to_value(country(id, iso2, name)).unwrap()
}

pub fn valid_script(country_name: &str) -> String {
    format!(
        "{}\n\
         Alex: Welcome to Voyager! Today we travel to {}.\n\
         Maya: I have been waiting for this one.\n\
         Alex: Thanks for listening to Voyager, see you next time.",
        crate::ai::podcast_script::OPENING_LINE,
        country_name
    )
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        restcountries_base_url: "https://restcountries.test/v3.1".to_string(),
        supabase_url: "https://project.supabase.test".to_string(),
        supabase_key: "service-key".to_string(),
        supabase_bucket_name_flags: "flags".to_string(),
        podcast_scripts_bucket: "podcasts_scripts".to_string(),
        podcast_audio_bucket: "podcasts".to_string(),
        seeds_output_dir: dir.join("seeds").to_string_lossy().into_owned(),
        openai_api_key: "sk-test".to_string(),
        openai_base_url: "https://openai.test/v1".to_string(),
        openai_model: "gpt-test".to_string(),
        gemini_api_key: "gm-test".to_string(),
        gemini_base_url: "https://gemini.test/v1beta".to_string(),
        gemini_tts_model: "tts-test".to_string(),
        podcast_workers: 2,
        temp_audio_dir: dir.join("audio").to_string_lossy().into_owned(),
        seed_generators: String::new(),
        log_level: "debug".to_string(),
    }
}

/// Services wired to `backend`, with upstream fakes that refuse every call.
pub fn services(backend: Arc<MemoryBackend>, dir: &Path) -> Services {
    Services {
        config: Arc::new(test_config(dir)),
        objects: backend.clone(),
        tables: backend,
        country_source: Arc::new(FakeCountries::new(Vec::new())),
        completions: Arc::new(FakeCompletions::unexpected()),
        speech: Arc::new(FakeSpeech::failing()),
        fetcher: Arc::new(FakeFetcher::new()),
    }
}
