use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Country, CountryAiSuggest, CountryPodcast, Vibe, VibeCountry};
use crate::storage::{Query, TableStore};

/// A table row type and the shape used to insert it.
pub trait Entity: DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Stable row order used when paging through the table.
    const ORDER_BY: &'static [&'static str] = &["id"];
    type New: Serialize + Send + Sync;
}

/// Entities with a single `id` primary key.
pub trait Keyed: Entity {}

/// Entities that hang off a country through a `country_id` column.
pub trait CountryScoped: Entity {
    const COUNTRY_COLUMN: &'static str = "country_id";
}

/// Rows requested per page when reading a whole table.
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    pub duplicates: usize,
}

pub struct Repository<E> {
    store: Arc<dyn TableStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn get_all(&self) -> Result<Vec<E>> {
        self.select(&Query::all()).await
    }

    pub async fn select(&self, query: &Query) -> Result<Vec<E>> {
        let rows = self.select_rows(query).await?;
        rows.into_iter().map(entity_from_row::<E>).collect()
    }

    /// Raw rows for `query`. Without an explicit limit the table is read page
    /// by page until an empty page comes back, since the server may cap each
    /// response below the page size.
    async fn select_rows(&self, query: &Query) -> Result<Vec<Value>> {
        if query.limit.is_some() {
            return self.store.select(E::TABLE, query).await;
        }

        let mut page = query.clone();
        if page.order.is_empty() {
            page = page.order(E::ORDER_BY);
        }

        let mut rows = Vec::new();
        loop {
            let batch = self
                .store
                .select(E::TABLE, &page.clone().limit(PAGE_SIZE).offset(rows.len()))
                .await?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }
        Ok(rows)
    }

    pub async fn insert(&self, record: &E::New) -> Result<E> {
        let rows = self
            .store
            .insert(E::TABLE, vec![serde_json::to_value(record)?])
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| AppError::Database {
            code: None,
            message: format!("insert into {} returned no row", E::TABLE),
        })?;
        entity_from_row(row)
    }

    pub async fn insert_many(&self, records: &[E::New]) -> Result<Vec<E>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let rows = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let stored = self.store.insert(E::TABLE, rows).await?;
        stored.into_iter().map(entity_from_row::<E>).collect()
    }

    /// Bulk insert, falling back to one row at a time when the batch is
    /// rejected. Rows that already exist are counted and skipped; any other
    /// error aborts.
    pub async fn insert_many_or_each(&self, records: &[E::New]) -> Result<InsertReport> {
        if records.is_empty() {
            return Ok(InsertReport::default());
        }

        match self.insert_many(records).await {
            Ok(_) => Ok(InsertReport {
                inserted: records.len(),
                duplicates: 0,
            }),
            Err(e) => {
                tracing::warn!(
                    "Bulk insert of {} rows into {} failed ({}), inserting individually",
                    records.len(),
                    E::TABLE,
                    e
                );
                let mut report = InsertReport::default();
                for record in records {
                    match self.insert(record).await {
                        Ok(_) => report.inserted += 1,
                        Err(e) if e.is_duplicate_key() => {
                            tracing::debug!("Skipping existing row in {}: {}", E::TABLE, e);
                            report.duplicates += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(report)
            }
        }
    }
}

impl<E: Keyed> Repository<E> {
    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>> {
        let mut rows = self.select(&Query::all().eq("id", id).limit(1)).await?;
        Ok(rows.pop())
    }
}

impl<E: CountryScoped> Repository<E> {
    /// Ids of countries that already have at least one row in this table.
    pub async fn country_ids_with_rows(&self) -> Result<HashSet<String>> {
        let query = Query::all()
            .columns(&[E::COUNTRY_COLUMN])
            .order(&[E::COUNTRY_COLUMN]);
        let rows = self.select_rows(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(E::COUNTRY_COLUMN).and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }
}

fn entity_from_row<E: Entity>(row: Value) -> Result<E> {
    serde_json::from_value(row)
        .map_err(|e| AppError::parse(format!("unexpected row in {}: {}", E::TABLE, e)))
}

// Entity-specific queries

impl Repository<Country> {
    pub async fn get_by_iso2(&self, iso2: &str) -> Result<Option<Country>> {
        let query = Query::all().eq("iso2", iso2.to_ascii_uppercase()).limit(1);
        let mut rows = self.select(&query).await?;
        Ok(rows.pop())
    }
}

impl Repository<VibeCountry> {
    pub async fn vibe_ids_for_country(&self, country_id: &str) -> Result<Vec<String>> {
        let rows = self.select(&Query::all().eq("country_id", country_id)).await?;
        Ok(rows.into_iter().map(|row| row.vibe_id).collect())
    }
}

impl Repository<Vibe> {
    /// Titles of the given vibes, in the order of `ids`. Unknown ids are
    /// ignored.
    pub async fn titles_for_ids(&self, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let vibes = self
            .select(&Query::all().is_in("id", ids.iter().cloned()))
            .await?;
        let titles: HashMap<String, String> =
            vibes.into_iter().map(|vibe| (vibe.id, vibe.title)).collect();

        Ok(ids.iter().filter_map(|id| titles.get(id).cloned()).collect())
    }
}

impl Repository<CountryAiSuggest> {
    /// Whether any general (country-less) suggestion exists.
    pub async fn has_general(&self) -> Result<bool> {
        let query = Query::all().columns(&["id"]).is_null("country_id").limit(1);
        Ok(!self.store.select(CountryAiSuggest::TABLE, &query).await?.is_empty())
    }
}

impl Repository<CountryPodcast> {
    pub async fn exists_for_country(&self, country_id: &str) -> Result<bool> {
        let query = Query::all()
            .columns(&["id"])
            .eq("country_id", country_id)
            .limit(1);
        Ok(!self.store.select(CountryPodcast::TABLE, &query).await?.is_empty())
    }
}
