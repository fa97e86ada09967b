use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{batch_count, batch_country, pending_countries, Generator, RunSummary};
use crate::ai::overviews::{overviews_for, BATCH_SIZE};
use crate::ai::CompletionClient;
use crate::app::Services;
use crate::db::{CountryRepository, OverviewRepository};
use crate::error::Result;
use crate::models::NewCountryOverview;
use crate::services::wikipedia_search_url;

/// One overview paragraph per country, linked to a Wikipedia search.
pub struct OverviewsGenerator {
    countries: CountryRepository,
    overviews: OverviewRepository,
    completions: Arc<dyn CompletionClient>,
}

impl OverviewsGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            overviews: services.overviews(),
            completions: services.completions.clone(),
        }
    }
}

#[async_trait]
impl Generator for OverviewsGenerator {
    fn name(&self) -> &'static str {
        "overviews"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        let done = self.overviews.country_ids_with_rows().await?;
        let (pending, skipped) = pending_countries(countries, &done);
        tracing::info!(
            "[overviews] {} countries to process, {} already have an overview",
            pending.len(),
            skipped
        );

        let mut summary = RunSummary {
            processed: skipped,
            skipped,
            ..RunSummary::default()
        };
        let total_batches = batch_count(pending.len(), BATCH_SIZE);

        for (index, batch) in pending.chunks(BATCH_SIZE).enumerate() {
            tracing::info!(
                "[overviews] Processing batch {}/{} ({} countries)",
                index + 1,
                total_batches,
                batch.len()
            );
            let assignments = overviews_for(self.completions.as_ref(), batch).await?;

            let mut records = Vec::new();
            let mut covered = HashSet::new();
            for assignment in assignments {
                let Some(country) = batch_country(self.name(), batch, &assignment.country_iso2)
                else {
                    continue;
                };
                // One overview per country; later duplicates in the answer are dropped.
                if !covered.insert(country.id.clone()) {
                    tracing::warn!(
                        "[overviews] Duplicate overview for {}, keeping the first",
                        country.iso2
                    );
                    continue;
                }
                records.push(NewCountryOverview {
                    country_id: country.id.clone(),
                    body: assignment.body.trim().to_string(),
                    wikipedia_url: wikipedia_search_url(&country.name),
                });
            }

            let report = self.overviews.insert_many_or_each(&records).await?;
            summary.processed += batch.len();
            summary.succeeded += covered.len();
            summary.failed += batch.len() - covered.len();
            summary.inserted += report.inserted;
            tracing::info!(
                "[overviews] Batch {} done: {} overviews inserted",
                index + 1,
                report.inserted
            );
        }

        Ok(summary)
    }
}
