use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{batch_count, batch_country, pending_countries, Generator, RunSummary};
use crate::ai::best_times::{best_times_for, BATCH_SIZE};
use crate::ai::CompletionClient;
use crate::app::Services;
use crate::db::{BestTimeRepository, CountryRepository};
use crate::error::Result;
use crate::models::NewCountryBestTime;

pub struct BestTimesGenerator {
    countries: CountryRepository,
    best_times: BestTimeRepository,
    completions: Arc<dyn CompletionClient>,
}

impl BestTimesGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            best_times: services.best_times(),
            completions: services.completions.clone(),
        }
    }
}

#[async_trait]
impl Generator for BestTimesGenerator {
    fn name(&self) -> &'static str {
        "best_times"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        let done = self.best_times.country_ids_with_rows().await?;
        let (pending, skipped) = pending_countries(countries, &done);
        tracing::info!(
            "[best_times] {} countries to process, {} already have best times",
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
                "[best_times] Processing batch {}/{} ({} countries)",
                index + 1,
                total_batches,
                batch.len()
            );
            let assignments = best_times_for(self.completions.as_ref(), batch).await?;

            let mut records = Vec::new();
            let mut covered = HashSet::new();
            for assignment in assignments {
                let Some(country) = batch_country(self.name(), batch, &assignment.country_iso2)
                else {
                    continue;
                };
                if assignment.best_times.is_empty() {
                    tracing::warn!("[best_times] No best times returned for {}", country.iso2);
                    continue;
                }
                covered.insert(country.id.clone());
                records.extend(assignment.best_times.into_iter().map(|best_time| {
                    NewCountryBestTime {
                        country_id: country.id.clone(),
                        title: best_time.title.trim().to_string(),
                        description: best_time.description.trim().to_string(),
                    }
                }));
            }

            let report = self.best_times.insert_many_or_each(&records).await?;
            summary.processed += batch.len();
            summary.succeeded += covered.len();
            summary.failed += batch.len() - covered.len();
            summary.inserted += report.inserted;
            tracing::info!(
                "[best_times] Batch {} done: {} rows for {} countries",
                index + 1,
                report.inserted,
                covered.len()
            );
        }

        Ok(summary)
    }
}
