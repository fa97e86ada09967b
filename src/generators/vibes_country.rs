use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::{batch_count, batch_country, pending_countries, Generator, RunSummary};
use crate::ai::vibes::{assign_vibes, BATCH_SIZE};
use crate::ai::CompletionClient;
use crate::app::Services;
use crate::db::{CountryRepository, VibeCategoryRepository, VibeCountryRepository, VibeRepository};
use crate::error::{AppError, Result};
use crate::models::{Vibe, VibeCountry};

/// Assigns 3 to 5 vibes to every country without any.
pub struct VibesCountryGenerator {
    countries: CountryRepository,
    vibes: VibeRepository,
    categories: VibeCategoryRepository,
    vibes_country: VibeCountryRepository,
    completions: Arc<dyn CompletionClient>,
}

impl VibesCountryGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            vibes: services.vibes(),
            categories: services.vibe_categories(),
            vibes_country: services.vibes_country(),
            completions: services.completions.clone(),
        }
    }
}

/// Vibe ids keyed by lower-cased title.
fn vibe_ids_by_title(vibes: &[Vibe]) -> HashMap<String, String> {
    vibes
        .iter()
        .map(|vibe| (vibe.title.trim().to_lowercase(), vibe.id.clone()))
        .collect()
}

#[async_trait]
impl Generator for VibesCountryGenerator {
    fn name(&self) -> &'static str {
        "vibes_country"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        tracing::info!("[vibes_country] Found {} countries", countries.len());
        if countries.is_empty() {
            tracing::info!("[vibes_country] No countries in database, nothing to do");
            return Ok(RunSummary::default());
        }

        let vibes = self.vibes.get_all().await?;
        if vibes.is_empty() {
            return Err(AppError::Other(anyhow::anyhow!("No vibes found in database")));
        }
        let categories = self.categories.get_all().await?;
        let vibe_ids = vibe_ids_by_title(&vibes);
        tracing::info!(
            "[vibes_country] Found {} vibes in {} categories",
            vibes.len(),
            categories.len()
        );

        let done = self.vibes_country.country_ids_with_rows().await?;
        let (pending, skipped) = pending_countries(countries, &done);
        let mut summary = RunSummary {
            processed: skipped,
            skipped,
            ..RunSummary::default()
        };
        if skipped > 0 {
            tracing::info!("[vibes_country] {} countries already have vibes, skipping", skipped);
        }

        let total_batches = batch_count(pending.len(), BATCH_SIZE);
        let mut records: Vec<VibeCountry> = Vec::new();
        let mut assigned: HashSet<String> = HashSet::new();

        for (index, batch) in pending.chunks(BATCH_SIZE).enumerate() {
            tracing::info!(
                "[vibes_country] Processing batch {}/{} ({} countries)",
                index + 1,
                total_batches,
                batch.len()
            );
            let assignments =
                assign_vibes(self.completions.as_ref(), &vibes, &categories, batch).await?;
            summary.processed += batch.len();

            let before = records.len();
            for assignment in assignments {
                let Some(country) = batch_country(self.name(), batch, &assignment.country_iso2)
                else {
                    continue;
                };
                for title in &assignment.vibe_titles {
                    match vibe_ids.get(&title.trim().to_lowercase()) {
                        Some(vibe_id) => {
                            let record = VibeCountry {
                                country_id: country.id.clone(),
                                vibe_id: vibe_id.clone(),
                            };
                            if !records.contains(&record) {
                                records.push(record);
                                assigned.insert(country.id.clone());
                            }
                        }
                        None => tracing::warn!(
                            "[vibes_country] Unknown vibe '{}' for {}, skipping",
                            title,
                            country.iso2
                        ),
                    }
                }
            }
            tracing::info!(
                "[vibes_country] Batch {} done: {} assignments",
                index + 1,
                records.len() - before
            );
        }

        let report = self.vibes_country.insert_many_or_each(&records).await?;
        summary.succeeded = assigned.len();
        summary.inserted = report.inserted;
        summary.failed = summary.processed - summary.skipped - summary.succeeded;
        tracing::info!(
            "[vibes_country] Inserted {} rows ({} already present)",
            report.inserted,
            report.duplicates
        );

        Ok(summary)
    }
}
