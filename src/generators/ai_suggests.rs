use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::{batch_count, batch_country, pending_countries, Generator, RunSummary};
use crate::ai::suggestions::{suggestions_for, SuggestMode, BATCH_SIZE};
use crate::ai::CompletionClient;
use crate::app::Services;
use crate::db::{AiSuggestRepository, CountryRepository};
use crate::error::Result;
use crate::models::NewCountryAiSuggest;

/// AI suggestion templates, either one general set or a few per country.
pub struct AiSuggestsGenerator {
    mode: SuggestMode,
    countries: CountryRepository,
    suggests: AiSuggestRepository,
    completions: Arc<dyn CompletionClient>,
}

impl AiSuggestsGenerator {
    pub fn general(services: &Services) -> Self {
        Self::new(services, SuggestMode::General)
    }

    pub fn country_specific(services: &Services) -> Self {
        Self::new(services, SuggestMode::CountrySpecific)
    }

    fn new(services: &Services, mode: SuggestMode) -> Self {
        Self {
            mode,
            countries: services.countries(),
            suggests: services.ai_suggests(),
            completions: services.completions.clone(),
        }
    }

    async fn generate_general(&self) -> Result<RunSummary> {
        let mut summary = RunSummary {
            processed: 1,
            ..RunSummary::default()
        };
        if self.suggests.has_general().await? {
            tracing::info!("[{}] General suggestions already exist, skipping", self.name());
            summary.skipped = 1;
            return Ok(summary);
        }

        let assignments = suggestions_for(self.completions.as_ref(), self.mode, &[]).await?;
        let records: Vec<NewCountryAiSuggest> = assignments
            .into_iter()
            .map(|assignment| NewCountryAiSuggest {
                country_id: None,
                suggest_text: assignment.suggest_text.trim().to_string(),
                prompt: assignment.prompt.trim().to_string(),
            })
            .collect();

        let report = self.suggests.insert_many_or_each(&records).await?;
        summary.inserted = report.inserted;
        if report.inserted > 0 {
            summary.succeeded = 1;
        } else {
            tracing::warn!("[{}] No general suggestions were stored", self.name());
            summary.failed = 1;
        }
        Ok(summary)
    }

    async fn generate_per_country(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        let done = self.suggests.country_ids_with_rows().await?;
        let (pending, skipped) = pending_countries(countries, &done);
        tracing::info!(
            "[{}] {} countries to process, {} already have suggestions",
            self.name(),
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
                "[{}] Processing batch {}/{} ({} countries)",
                self.name(),
                index + 1,
                total_batches,
                batch.len()
            );
            let assignments = suggestions_for(self.completions.as_ref(), self.mode, batch).await?;

            let mut records = Vec::new();
            let mut covered = HashSet::new();
            for assignment in assignments {
                let iso2 = assignment.country_iso2.as_deref().unwrap_or_default();
                let Some(country) = batch_country(self.name(), batch, iso2) else {
                    continue;
                };
                covered.insert(country.id.clone());
                records.push(NewCountryAiSuggest {
                    country_id: Some(country.id.clone()),
                    suggest_text: assignment.suggest_text.trim().to_string(),
                    prompt: assignment.prompt.trim().to_string(),
                });
            }

            let report = self.suggests.insert_many_or_each(&records).await?;
            summary.processed += batch.len();
            summary.succeeded += covered.len();
            summary.failed += batch.len() - covered.len();
            summary.inserted += report.inserted;
            tracing::info!(
                "[{}] Batch {} done: {} suggestions for {} countries",
                self.name(),
                index + 1,
                report.inserted,
                covered.len()
            );
        }

        Ok(summary)
    }
}

#[async_trait]
impl Generator for AiSuggestsGenerator {
    fn name(&self) -> &'static str {
        match self.mode {
            SuggestMode::General => "general_ai_suggests",
            SuggestMode::CountrySpecific => "country_ai_suggests",
        }
    }

    async fn generate(&self) -> Result<RunSummary> {
        match self.mode {
            SuggestMode::General => self.generate_general().await,
            SuggestMode::CountrySpecific => self.generate_per_country().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::error::AppError;
    use crate::testing::{country_row, services, FakeCompletions, MemoryBackend};

    fn services_with(backend: Arc<MemoryBackend>, completions: Arc<FakeCompletions>) -> Services {
        Services {
            completions,
            ..services(backend, &std::env::temp_dir())
        }
    }

    #[tokio::test]
    async fn general_suggestions_have_no_country() {
        let backend = Arc::new(MemoryBackend::new());
        let completions = Arc::new(FakeCompletions::always(
            r#"{"assignments": [
                {"suggest_text": "Plan a weekend trip", "prompt": "You are a travel planner..."},
                {"suggest_text": "What should I pack?", "prompt": "You help travelers pack..."}
            ]}"#,
        ));
        let services = services_with(backend.clone(), completions.clone());

        let summary = AiSuggestsGenerator::general(&services).generate().await.unwrap();
        assert_eq!(summary.inserted, 2);
        let rows = backend.rows("country_ai_suggests");
        assert!(rows.iter().all(|row| row["country_id"] == Value::Null));

        // The general set exists now, so a second run is a no-op.
        let again = AiSuggestsGenerator::general(&services).generate().await.unwrap();
        assert_eq!(again.skipped, 1);
        assert_eq!(completions.calls(), 1);
    }

    #[tokio::test]
    async fn general_answer_with_country_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let completions = Arc::new(FakeCompletions::always(
            r#"{"assignments": [
                {"suggest_text": "Tokyo food tour", "prompt": "...", "country_iso2": "JP"}
            ]}"#,
        ));
        let services = services_with(backend.clone(), completions);

        let result = AiSuggestsGenerator::general(&services).generate().await;

        assert!(matches!(result, Err(AppError::Parse(_))));
        assert!(backend.rows("country_ai_suggests").is_empty());
    }

    #[tokio::test]
    async fn country_suggestions_skip_countries_with_rows() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows(
            "countries",
            vec![country_row("c-jp", "JP", "Japan"), country_row("c-it", "IT", "Italy")],
        );
        backend.seed_rows(
            "country_ai_suggests",
            vec![
                json!({"country_id": null, "suggest_text": "General", "prompt": "..."}),
                json!({"country_id": "c-it", "suggest_text": "Amalfi drive", "prompt": "..."}),
            ],
        );
        let completions = Arc::new(FakeCompletions::always(
            r#"{"assignments": [
                {"suggest_text": "Ride the Shinkansen", "prompt": "...", "country_iso2": "JP"},
                {"suggest_text": "Where to see sakura?", "prompt": "...", "country_iso2": "jp"}
            ]}"#,
        ));
        let services = services_with(backend.clone(), completions.clone());

        let summary = AiSuggestsGenerator::country_specific(&services)
            .generate()
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.inserted, 2);
        assert!(!completions.requests()[0].user.contains("- IT: Italy"));
        let japan: Vec<Value> = backend
            .rows("country_ai_suggests")
            .into_iter()
            .filter(|row| row["country_id"] == json!("c-jp"))
            .collect();
        assert_eq!(japan.len(), 2);
    }
}
