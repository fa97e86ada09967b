use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{run_bounded, Generator, ItemOutcome, RunSummary, SkipReason};
use crate::ai::podcast_script::generate_script;
use crate::ai::CompletionClient;
use crate::app::Services;
use crate::db::CountryRepository;
use crate::error::Result;
use crate::models::Country;
use crate::services::wikipedia_search_url;
use crate::storage::ObjectStore;

/// Writes one podcast script per country to the scripts bucket as `{ISO2}.txt`.
pub struct PodcastScriptsGenerator {
    countries: CountryRepository,
    objects: Arc<dyn ObjectStore>,
    completions: Arc<dyn CompletionClient>,
    bucket: String,
    workers: usize,
}

impl PodcastScriptsGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            objects: services.objects.clone(),
            completions: services.completions.clone(),
            bucket: services.config.podcast_scripts_bucket.clone(),
            workers: services.config.podcast_workers,
        }
    }

    async fn process_country(&self, country: &Country, temp_dir: &Path) -> ItemOutcome {
        match self.write_script(country, temp_dir).await {
            Ok(ItemOutcome::Succeeded) => {
                tracing::info!(
                    "[podcast_scripts] Uploaded script for {} ({})",
                    country.name,
                    country.iso2
                );
                ItemOutcome::Succeeded
            }
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    "[podcast_scripts] Failed {} ({}): {}",
                    country.name,
                    country.iso2,
                    e
                );
                ItemOutcome::Failed(e)
            }
        }
    }

    async fn write_script(&self, country: &Country, temp_dir: &Path) -> Result<ItemOutcome> {
        let path = format!("{}.txt", country.iso2);
        if self.objects.exists(&self.bucket, &path).await? {
            tracing::info!(
                "[podcast_scripts] Script for {} ({}) already exists, skipping",
                country.name,
                country.iso2
            );
            return Ok(ItemOutcome::Skipped(SkipReason::AlreadyExists));
        }

        tracing::info!(
            "[podcast_scripts] Generating script for {} ({})",
            country.name,
            country.iso2
        );
        let wikipedia_url = wikipedia_search_url(&country.name);
        let script = generate_script(self.completions.as_ref(), country, &wikipedia_url).await?;

        let local_path = temp_dir.join(&path);
        tokio::fs::write(&local_path, script.as_bytes()).await?;
        self.objects
            .upload_file(&local_path, &self.bucket, &path)
            .await?;
        Ok(ItemOutcome::Succeeded)
    }
}

#[async_trait]
impl Generator for PodcastScriptsGenerator {
    fn name(&self) -> &'static str {
        "podcast_scripts"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        if countries.is_empty() {
            tracing::info!("[podcast_scripts] No countries in database, nothing to do");
            return Ok(RunSummary::default());
        }
        tracing::info!(
            "[podcast_scripts] Processing {} countries with {} workers",
            countries.len(),
            self.workers
        );

        // Removed with its contents when dropped.
        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path();

        let summary = run_bounded(countries, self.workers, |country| async move {
            self.process_country(&country, temp_path).await
        })
        .await;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{country_row, services, valid_script, FakeCompletions, MemoryBackend};

    fn generator(
        backend: Arc<MemoryBackend>,
        completions: Arc<FakeCompletions>,
    ) -> PodcastScriptsGenerator {
        let services = Services {
            completions,
            ..services(backend, &std::env::temp_dir())
        };
        PodcastScriptsGenerator::new(&services)
    }

    #[tokio::test]
    async fn uploads_scripts_and_skips_existing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows(
            "countries",
            vec![country_row("c-jp", "JP", "Japan"), country_row("c-fr", "FR", "France")],
        );
        backend.put_object("podcasts_scripts", "FR.txt", b"old".to_vec());
        let completions = Arc::new(FakeCompletions::always(&valid_script("Japan")));

        let summary = generator(backend.clone(), completions.clone())
            .generate()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(completions.calls(), 1);
        assert_eq!(
            backend.object("podcasts_scripts", "JP.txt").unwrap(),
            valid_script("Japan").into_bytes()
        );
        assert_eq!(backend.object("podcasts_scripts", "FR.txt").unwrap(), b"old".to_vec());
    }

    #[tokio::test]
    async fn second_run_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows("countries", vec![country_row("c-jp", "JP", "Japan")]);
        let completions = Arc::new(FakeCompletions::always(&valid_script("Japan")));

        generator(backend.clone(), completions.clone()).generate().await.unwrap();
        let writes = backend.object_writes();
        let second = generator(backend.clone(), completions.clone()).generate().await.unwrap();

        assert_eq!(writes, 1);
        assert_eq!(backend.object_writes(), writes);
        assert_eq!(second.skipped, 1);
        assert_eq!(completions.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_script_fails_only_that_country() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows("countries", vec![country_row("c-jp", "JP", "Japan")]);
        let completions = Arc::new(FakeCompletions::always("Alex: hi\nMaya: hello"));

        let summary = generator(backend.clone(), completions).generate().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(backend.object("podcasts_scripts", "JP.txt").is_none());
    }
}
