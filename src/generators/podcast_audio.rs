use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{run_bounded, Generator, ItemOutcome, RunSummary, SkipReason};
use crate::ai::SpeechClient;
use crate::app::Services;
use crate::db::CountryRepository;
use crate::error::{AppError, Result};
use crate::models::Country;
use crate::storage::ObjectStore;

/// Turns stored scripts into `{ISO2}.wav` podcast audio.
///
/// The first quota error cancels the run: tasks already in flight finish
/// their current step, the rest are skipped.
pub struct PodcastAudioGenerator {
    countries: CountryRepository,
    objects: Arc<dyn ObjectStore>,
    speech: Arc<dyn SpeechClient>,
    scripts_bucket: String,
    audio_bucket: String,
    temp_audio_dir: PathBuf,
    workers: usize,
}

impl PodcastAudioGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            objects: services.objects.clone(),
            speech: services.speech.clone(),
            scripts_bucket: services.config.podcast_scripts_bucket.clone(),
            audio_bucket: services.config.podcast_audio_bucket.clone(),
            temp_audio_dir: PathBuf::from(&services.config.temp_audio_dir),
            workers: services.config.podcast_workers,
        }
    }

    async fn process_country(&self, country: &Country, cancel: &CancellationToken) -> ItemOutcome {
        match self.produce_audio(country, cancel).await {
            Ok(ItemOutcome::Succeeded) => {
                tracing::info!(
                    "[podcast_audio] Uploaded audio for {} ({})",
                    country.name,
                    country.iso2
                );
                ItemOutcome::Succeeded
            }
            Ok(outcome) => outcome,
            Err(e) if e.is_quota_exceeded() => {
                if !cancel.is_cancelled() {
                    tracing::error!(
                        "[podcast_audio] Quota exceeded while processing {} ({}), stopping: {}",
                        country.name,
                        country.iso2,
                        e
                    );
                    cancel.cancel();
                }
                ItemOutcome::Failed(e)
            }
            Err(e) => {
                tracing::error!(
                    "[podcast_audio] Failed {} ({}): {}",
                    country.name,
                    country.iso2,
                    e
                );
                ItemOutcome::Failed(e)
            }
        }
    }

    async fn produce_audio(
        &self,
        country: &Country,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome> {
        let audio_path = format!("{}.wav", country.iso2);
        let script_path = format!("{}.txt", country.iso2);

        if cancel.is_cancelled() {
            return Ok(cancelled(country));
        }
        if self.objects.exists(&self.audio_bucket, &audio_path).await? {
            tracing::info!(
                "[podcast_audio] Audio for {} ({}) already exists, skipping",
                country.name,
                country.iso2
            );
            return Ok(ItemOutcome::Skipped(SkipReason::AlreadyExists));
        }
        if !self.objects.exists(&self.scripts_bucket, &script_path).await? {
            tracing::info!(
                "[podcast_audio] No script for {} ({}), skipping",
                country.name,
                country.iso2
            );
            return Ok(ItemOutcome::Skipped(SkipReason::PreconditionMissing));
        }

        if cancel.is_cancelled() {
            return Ok(cancelled(country));
        }
        let script = self.objects.download(&self.scripts_bucket, &script_path).await?;
        let script = String::from_utf8(script).map_err(|e| {
            AppError::parse(format!("script {} is not UTF-8: {}", script_path, e))
        })?;

        if cancel.is_cancelled() {
            return Ok(cancelled(country));
        }
        tracing::info!(
            "[podcast_audio] Generating audio for {} ({})",
            country.name,
            country.iso2
        );
        let audio = self.speech.synthesize(&script).await?;

        // Kept on disk so a failed upload can be retried by hand.
        let local_path = self.temp_audio_dir.join(&audio_path);
        tokio::fs::write(&local_path, &audio).await?;

        if cancel.is_cancelled() {
            return Ok(cancelled(country));
        }
        self.objects
            .upload_file(&local_path, &self.audio_bucket, &audio_path)
            .await?;
        Ok(ItemOutcome::Succeeded)
    }
}

fn cancelled(country: &Country) -> ItemOutcome {
    tracing::info!(
        "[podcast_audio] Run cancelled, skipping {} ({})",
        country.name,
        country.iso2
    );
    ItemOutcome::Skipped(SkipReason::Cancelled)
}

#[async_trait]
impl Generator for PodcastAudioGenerator {
    fn name(&self) -> &'static str {
        "podcast_audio"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let countries = self.countries.get_all().await?;
        if countries.is_empty() {
            tracing::info!("[podcast_audio] No countries in database, nothing to do");
            return Ok(RunSummary::default());
        }
        tokio::fs::create_dir_all(&self.temp_audio_dir).await?;
        tracing::info!(
            "[podcast_audio] Processing {} countries with {} workers, audio kept in {}",
            countries.len(),
            self.workers,
            self.temp_audio_dir.display()
        );

        let cancel = CancellationToken::new();
        let token = &cancel;
        let mut summary = run_bounded(countries, self.workers, |country| async move {
            self.process_country(&country, token).await
        })
        .await;

        summary.cancelled = cancel.is_cancelled();
        if summary.cancelled {
            tracing::warn!(
                "[podcast_audio] Quota or rate limit hit, some countries were not processed"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{country_row, services, FakeSpeech, MemoryBackend};

    fn generator(
        backend: Arc<MemoryBackend>,
        speech: Arc<FakeSpeech>,
        dir: &std::path::Path,
        workers: usize,
    ) -> PodcastAudioGenerator {
        let mut services = Services {
            speech,
            ..services(backend, dir)
        };
        let mut config = (*services.config).clone();
        config.podcast_workers = workers;
        services.config = Arc::new(config);
        PodcastAudioGenerator::new(&services)
    }

    #[tokio::test]
    async fn missing_script_and_existing_audio_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows(
            "countries",
            vec![
                country_row("c-jp", "JP", "Japan"),
                country_row("c-fr", "FR", "France"),
                country_row("c-it", "IT", "Italy"),
            ],
        );
        backend.put_object("podcasts_scripts", "JP.txt", b"Alex: hi".to_vec());
        backend.put_object("podcasts_scripts", "FR.txt", b"Alex: salut".to_vec());
        backend.put_object("podcasts", "FR.wav", b"RIFF".to_vec());
        let speech = Arc::new(FakeSpeech::returning(b"RIFFaudio".to_vec()));

        let summary = generator(backend.clone(), speech.clone(), dir.path(), 2)
            .generate()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(speech.scripts(), vec!["Alex: hi".to_string()]);
        assert_eq!(backend.object("podcasts", "JP.wav").unwrap(), b"RIFFaudio".to_vec());
        assert!(dir.path().join("audio").join("JP.wav").exists());
    }

    #[tokio::test]
    async fn quota_error_cancels_remaining_countries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let rows = ["AA", "BB", "CC", "DD"]
            .iter()
            .map(|iso2| country_row(&format!("c-{}", iso2), iso2, iso2))
            .collect();
        backend.seed_rows("countries", rows);
        for iso2 in ["AA", "BB", "CC", "DD"] {
            let path = format!("{}.txt", iso2);
            backend.put_object("podcasts_scripts", &path, b"Alex: hi".to_vec());
        }
        let speech = Arc::new(FakeSpeech::quota_exceeded());

        // One worker: the first country hits the quota, the rest never call the API.
        let summary = generator(backend.clone(), speech.clone(), dir.path(), 1)
            .generate()
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 3);
        assert_eq!(speech.scripts().len(), 1);
        assert_eq!(backend.object_writes(), 0);
    }

    #[tokio::test]
    async fn other_errors_do_not_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        backend.seed_rows(
            "countries",
            vec![country_row("c-jp", "JP", "Japan"), country_row("c-fr", "FR", "France")],
        );
        backend.put_object("podcasts_scripts", "JP.txt", b"Alex: hi".to_vec());
        backend.put_object("podcasts_scripts", "FR.txt", b"Alex: salut".to_vec());
        let speech = Arc::new(FakeSpeech::failing());

        let summary = generator(backend, speech.clone(), dir.path(), 1)
            .generate()
            .await
            .unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.failed, 2);
        assert_eq!(speech.scripts().len(), 2);
    }
}
