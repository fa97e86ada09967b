use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::{Generator, ItemOutcome, RunSummary, SkipReason};
use crate::app::Services;
use crate::db::{CountryRepository, PodcastRepository, VibeCountryRepository, VibeRepository};
use crate::error::{AppError, Result};
use crate::media::wav;
use crate::models::{Country, NewCountryPodcast};
use crate::storage::{object_ref, ObjectStore};

const SUBTITLES: [&str; 5] = [
    "What to know before you go",
    "Essential travel insights",
    "Your guide to exploring",
    "Discover what makes it special",
    "Insights for your journey",
];

const MAX_TITLE_VIBES: usize = 3;

/// Registers uploaded podcast audio in the `country_podcasts` table.
pub struct CountryPodcastsGenerator {
    countries: CountryRepository,
    podcasts: PodcastRepository,
    vibes: VibeRepository,
    vibes_country: VibeCountryRepository,
    objects: Arc<dyn ObjectStore>,
    audio_bucket: String,
}

impl CountryPodcastsGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            countries: services.countries(),
            podcasts: services.podcasts(),
            vibes: services.vibes(),
            vibes_country: services.vibes_country(),
            objects: services.objects.clone(),
            audio_bucket: services.config.podcast_audio_bucket.clone(),
        }
    }

    async fn podcast_for(&self, filename: &str, country: &Country) -> Result<NewCountryPodcast> {
        let audio = self.objects.download(&self.audio_bucket, filename).await?;
        let duration_sec = wav::duration_secs(&audio)?;

        Ok(NewCountryPodcast {
            country_id: country.id.clone(),
            audio_full_path: object_ref(&self.audio_bucket, filename),
            title: self.title_for(country).await,
            subtitle: subtitle_for(&country.iso2).to_string(),
            duration_sec,
        })
    }

    /// Prepare the podcast row for one audio file. Any failure only fails
    /// that file.
    async fn ingest(
        &self,
        filename: &str,
        iso2: &str,
        seen: &mut HashSet<String>,
        records: &mut Vec<NewCountryPodcast>,
    ) -> ItemOutcome {
        let country = match self.countries.get_by_iso2(iso2).await {
            Ok(Some(country)) => country,
            Ok(None) => {
                tracing::info!("[country_podcasts] No country for {}, skipping {}", iso2, filename);
                return ItemOutcome::Skipped(SkipReason::PreconditionMissing);
            }
            Err(e) => {
                tracing::error!("[country_podcasts] Country lookup for {} failed: {}", iso2, e);
                return ItemOutcome::Failed(e);
            }
        };
        if !seen.insert(country.id.clone()) {
            tracing::warn!("[country_podcasts] {} already handled, skipping {}", iso2, filename);
            return ItemOutcome::Skipped(SkipReason::AlreadyExists);
        }
        match self.podcasts.exists_for_country(&country.id).await {
            Ok(true) => {
                tracing::info!(
                    "[country_podcasts] Podcast for {} ({}) already exists, skipping",
                    country.name,
                    iso2
                );
                return ItemOutcome::Skipped(SkipReason::AlreadyExists);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(
                    "[country_podcasts] Existing podcast check for {} ({}) failed: {}",
                    country.name,
                    iso2,
                    e
                );
                return ItemOutcome::Failed(e);
            }
        }

        match self.podcast_for(filename, &country).await {
            Ok(podcast) => {
                tracing::info!(
                    "[country_podcasts] Prepared {} ({}): {}",
                    country.name,
                    iso2,
                    podcast.title
                );
                records.push(podcast);
                ItemOutcome::Succeeded
            }
            Err(e) => {
                tracing::error!("[country_podcasts] Failed {} ({}): {}", country.name, iso2, e);
                ItemOutcome::Failed(e)
            }
        }
    }

    async fn title_for(&self, country: &Country) -> String {
        match self.vibe_titles(&country.id).await {
            Ok(titles) => podcast_title(&country.name, &titles),
            Err(e) => {
                tracing::warn!(
                    "[country_podcasts] Could not load vibes for {}: {}",
                    country.iso2,
                    e
                );
                podcast_title(&country.name, &[])
            }
        }
    }

    async fn vibe_titles(&self, country_id: &str) -> Result<Vec<String>> {
        let ids = self.vibes_country.vibe_ids_for_country(country_id).await?;
        let mut titles = self.vibes.titles_for_ids(&ids).await?;
        titles.truncate(MAX_TITLE_VIBES);
        Ok(titles)
    }
}

fn podcast_title(country_name: &str, vibe_titles: &[String]) -> String {
    if vibe_titles.is_empty() {
        format!("{}: Travel insights", country_name)
    } else {
        format!("{}: {}", country_name, vibe_titles.join(", "))
    }
}

/// Stable pick from the subtitle rotation.
fn subtitle_for(iso2: &str) -> &'static str {
    let digest = Sha256::digest(iso2.to_ascii_uppercase().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let index = u64::from_be_bytes(prefix) % SUBTITLES.len() as u64;
    SUBTITLES[index as usize]
}

fn audio_filename_pattern() -> Result<Regex> {
    Regex::new(r"(?i)^([A-Z]{2})\.wav$")
        .map_err(|e| AppError::Other(anyhow::anyhow!("invalid filename pattern: {}", e)))
}

#[async_trait]
impl Generator for CountryPodcastsGenerator {
    fn name(&self) -> &'static str {
        "country_podcasts"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let files = self.objects.list(&self.audio_bucket).await?;
        let wav_files: Vec<String> = files
            .into_iter()
            .filter(|name| name.to_ascii_lowercase().ends_with(".wav"))
            .collect();
        tracing::info!(
            "[country_podcasts] Found {} WAV files in bucket '{}'",
            wav_files.len(),
            self.audio_bucket
        );

        let pattern = audio_filename_pattern()?;
        let mut summary = RunSummary::default();
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for filename in &wav_files {
            let outcome = match pattern.captures(filename) {
                Some(captures) => {
                    let iso2 = captures[1].to_ascii_uppercase();
                    self.ingest(filename, &iso2, &mut seen, &mut records).await
                }
                None => {
                    tracing::info!("[country_podcasts] Unexpected filename {}, skipping", filename);
                    ItemOutcome::Skipped(SkipReason::PreconditionMissing)
                }
            };
            summary.record(&outcome);
        }

        let report = self.podcasts.insert_many_or_each(&records).await?;
        summary.inserted = report.inserted;
        tracing::info!(
            "[country_podcasts] Inserted {} podcasts ({} already present)",
            report.inserted,
            report.duplicates
        );
        Ok(summary)
    }
}
