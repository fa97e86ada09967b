use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::app::Services;
use crate::error::{AppError, Result};
use crate::models::Country;

mod ai_suggests;
mod best_times;
mod countries;
mod country_podcasts;
mod overviews;
mod podcast_audio;
mod podcast_scripts;
mod vibes_country;

pub use ai_suggests::AiSuggestsGenerator;
pub use best_times::BestTimesGenerator;
pub use countries::CountriesGenerator;
pub use country_podcasts::CountryPodcastsGenerator;
pub use overviews::OverviewsGenerator;
pub use podcast_audio::PodcastAudioGenerator;
pub use podcast_scripts::PodcastScriptsGenerator;
pub use vibes_country::VibesCountryGenerator;

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the generator once. Safe to re-run: work whose output already
    /// exists is skipped.
    async fn generate(&self) -> Result<RunSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Countries,
    VibesCountry,
    BestTimes,
    Overviews,
    GeneralAiSuggests,
    CountryAiSuggests,
    PodcastScripts,
    PodcastAudio,
    CountryPodcasts,
}

impl GeneratorKind {
    /// Every generator, in dependency order.
    pub const DEFAULT_SEQUENCE: [GeneratorKind; 9] = [
        GeneratorKind::Countries,
        GeneratorKind::VibesCountry,
        GeneratorKind::BestTimes,
        GeneratorKind::Overviews,
        GeneratorKind::GeneralAiSuggests,
        GeneratorKind::CountryAiSuggests,
        GeneratorKind::PodcastScripts,
        GeneratorKind::PodcastAudio,
        GeneratorKind::CountryPodcasts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeneratorKind::Countries => "countries",
            GeneratorKind::VibesCountry => "vibes_country",
            GeneratorKind::BestTimes => "best_times",
            GeneratorKind::Overviews => "overviews",
            GeneratorKind::GeneralAiSuggests => "general_ai_suggests",
            GeneratorKind::CountryAiSuggests => "country_ai_suggests",
            GeneratorKind::PodcastScripts => "podcast_scripts",
            GeneratorKind::PodcastAudio => "podcast_audio",
            GeneratorKind::CountryPodcasts => "country_podcasts",
        }
    }

    pub fn build(self, services: &Services) -> Box<dyn Generator> {
        match self {
            GeneratorKind::Countries => Box::new(CountriesGenerator::new(services)),
            GeneratorKind::VibesCountry => Box::new(VibesCountryGenerator::new(services)),
            GeneratorKind::BestTimes => Box::new(BestTimesGenerator::new(services)),
            GeneratorKind::Overviews => Box::new(OverviewsGenerator::new(services)),
            GeneratorKind::GeneralAiSuggests => Box::new(AiSuggestsGenerator::general(services)),
            GeneratorKind::CountryAiSuggests => {
                Box::new(AiSuggestsGenerator::country_specific(services))
            }
            GeneratorKind::PodcastScripts => Box::new(PodcastScriptsGenerator::new(services)),
            GeneratorKind::PodcastAudio => Box::new(PodcastAudioGenerator::new(services)),
            GeneratorKind::CountryPodcasts => Box::new(CountryPodcastsGenerator::new(services)),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneratorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        GeneratorKind::DEFAULT_SEQUENCE
            .into_iter()
            .find(|kind| kind.name() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                let known: Vec<&str> = GeneratorKind::DEFAULT_SEQUENCE
                    .iter()
                    .map(|kind| kind.name())
                    .collect();
                AppError::Config(format!(
                    "Unknown generator: {}. Must be one of: {:?}",
                    s, known
                ))
            })
    }
}

// Per-item outcomes

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
    PreconditionMissing,
    Cancelled,
}

#[derive(Debug)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    Succeeded,
    Failed(AppError),
}

/// Counters reported by a generator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Rows written to the database.
    pub inserted: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Skipped(_) => self.skipped += 1,
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn log(&self, generator: &str) {
        tracing::info!(
            "[{}] processed {}, succeeded {}, skipped {}, failed {}, inserted {}{}",
            generator,
            self.processed,
            self.succeeded,
            self.skipped,
            self.failed,
            self.inserted,
            if self.cancelled { " (cancelled)" } else { "" }
        );
    }
}

// Country batches

/// Countries with no rows yet, and how many were skipped because they have some.
pub(crate) fn pending_countries(
    countries: Vec<Country>,
    done: &HashSet<String>,
) -> (Vec<Country>, usize) {
    let total = countries.len();
    let pending: Vec<Country> = countries
        .into_iter()
        .filter(|country| !done.contains(&country.id))
        .collect();
    let skipped = total - pending.len();
    (pending, skipped)
}

/// Look up a country of the current batch by the ISO2 code an LLM answered with.
pub(crate) fn batch_country<'a>(
    generator: &str,
    batch: &'a [Country],
    iso2: &str,
) -> Option<&'a Country> {
    let iso2 = iso2.trim();
    let found = batch
        .iter()
        .find(|country| country.iso2.eq_ignore_ascii_case(iso2));
    if found.is_none() {
        tracing::warn!("[{}] Unknown country {} in response, skipping", generator, iso2);
    }
    found
}

pub(crate) fn batch_count(items: usize, batch_size: usize) -> usize {
    items.div_ceil(batch_size)
}

/// Process items with at most `workers` in flight and tally their outcomes.
pub(crate) async fn run_bounded<T, F, Fut>(items: Vec<T>, workers: usize, process: F) -> RunSummary
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ItemOutcome>,
{
    let outcomes: Vec<ItemOutcome> = stream::iter(items)
        .map(process)
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut summary = RunSummary::default();
    for outcome in &outcomes {
        summary.record(outcome);
    }
    summary
}
