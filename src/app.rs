use std::sync::Arc;

use crate::ai::{CompletionClient, GeminiTtsClient, OpenAiClient, SpeechClient};
use crate::config::Config;
use crate::db::{
    AiSuggestRepository, BestTimeRepository, CountryRepository, OverviewRepository,
    PodcastRepository, VibeCategoryRepository, VibeCountryRepository, VibeRepository,
};
use crate::error::Result;
use crate::generators::{GeneratorKind, RunSummary};
use crate::services::{CountrySource, Fetcher, HttpFetcher, RestCountriesClient};
use crate::storage::{ObjectStore, SupabaseClient, TableStore};

/// Clients shared by every generator in a run.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,

    // Backend
    pub objects: Arc<dyn ObjectStore>,
    pub tables: Arc<dyn TableStore>,

    // Upstream APIs
    pub country_source: Arc<dyn CountrySource>,
    pub completions: Arc<dyn CompletionClient>,
    pub speech: Arc<dyn SpeechClient>,
    pub fetcher: Arc<dyn Fetcher>,
}

impl Services {
    pub fn new(config: Config) -> Result<Self> {
        let supabase = Arc::new(SupabaseClient::new(
            &config.supabase_url,
            config.supabase_key.clone(),
        )?);
        let completions = OpenAiClient::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            config.openai_model.clone(),
        )?;
        let speech = GeminiTtsClient::new(
            &config.gemini_base_url,
            config.gemini_api_key.clone(),
            config.gemini_tts_model.clone(),
        )?;
        let country_source = RestCountriesClient::new(&config.restcountries_base_url)?;

        Ok(Self {
            objects: supabase.clone(),
            tables: supabase,
            country_source: Arc::new(country_source),
            completions: Arc::new(completions),
            speech: Arc::new(speech),
            fetcher: Arc::new(HttpFetcher::new()?),
            config: Arc::new(config),
        })
    }

    // Repositories

    pub fn countries(&self) -> CountryRepository {
        CountryRepository::new(self.tables.clone())
    }

    pub fn vibe_categories(&self) -> VibeCategoryRepository {
        VibeCategoryRepository::new(self.tables.clone())
    }

    pub fn vibes(&self) -> VibeRepository {
        VibeRepository::new(self.tables.clone())
    }

    pub fn vibes_country(&self) -> VibeCountryRepository {
        VibeCountryRepository::new(self.tables.clone())
    }

    pub fn best_times(&self) -> BestTimeRepository {
        BestTimeRepository::new(self.tables.clone())
    }

    pub fn overviews(&self) -> OverviewRepository {
        OverviewRepository::new(self.tables.clone())
    }

    pub fn ai_suggests(&self) -> AiSuggestRepository {
        AiSuggestRepository::new(self.tables.clone())
    }

    pub fn podcasts(&self) -> PodcastRepository {
        PodcastRepository::new(self.tables.clone())
    }
}

/// Run generators in order, stopping at the first one that fails.
pub async fn run_sequence(
    services: &Services,
    sequence: &[GeneratorKind],
) -> Result<Vec<(GeneratorKind, RunSummary)>> {
    tracing::info!(
        "Running {} generator(s): {}",
        sequence.len(),
        sequence.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    );

    let mut summaries = Vec::with_capacity(sequence.len());
    for kind in sequence {
        let generator = kind.build(services);
        tracing::info!("[{}] Starting", generator.name());

        match generator.generate().await {
            Ok(summary) => {
                summary.log(generator.name());
                summaries.push((*kind, summary));
            }
            Err(e) => {
                tracing::error!("[{}] Failed: {}", generator.name(), e);
                return Err(e);
            }
        }
    }

    tracing::info!("All generators finished");
    Ok(summaries)
}
