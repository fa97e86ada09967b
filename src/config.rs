use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::generators::GeneratorKind;

/// Optional settings file looked up in the working directory (`seeds.toml`).
const CONFIG_FILE: &str = "seeds";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Seed generation settings.
///
/// Every field can be set through an environment variable with the same
/// name in upper case (`SUPABASE_URL`, `OPENAI_MODEL`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_restcountries_base_url")]
    pub restcountries_base_url: String,

    pub supabase_url: String,
    pub supabase_key: String,

    #[serde(default = "default_flags_bucket")]
    pub supabase_bucket_name_flags: String,

    #[serde(default = "default_scripts_bucket")]
    pub podcast_scripts_bucket: String,

    #[serde(default = "default_audio_bucket")]
    pub podcast_audio_bucket: String,

    #[serde(default = "default_seeds_output_dir")]
    pub seeds_output_dir: String,

    pub openai_api_key: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    pub gemini_api_key: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    #[serde(default = "default_gemini_tts_model")]
    pub gemini_tts_model: String,

    #[serde(default = "default_podcast_workers")]
    pub podcast_workers: usize,

    #[serde(default = "default_temp_audio_dir")]
    pub temp_audio_dir: String,

    /// Comma separated generator names. Empty runs the full sequence.
    #[serde(default)]
    pub seed_generators: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_restcountries_base_url() -> String {
    "https://restcountries.com/v3.1".to_string()
}

fn default_flags_bucket() -> String {
    "flags".to_string()
}

fn default_scripts_bucket() -> String {
    "podcasts_scripts".to_string()
}

fn default_audio_bucket() -> String {
    "podcasts".to_string()
}

fn default_seeds_output_dir() -> String {
    "seeds".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_podcast_workers() -> usize {
    5
}

fn default_temp_audio_dir() -> String {
    "temp_podcasts_audio".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load settings from `seeds.toml` (if present) and the environment.
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::default().try_parsing(true));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("missing or invalid setting: {}", e)))?;
        config.log_level = config.log_level.trim().to_ascii_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("SUPABASE_URL", &self.supabase_url),
            ("SUPABASE_KEY", &self.supabase_key),
            ("OPENAI_API_KEY", &self.openai_api_key),
            ("GEMINI_API_KEY", &self.gemini_api_key),
            ("SUPABASE_BUCKET_NAME_FLAGS", &self.supabase_bucket_name_flags),
            ("PODCAST_SCRIPTS_BUCKET", &self.podcast_scripts_bucket),
            ("PODCAST_AUDIO_BUCKET", &self.podcast_audio_bucket),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{} must not be empty", name)));
            }
        }

        for url in [
            &self.restcountries_base_url,
            &self.supabase_url,
            &self.openai_base_url,
            &self.gemini_base_url,
        ] {
            Url::parse(url)?;
        }

        if self.podcast_workers == 0 {
            return Err(AppError::Config(
                "PODCAST_WORKERS must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.log_level, LOG_LEVELS
            )));
        }

        self.generator_sequence()?;
        Ok(())
    }

    /// Generators to run, in order.
    pub fn generator_sequence(&self) -> Result<Vec<GeneratorKind>> {
        let names: Vec<&str> = self
            .seed_generators
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Ok(GeneratorKind::DEFAULT_SEQUENCE.to_vec());
        }

        names.into_iter().map(str::parse).collect()
    }
}
