use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Generator, RunSummary};
use crate::app::Services;
use crate::error::{AppError, Result};
use crate::media::palette::{self, FALLBACK_COLOR};
use crate::models::NewCountry;
use crate::services::{CountrySource, Fetcher, RestCountry};
use crate::sql::InsertStatement;
use crate::storage::{content_type_for, store_once, ObjectStore};

pub const FILENAME: &str = "03_countries.sql";
const TABLE: &str = "public.countries";
const COLUMNS: [&str; 10] = [
    "iso2",
    "name",
    "capital",
    "continent",
    "primary_language",
    "primary_language_code",
    "primary_currency",
    "primary_currency_code",
    "flag_full_patch",
    "background_hex",
];

const IGNORED_COUNTRIES: [&str; 1] = ["AQ"];
const IGNORED_CONTINENTS: [&str; 1] = ["Antarctica"];

const BACKGROUND_ALPHA_PERCENT: u8 = 80;
const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Writes the countries seed file from RestCountries, storing every flag and
/// deriving a background colour from it.
pub struct CountriesGenerator {
    source: Arc<dyn CountrySource>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn Fetcher>,
    flags_bucket: String,
    output_path: PathBuf,
}

impl CountriesGenerator {
    pub fn new(services: &Services) -> Self {
        Self {
            source: services.country_source.clone(),
            objects: services.objects.clone(),
            fetcher: services.fetcher.clone(),
            flags_bucket: services.config.supabase_bucket_name_flags.clone(),
            output_path: PathBuf::from(&services.config.seeds_output_dir).join(FILENAME),
        }
    }

    async fn store_flag(&self, iso2: &str, flag_url: &str) -> Result<String> {
        let path = format!("{}.png", iso2);
        let stored = store_once(
            self.objects.as_ref(),
            &self.flags_bucket,
            &path,
            content_type_for(&path),
            || self.fetcher.fetch(flag_url),
        )
        .await?;
        Ok(stored.reference().to_string())
    }

    async fn background_color(&self, iso2: &str) -> String {
        match self.extract_background(iso2).await {
            Ok(color) => {
                tracing::debug!("[countries] Background colour for {}: {}", iso2, color);
                color
            }
            Err(e) => {
                tracing::warn!(
                    "[countries] Palette extraction failed for {}: {}, using {}",
                    iso2,
                    e,
                    FALLBACK_COLOR
                );
                FALLBACK_COLOR.to_string()
            }
        }
    }

    async fn extract_background(&self, iso2: &str) -> Result<String> {
        let path = format!("{}.png", iso2);
        let url = self
            .objects
            .signed_url(&self.flags_bucket, &path, SIGNED_URL_TTL)
            .await?;
        let bytes = self.fetcher.fetch(&url).await?;
        let palette = palette::extract_palette(&bytes)?;
        Ok(palette::muted_color_argb(&palette, BACKGROUND_ALPHA_PERCENT))
    }

    async fn convert(&self, rest_country: &RestCountry) -> Result<NewCountry> {
        let mut country = rest_country.to_new_country()?;

        let flag_url = rest_country
            .flag_url()
            .ok_or_else(|| AppError::parse(format!("{}: no flag image URL", country.iso2)))?;
        let flag_path = match self.store_flag(&country.iso2, flag_url).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(
                    "[countries] Failed to store flag for {} ({}): {}",
                    country.name,
                    country.iso2,
                    e
                );
                return Err(e);
            }
        };
        country.flag_full_path = flag_path;
        country.background_hex = self.background_color(&country.iso2).await;

        Ok(country)
    }
}

fn is_ignored(country: &RestCountry) -> bool {
    let iso2 = country.cca2.trim().to_ascii_uppercase();
    IGNORED_COUNTRIES.contains(&iso2.as_str())
        || country
            .continents
            .iter()
            .any(|continent| IGNORED_CONTINENTS.contains(&continent.as_str()))
}

fn sql_values(country: &NewCountry) -> [&str; 10] {
    [
        country.iso2.as_str(),
        country.name.as_str(),
        country.capital.as_str(),
        country.continent.as_str(),
        country.primary_language.as_str(),
        country.primary_language_code.as_str(),
        country.primary_currency.as_str(),
        country.primary_currency_code.as_str(),
        country.flag_full_path.as_str(),
        country.background_hex.as_str(),
    ]
}

#[async_trait]
impl Generator for CountriesGenerator {
    fn name(&self) -> &'static str {
        "countries"
    }

    async fn generate(&self) -> Result<RunSummary> {
        let fetched = self.source.fetch_all().await?;
        tracing::info!("[countries] Fetched {} countries", fetched.len());

        let mut summary = RunSummary::default();
        let mut statement = InsertStatement::new(TABLE, &COLUMNS, "iso2");
        let mut seen = HashSet::new();

        for rest_country in &fetched {
            summary.processed += 1;
            if is_ignored(rest_country) {
                tracing::info!(
                    "[countries] Ignoring {} ({})",
                    rest_country.cca2,
                    rest_country.name.common
                );
                summary.skipped += 1;
                continue;
            }

            let iso2 = rest_country.iso2()?;
            if !seen.insert(iso2.clone()) {
                tracing::warn!("[countries] Duplicate ISO2 {}, keeping the first entry", iso2);
                summary.skipped += 1;
                continue;
            }

            let country = self.convert(rest_country).await?;
            statement.push_row(&sql_values(&country))?;
            summary.succeeded += 1;
        }

        statement.write(&self.output_path, self.name()).await?;
        tracing::info!(
            "[countries] Wrote {} rows to {}",
            statement.row_count(),
            self.output_path.display()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::json;

    use super::*;
    use crate::testing::{services, FakeCountries, FakeFetcher, MemoryBackend};

    fn flag_png(color: [u8; 3]) -> Vec<u8> {
        let [r, g, b] = color;
        let image = RgbaImage::from_pixel(8, 8, Rgba([r, g, b, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn rest_country(value: serde_json::Value) -> RestCountry {
        serde_json::from_value(value).unwrap()
    }

    fn us() -> RestCountry {
        rest_country(json!({
            "cca2": "us",
            "name": {"common": "United States"},
            "capital": ["Washington, D.C."],
            "continents": ["North America"],
            "languages": {"eng": "English"},
            "currencies": {"USD": {"name": "United States Dollar"}},
            "flags": {"png": "http://x/us.png"}
        }))
    }

    fn generator(
        backend: Arc<MemoryBackend>,
        countries: Vec<RestCountry>,
        fetcher: FakeFetcher,
        dir: &std::path::Path,
    ) -> CountriesGenerator {
        let services = Services {
            country_source: Arc::new(FakeCountries::new(countries)),
            fetcher: Arc::new(fetcher),
            ..services(backend, dir)
        };
        CountriesGenerator::new(&services)
    }

    #[tokio::test]
    async fn writes_us_row_with_flag_and_colour() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let fetcher = FakeFetcher::new()
            .with("http://x/us.png", flag_png([100, 110, 130]))
            .with("memory://flags/US.png", flag_png([100, 110, 130]));

        let summary = generator(backend.clone(), vec![us()], fetcher, dir.path())
            .generate()
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(backend.object("flags", "US.png").is_some());
        let sql = std::fs::read_to_string(dir.path().join("seeds").join(FILENAME)).unwrap();
        assert!(sql.contains(
            "  ('US', 'United States', 'Washington, D.C.', 'North America', 'English', 'ENG', \
             'United States Dollar', 'USD', 'flags/US.png', '#CC646E82')"
        ));
        assert!(sql.contains("on conflict (iso2) do update set"));
        assert!(sql.contains("  flag_full_patch = excluded.flag_full_patch,"));
    }

    #[tokio::test]
    async fn ignored_countries_never_appear() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let antarctica = rest_country(json!({
            "cca2": "AQ",
            "name": {"common": "Antarctica"},
            "continents": ["Antarctica"],
            "flags": {"png": "http://x/aq.png"}
        }));
        let bouvet = rest_country(json!({
            "cca2": "bv",
            "name": {"common": "Bouvet Island"},
            "continents": ["Antarctica"],
            "languages": {"nor": "Norwegian"},
            "currencies": {},
            "flags": {"png": "http://x/bv.png"}
        }));
        let fetcher = FakeFetcher::new().with("http://x/us.png", flag_png([10, 10, 10]));

        let countries = vec![antarctica, bouvet, us()];
        let summary = generator(backend.clone(), countries, fetcher, dir.path())
            .generate()
            .await
            .unwrap();

        assert_eq!(summary.skipped, 2);
        let sql = std::fs::read_to_string(dir.path().join("seeds").join(FILENAME)).unwrap();
        assert!(!sql.contains("'AQ'"));
        assert!(!sql.contains("'BV'"));
        assert!(backend.object("flags", "AQ.png").is_none());
    }

    #[tokio::test]
    async fn palette_failure_uses_fallback_colour() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        // Signed URL is not fetchable, so extraction fails.
        let fetcher = FakeFetcher::new().with("http://x/us.png", b"not an image".to_vec());

        generator(backend, vec![us()], fetcher, dir.path())
            .generate()
            .await
            .unwrap();

        let sql = std::fs::read_to_string(dir.path().join("seeds").join(FILENAME)).unwrap();
        assert!(sql.contains("'flags/US.png', '#CC000000')"));
    }

    #[tokio::test]
    async fn stored_flags_are_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        backend.put_object("flags", "US.png", flag_png([100, 110, 130]));
        let fetcher = FakeFetcher::new().with("memory://flags/US.png", flag_png([100, 110, 130]));

        generator(backend.clone(), vec![us()], fetcher, dir.path())
            .generate()
            .await
            .unwrap();

        assert_eq!(backend.object_writes(), 0);
    }

    #[tokio::test]
    async fn flag_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());

        let result = generator(backend, vec![us()], FakeFetcher::new(), dir.path())
            .generate()
            .await;

        assert!(result.is_err());
        assert!(!dir.path().join("seeds").join(FILENAME).exists());
    }

    #[tokio::test]
    async fn regeneration_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let france = rest_country(json!({
            "cca2": "FR",
            "name": {"common": "France"},
            "capital": ["Paris"],
            "continents": ["Europe"],
            "languages": {"fra": "French"},
            "currencies": {"EUR": {"name": "Euro"}},
            "flags": {"png": "http://x/fr.png"}
        }));
        let fetcher = || {
            FakeFetcher::new()
                .with("http://x/us.png", flag_png([100, 110, 130]))
                .with("http://x/fr.png", flag_png([120, 100, 90]))
                .with("memory://flags/US.png", flag_png([100, 110, 130]))
                .with("memory://flags/FR.png", flag_png([120, 100, 90]))
        };
        let path = dir.path().join("seeds").join(FILENAME);

        generator(backend.clone(), vec![us(), france.clone()], fetcher(), dir.path())
            .generate()
            .await
            .unwrap();
        let first = std::fs::read(&path).unwrap();
        let sql = String::from_utf8(first.clone()).unwrap();
        assert!(sql.contains("'flags/US.png', '#CC646E82')"));
        assert!(sql.contains("'flags/FR.png', '#CC78645A')"));
        assert!(!sql.contains(FALLBACK_COLOR));

        generator(backend.clone(), vec![france, us()], fetcher(), dir.path())
            .generate()
            .await
            .unwrap();
        assert_eq!(backend.object_writes(), 2);
        assert_eq!(std::fs::read(&path).unwrap(), first);
    }
}
