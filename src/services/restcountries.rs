use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::NewCountry;

const FIELDS: &str = "cca2,name,capital,continents,languages,currencies,flags";

#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RestCountry>>;
}

pub struct RestCountriesClient {
    client: Client,
    base_url: String,
}

impl RestCountriesClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("voyager-seeds/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_all(&self) -> Result<Vec<RestCountry>> {
        let url = format!("{}/all", self.base_url);
        tracing::debug!("Fetching countries from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("fields", FIELDS)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Api {
                service: "RestCountries",
                status,
                message,
            });
        }

        Ok(response.json().await?)
    }
}

// Response shapes

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Name {
    #[serde(default)]
    pub common: String,
    #[serde(default)]
    pub official: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Flags {
    pub png: Option<String>,
    pub svg: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Currency {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// A country as returned by RestCountries. Maps keep document order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestCountry {
    #[serde(default)]
    pub cca2: String,
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub capital: Vec<String>,
    #[serde(default)]
    pub continents: Vec<String>,
    #[serde(default)]
    pub languages: Map<String, Value>,
    #[serde(default)]
    pub currencies: Map<String, Value>,
    #[serde(default)]
    pub flags: Flags,
}

impl RestCountry {
    /// Upper-cased two-letter ISO code.
    pub fn iso2(&self) -> Result<String> {
        let iso2 = self.cca2.trim().to_ascii_uppercase();
        if iso2.len() != 2 || !iso2.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::parse(format!(
                "invalid cca2 {:?} for {}",
                self.cca2, self.name.common
            )));
        }
        Ok(iso2)
    }

    /// Preferred flag image: PNG, else SVG.
    pub fn flag_url(&self) -> Option<&str> {
        self.flags
            .png
            .as_deref()
            .or(self.flags.svg.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Primary attributes of the country. The flag path and background
    /// colour are left empty until the flag has been stored.
    pub fn to_new_country(&self) -> Result<NewCountry> {
        let iso2 = self.iso2()?;
        let name = self.name.common.trim();
        if name.is_empty() {
            return Err(AppError::parse(format!("{}: missing common name", iso2)));
        }

        let capital = self
            .capital
            .first()
            .cloned()
            .unwrap_or_else(|| "None".to_string());
        let continent = self
            .continents
            .first()
            .cloned()
            .ok_or_else(|| AppError::parse(format!("{}: missing continent", iso2)))?;

        let (language_code, language) = self
            .languages
            .iter()
            .next()
            .ok_or_else(|| AppError::parse(format!("{}: missing languages", iso2)))?;
        let language = language
            .as_str()
            .ok_or_else(|| AppError::parse(format!("{}: language name is not a string", iso2)))?;

        let (currency_code, currency) = self
            .currencies
            .iter()
            .next()
            .ok_or_else(|| AppError::parse(format!("{}: missing currencies", iso2)))?;
        let currency: Currency = serde_json::from_value(currency.clone())
            .map_err(|e| AppError::parse(format!("{}: invalid currency: {}", iso2, e)))?;
        let currency_code = currency_code.to_ascii_uppercase();
        let currency_name = if currency.name.is_empty() {
            currency_code.clone()
        } else {
            currency.name
        };

        Ok(NewCountry {
            iso2,
            name: name.to_string(),
            capital,
            continent,
            primary_language: language.to_string(),
            primary_language_code: language_code.to_ascii_uppercase(),
            primary_currency: currency_name,
            primary_currency_code: currency_code,
            flag_full_path: String::new(),
            background_hex: String::new(),
        })
    }
}
