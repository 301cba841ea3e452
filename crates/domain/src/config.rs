//! Configuration management
//!
//! Typed settings for a pull run, loaded from environment variables
//! (optionally seeded from a `.env` file by the binary).

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{KsefError, Result};

/// Base URL of the KSeF API 2.0 test environment.
pub const TEST_BASE_URL: &str = "https://api-test.ksef.mf.gov.pl/api/v2";
/// Base URL of the KSeF API 2.0 production environment.
pub const PROD_BASE_URL: &str = "https://api.ksef.mf.gov.pl/api/v2";

const DEFAULT_DATE_FROM: &str = "2025-01-01";
const DEFAULT_DATE_TO: &str = "2025-12-31";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_OUTPUT_PATH: &str = "ksef_invoices.xlsx";

/// Target environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Prod,
}

impl Environment {
    /// API root for this environment.
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Test => TEST_BASE_URL,
            Self::Prod => PROD_BASE_URL,
        }
    }

    /// Parse an environment selector, defaulting to `Test` for anything
    /// that is not exactly `prod` (matching the original tool's behavior).
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" => Self::Prod,
            _ => Self::Test,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Prod => write!(f, "prod"),
        }
    }
}

/// Application configuration for one pull run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tax identifier of the queried entity.
    pub nip: String,
    /// Long-lived KSeF token exchanged for session credentials.
    #[serde(skip_serializing)]
    pub token: String,
    pub environment: Environment,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub page_size: u32,
    pub output_path: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// `KSEF_NIP` and `KSEF_TOKEN` are required; `KSEF_ENV`, `DATE_FROM`,
    /// `DATE_TO`, `PAGE_SIZE` and `OUTPUT_PATH` have defaults. Fails before
    /// any network activity when the identity is incomplete or the date
    /// range is inverted.
    pub fn from_env() -> Result<Self> {
        let nip = env_var("KSEF_NIP");
        let token = env_var("KSEF_TOKEN");
        if nip.is_empty() || token.is_empty() {
            return Err(KsefError::Config(
                "KSEF_NIP and KSEF_TOKEN must be set (copy .env.example to .env)".to_string(),
            ));
        }

        let environment = Environment::parse(&env_var_or("KSEF_ENV", "test"));
        let date_from = parse_date("DATE_FROM", &env_var_or("DATE_FROM", DEFAULT_DATE_FROM))?;
        let date_to = parse_date("DATE_TO", &env_var_or("DATE_TO", DEFAULT_DATE_TO))?;
        if date_from > date_to {
            return Err(KsefError::Config(format!(
                "DATE_FROM ({date_from}) is after DATE_TO ({date_to})"
            )));
        }

        let page_size = match env_var("PAGE_SIZE") {
            s if s.is_empty() => DEFAULT_PAGE_SIZE,
            s => s
                .parse()
                .map_err(|_| KsefError::Config(format!("PAGE_SIZE is not a number: {s}")))?,
        };

        let output_path = env_var_or("OUTPUT_PATH", DEFAULT_OUTPUT_PATH);

        Ok(Self { nip, token, environment, date_from, date_to, page_size, output_path })
    }
}

fn env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_default().trim().to_string()
}

fn env_var_or(name: &str, default: &str) -> String {
    let value = env_var(name);
    if value.is_empty() { default.to_string() } else { value }
}

/// Accepts `YYYY-MM-DD` with an optional time suffix, which is ignored.
fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|_| KsefError::Config(format!("{name} is not a valid date (YYYY-MM-DD): {value}")))
}
