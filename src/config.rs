use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Loanscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by every environment variable the crate reads.
pub const ENV_PREFIX: &str = "LOANSCAN_";

/// Get the application data directory (`<data dir>/loanscan`).
/// Falls back to the working directory when the platform has no data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loanscan")
}

/// Default on-disk location of the extraction results database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("extractions.db")
}

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    let level = std::env::var(format!("{ENV_PREFIX}LOG_LEVEL"))
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();
    format!("loanscan_lib={level},loanscan={level},warn")
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Thresholds for the accept/review decision and the rule extractor.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSettings {
    /// Consensus confidence below this sends the run to human review.
    pub review_threshold: f32,
    /// Confidence the rule engine assigns to every regex hit.
    pub rule_confidence: f32,
    /// When set, a failed guardrail check also forces review.
    /// Off by default: guardrail results are advisory.
    pub guardrail_forces_review: bool,
    /// Model name passed to the oracle's text-generation client. Also keys
    /// the per-call cost table in the run trace.
    pub oracle_model: String,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            review_threshold: 0.80,
            rule_confidence: 0.85,
            guardrail_forces_review: false,
            oracle_model: "mock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifierSettings {
    pub confidence_threshold: f32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
        }
    }
}

/// Business-rule ceilings applied by the validator.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSettings {
    pub max_loan_amount: f64,
    pub max_interest_rate: f64,
    pub max_loan_term_months: u32,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_loan_amount: 50_000_000.0,
            max_interest_rate: 35.0,
            max_loan_term_months: 480,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalSettings {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Query used to pull extraction context for the oracle.
    pub query: String,
    pub embedding_dim: usize,
    /// Directory holding `model.onnx` and `tokenizer.json`. Only read when
    /// built with the `onnx-embeddings` feature.
    pub model_dir: Option<PathBuf>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            query: "borrower name loan amount interest rate term payment".to_string(),
            embedding_dim: 384,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageSettings {
    /// `None` keeps results in an in-memory database.
    pub database_path: Option<PathBuf>,
}

/// Every tunable of the pipeline, built once and handed to each component.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub extraction: ExtractionSettings,
    pub classifier: ClassifierSettings,
    pub validation: ValidationSettings,
    pub retrieval: RetrievalSettings,
    pub storage: StorageSettings,
    /// Directory of pre-OCR'd `.txt` documents. `None` uses the built-in
    /// sample document.
    pub documents_dir: Option<PathBuf>,
    pub supported_loan_types: Vec<String>,
    pub environment: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extraction: ExtractionSettings::default(),
            classifier: ClassifierSettings::default(),
            validation: ValidationSettings::default(),
            retrieval: RetrievalSettings::default(),
            storage: StorageSettings::default(),
            documents_dir: None,
            supported_loan_types: [
                "personal_loan",
                "auto_loan",
                "commercial_loan",
                "heloc",
                "sba_loan",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            environment: "development".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overridden by `LOANSCAN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// fully-prefixed key. Split out from `from_env` so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut s = Settings::default();

        if let Some(v) = get("HITL_THRESHOLD") {
            s.extraction.review_threshold = parse_unit("HITL_THRESHOLD", &v)?;
        }
        if let Some(v) = get("RULE_CONFIDENCE") {
            s.extraction.rule_confidence = parse_unit("RULE_CONFIDENCE", &v)?;
        }
        if let Some(v) = get("GUARDRAIL_FORCES_REVIEW") {
            s.extraction.guardrail_forces_review = parse_bool("GUARDRAIL_FORCES_REVIEW", &v)?;
        }
        if let Some(v) = get("ORACLE_MODEL") {
            if !v.trim().is_empty() {
                s.extraction.oracle_model = v.trim().to_string();
            }
        }
        if let Some(v) = get("CLASSIFIER_CONFIDENCE") {
            s.classifier.confidence_threshold = parse_unit("CLASSIFIER_CONFIDENCE", &v)?;
        }
        if let Some(v) = get("MAX_LOAN_AMOUNT") {
            s.validation.max_loan_amount = parse_value("MAX_LOAN_AMOUNT", &v)?;
        }
        if let Some(v) = get("MAX_INTEREST_RATE") {
            s.validation.max_interest_rate = parse_value("MAX_INTEREST_RATE", &v)?;
        }
        if let Some(v) = get("MAX_LOAN_TERM_MONTHS") {
            s.validation.max_loan_term_months = parse_value("MAX_LOAN_TERM_MONTHS", &v)?;
        }
        if let Some(v) = get("CHUNK_SIZE") {
            s.retrieval.chunk_size = parse_value("CHUNK_SIZE", &v)?;
            if s.retrieval.chunk_size == 0 {
                return Err(invalid("CHUNK_SIZE", &v, "must be positive"));
            }
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            s.retrieval.chunk_overlap = parse_value("CHUNK_OVERLAP", &v)?;
        }
        if s.retrieval.chunk_overlap >= s.retrieval.chunk_size {
            return Err(invalid(
                "CHUNK_OVERLAP",
                &s.retrieval.chunk_overlap.to_string(),
                "must be smaller than the chunk size",
            ));
        }
        if let Some(v) = get("TOP_K") {
            s.retrieval.top_k = parse_value("TOP_K", &v)?;
        }
        if let Some(v) = get("EMBEDDING_MODEL_DIR") {
            if !v.trim().is_empty() {
                s.retrieval.model_dir = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = get("DB_PATH") {
            if !v.trim().is_empty() {
                s.storage.database_path = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = get("DOCUMENTS_DIR") {
            if !v.trim().is_empty() {
                s.documents_dir = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = get("SUPPORTED_LOAN_TYPES") {
            s.supported_loan_types = v
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(v) = get("ENVIRONMENT") {
            s.environment = v;
        }

        Ok(s)
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(key, raw, &e.to_string()))
}

/// Parse a probability-like value that must lie in [0, 1].
fn parse_unit(key: &str, raw: &str) -> Result<f32, ConfigError> {
    let v: f32 = parse_value(key, raw)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(invalid(key, raw, "must be between 0 and 1"));
    }
    Ok(v)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, raw, "expected true or false")),
    }
}
