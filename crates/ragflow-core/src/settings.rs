//! Application settings
//!
//! Settings come from the process environment, with a `.env` file in the
//! working directory loaded first. Every key has a default except the LLM
//! model name and the cache directory.

use serde::Serialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Configuration for the whole service
#[derive(Clone, Serialize)]
pub struct AppSettings {
    // LLM server
    pub llm_model_name: String,
    #[serde(skip_serializing)]
    pub llm_api_key: String,
    pub llm_base_url: String,

    pub cache_storage_dir: PathBuf,

    // Qdrant
    pub qdrant_url: String,
    pub collection_name: String,

    // Text splitter
    pub encoding_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,

    // Embeddings
    pub encoder_model_name: String,
    pub encoder_base_url: String,
    pub embedding_size: usize,
    pub normalize_embeddings: bool,
    pub passage_prefix: String,
    pub query_prefix: String,

    // Graph
    pub k_search_results: usize,
    pub recursion_limit: usize,

    pub request_timeout: Duration,
}

impl fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSettings")
            .field("llm_model_name", &self.llm_model_name)
            .field("llm_api_key", &"**********")
            .field("llm_base_url", &self.llm_base_url)
            .field("cache_storage_dir", &self.cache_storage_dir)
            .field("qdrant_url", &self.qdrant_url)
            .field("collection_name", &self.collection_name)
            .field("encoding_name", &self.encoding_name)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("encoder_model_name", &self.encoder_model_name)
            .field("encoder_base_url", &self.encoder_base_url)
            .field("embedding_size", &self.embedding_size)
            .field("normalize_embeddings", &self.normalize_embeddings)
            .field("passage_prefix", &self.passage_prefix)
            .field("query_prefix", &self.query_prefix)
            .field("k_search_results", &self.k_search_results)
            .field("recursion_limit", &self.recursion_limit)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl AppSettings {
    pub const DEFAULT_LLM_API_KEY: &'static str = "random_string";
    pub const DEFAULT_LLM_BASE_URL: &'static str = "http://127.0.0.1:8080";
    pub const DEFAULT_QDRANT_URL: &'static str = "http://localhost:6334";
    pub const DEFAULT_COLLECTION_NAME: &'static str = "domain_knowledge";
    pub const DEFAULT_ENCODING_NAME: &'static str = "cl100k_base";
    pub const DEFAULT_ENCODER_MODEL_NAME: &'static str = "intfloat/multilingual-e5-large";

    /// Load settings from `.env` and the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_model_name = required(&get, "LLM_MODEL_NAME")?;
        let cache_storage_dir = PathBuf::from(required(&get, "CACHE_STORAGE_DIR")?);

        let llm_base_url =
            get("LLM_BASE_URL").unwrap_or_else(|| Self::DEFAULT_LLM_BASE_URL.to_string());
        validate_url("LLM_BASE_URL", &llm_base_url)?;

        let qdrant_url = get("QDRANT_URL").unwrap_or_else(|| Self::DEFAULT_QDRANT_URL.to_string());
        validate_url("QDRANT_URL", &qdrant_url)?;

        let encoder_base_url = get("ENCODER_BASE_URL").unwrap_or_else(|| llm_base_url.clone());
        validate_url("ENCODER_BASE_URL", &encoder_base_url)?;

        let chunk_size: usize = parsed(&get, "CHUNK_SIZE", 300)?;
        let chunk_overlap: usize = parsed(&get, "CHUNK_OVERLAP", 50)?;
        if chunk_size == 0 {
            return Err(Error::Configuration("CHUNK_SIZE must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                chunk_overlap, chunk_size
            )));
        }

        let recursion_limit: usize = parsed(&get, "RECURSION_LIMIT", 10)?;
        if recursion_limit == 0 {
            return Err(Error::Configuration("RECURSION_LIMIT must be positive".to_string()));
        }

        let request_timeout_secs: u64 = parsed(&get, "REQUEST_TIMEOUT_SECS", 60)?;

        Ok(Self {
            llm_model_name,
            llm_api_key: get("LLM_API_KEY")
                .unwrap_or_else(|| Self::DEFAULT_LLM_API_KEY.to_string()),
            llm_base_url,
            cache_storage_dir,
            qdrant_url,
            collection_name: get("COLLECTION_NAME")
                .unwrap_or_else(|| Self::DEFAULT_COLLECTION_NAME.to_string()),
            encoding_name: get("ENCODING_NAME")
                .unwrap_or_else(|| Self::DEFAULT_ENCODING_NAME.to_string()),
            chunk_size,
            chunk_overlap,
            encoder_model_name: get("ENCODER_MODEL_NAME")
                .unwrap_or_else(|| Self::DEFAULT_ENCODER_MODEL_NAME.to_string()),
            encoder_base_url,
            embedding_size: parsed(&get, "EMBEDDING_SIZE", 1024)?,
            normalize_embeddings: parsed_bool(&get, "NORMALIZE_EMBEDDINGS", true)?,
            // Prefixes keep their trailing space, so read them unfiltered
            passage_prefix: lookup("PASSAGE_PREFIX").unwrap_or_else(|| "passage: ".to_string()),
            query_prefix: lookup("QUERY_PREFIX").unwrap_or_else(|| "query: ".to_string()),
            k_search_results: parsed(&get, "K_SEARCH_RESULTS", 5)?,
            recursion_limit,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    /// Directory holding downloaded datasets
    pub fn data_dir(&self) -> PathBuf {
        self.cache_storage_dir.join("data")
    }
}

fn required<G>(get: &G, key: &str) -> Result<String>
where
    G: Fn(&str) -> Option<String>,
{
    get(key).ok_or_else(|| {
        Error::Configuration(format!("{} environment variable not found", key))
    })
}

fn parsed<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            Error::Configuration(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

fn parsed_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()) {
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Configuration(format!(
                "{} has invalid boolean value '{}'",
                key, v
            ))),
        },
        None => Ok(default),
    }
}

fn validate_url(key: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::Configuration(format!("{} is not a valid URL '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![("LLM_MODEL_NAME", "qwen2.5-7b"), ("CACHE_STORAGE_DIR", "/tmp/ragflow")]
    }

    #[test]
    fn test_defaults() {
        let settings = AppSettings::from_lookup(lookup(&minimal())).unwrap();

        assert_eq!(settings.llm_model_name, "qwen2.5-7b");
        assert_eq!(settings.llm_api_key, "random_string");
        assert_eq!(settings.llm_base_url, "http://127.0.0.1:8080");
        assert_eq!(settings.encoder_base_url, "http://127.0.0.1:8080");
        assert_eq!(settings.qdrant_url, "http://localhost:6334");
        assert_eq!(settings.collection_name, "domain_knowledge");
        assert_eq!(settings.chunk_size, 300);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.embedding_size, 1024);
        assert!(settings.normalize_embeddings);
        assert_eq!(settings.passage_prefix, "passage: ");
        assert_eq!(settings.query_prefix, "query: ");
        assert_eq!(settings.k_search_results, 5);
        assert_eq!(settings.recursion_limit, 10);
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.data_dir(), PathBuf::from("/tmp/ragflow/data"));
    }

    #[test]
    fn test_missing_model_name() {
        let err = AppSettings::from_lookup(lookup(&[("CACHE_STORAGE_DIR", "/tmp")])).unwrap_err();
        assert!(err.to_string().contains("LLM_MODEL_NAME"));
    }

    #[test]
    fn test_invalid_number() {
        let mut pairs = minimal();
        pairs.push(("CHUNK_SIZE", "lots"));
        let err = AppSettings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut pairs = minimal();
        pairs.push(("CHUNK_SIZE", "50"));
        pairs.push(("CHUNK_OVERLAP", "50"));
        assert!(AppSettings::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_url() {
        let mut pairs = minimal();
        pairs.push(("QDRANT_URL", "not a url"));
        let err = AppSettings::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("QDRANT_URL"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut pairs = minimal();
        pairs.push(("LLM_API_KEY", "sk-very-secret"));
        let settings = AppSettings::from_lookup(lookup(&pairs)).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("**********"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = minimal();
        pairs.push(("ENCODER_BASE_URL", "http://127.0.0.1:8081"));
        pairs.push(("NORMALIZE_EMBEDDINGS", "false"));
        pairs.push(("RECURSION_LIMIT", "25"));
        pairs.push(("QUERY_PREFIX", ""));
        let settings = AppSettings::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(settings.encoder_base_url, "http://127.0.0.1:8081");
        assert!(!settings.normalize_embeddings);
        assert_eq!(settings.recursion_limit, 25);
        assert_eq!(settings.query_prefix, "");
    }
}
