//! Configuration management for Sheetpress Server
//!
//! All configuration is read once at startup via [`Config::from_env`].
//! Missing or unparsable required values are fatal before the listener
//! binds; nothing reads the environment after startup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Canonical MIME type for `.xlsx` workbooks.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Accepted upload extension.
pub const XLSX_EXTENSION: &str = ".xlsx";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 18 * 1024 * 1024;
const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LINK_TTL_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub converter: ConverterConfig,
    pub delivery: DeliveryMode,
    pub storage: Option<StorageConfig>,
    pub link_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Hard ceiling on the uploaded spreadsheet, enforced while streaming.
    pub max_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Path to the conversion engine binary (LibreOffice-compatible CLI).
    pub binary: PathBuf,
    /// Wall-clock ceiling for a single conversion; the subprocess is killed
    /// on expiry.
    pub timeout: Duration,
}

/// How a finished PDF reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Return the PDF bytes in the response body. No caching, no dedup.
    Inline,
    /// Store the PDF in the object store keyed by content digest and return
    /// a presigned link. Repeat uploads of identical bytes become cache hits.
    Cached,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let delivery = match env::var("DELIVERY_MODE")
            .unwrap_or_else(|_| "inline".to_string())
            .as_str()
        {
            "inline" => DeliveryMode::Inline,
            "cached" => DeliveryMode::Cached,
            other => {
                return Err(ConfigError::Invalid {
                    name: "DELIVERY_MODE",
                    reason: format!("expected \"inline\" or \"cached\", got {:?}", other),
                })
            }
        };

        // The object store is only reachable (and only required) in cached mode.
        let storage = match delivery {
            DeliveryMode::Cached => Some(StorageConfig {
                endpoint: required("S3_ENDPOINT")?,
                bucket: required("S3_BUCKET")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            }),
            DeliveryMode::Inline => None,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("SERVER_PORT", DEFAULT_PORT)?,
            },
            upload: UploadConfig {
                max_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            converter: ConverterConfig {
                binary: PathBuf::from(required("SOFFICE_PATH")?),
                timeout: Duration::from_secs(parse_or(
                    "CONVERT_TIMEOUT_SECS",
                    DEFAULT_CONVERT_TIMEOUT_SECS,
                )?),
            },
            delivery,
            storage,
            link_ttl: Duration::from_secs(parse_or("LINK_TTL_SECS", DEFAULT_LINK_TTL_SECS)?),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
