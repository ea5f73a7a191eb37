//! Service configuration loaded from an optional `config` file and
//! environment variables of the form `THEMATIC__SECTION__KEY`, for
//! example `THEMATIC__SERVER__PORT=9000`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{ServiceError, ServiceResult};

/// Configuration read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_uploads")]
    pub uploads: UploadsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root for the database file and uploaded documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_database_file")]
    pub database_file: String,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }
}

/// Upload limits
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_max_document_size")]
    pub max_document_size_bytes: u64,

    /// Request body limit for bulk uploads, covering all files together
    #[serde(default = "default_max_bulk_upload")]
    pub max_bulk_upload_bytes: u64,

    /// Files processed at once during a bulk upload
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,
}

impl ServiceConfig {
    /// Load configuration from `config.*` (optional) and `THEMATIC__SECTION__KEY` env vars
    pub fn load() -> ServiceResult<Self> {
        Self::load_from(environment())
    }

    fn load_from(env: Environment) -> ServiceResult<Self> {
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(env)
            .build()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to build config: {}", e),
            })?
            .try_deserialize()
            .map_err(|e| ServiceError::Config {
                message: format!("Failed to deserialize config: {}", e),
            })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            uploads: default_uploads(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("THEMATIC")
        .separator("__")
        .try_parsing(true)
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        database_file: default_database_file(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_database_file() -> String {
    "thematic.db".to_string()
}

fn default_uploads() -> UploadsConfig {
    UploadsConfig {
        max_document_size_bytes: default_max_document_size(),
        max_bulk_upload_bytes: default_max_bulk_upload(),
        bulk_concurrency: default_bulk_concurrency(),
    }
}

fn default_max_document_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_bulk_upload() -> u64 {
    512 * 1024 * 1024
}

fn default_bulk_concurrency() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: ServiceConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uploads.bulk_concurrency, 4);
        assert_eq!(config.uploads.max_document_size_bytes, 50 * 1024 * 1024);
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("./data/thematic.db")
        );
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ServiceConfig = Config::builder()
            .set_override("uploads.bulk_concurrency", 16)
            .unwrap()
            .set_override("server.port", 9000)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.uploads.bulk_concurrency, 16);
        assert_eq!(config.uploads.max_document_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_double_underscore_env_vars_override() {
        let vars: config::Map<String, String> = [
            ("THEMATIC__SERVER__PORT", "9000"),
            ("THEMATIC__UPLOADS__BULK_CONCURRENCY", "8"),
            ("THEMATIC_SERVER__HOST", "10.0.0.1"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let config = ServiceConfig::load_from(environment().source(Some(vars))).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.uploads.bulk_concurrency, 8);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
