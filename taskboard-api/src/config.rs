/// Configuration management for the API server
///
/// Settings are read once at startup into [`Config`] and shared by reference.
/// Sources, lowest precedence first:
///
/// 1. Built-in defaults
/// 2. Optional `taskboard.toml` in the working directory (or the file named by
///    `TASKBOARD_CONFIG`)
/// 3. Environment variables (a `.env` file is loaded into the environment first)
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:5000)
/// - `API_PRODUCTION`: enable HSTS (default: false)
/// - `API_CORS_ORIGINS`: comma separated origins, `*` for any (default: *)
/// - `API_MAX_UPLOAD_BYTES`: attachment upload body limit (default: 10 MiB)
/// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DB_SSLMODE`
/// - `DB_MAX_CONNECTIONS`, `DB_ACQUIRE_TIMEOUT_SECS`, `DB_STATEMENT_TIMEOUT_MS`
/// - `AZURE_STORAGE_ACCOUNT_NAME`, `AZURE_STORAGE_ACCOUNT_KEY`: enable backups
///   and attachments
/// - `AZURE_STORAGE_CONTAINER_NAME` (default: backups), `AZURE_STORAGE_ENDPOINT`
/// - `RUST_LOG`: log filter, `LOG_FORMAT=json` for JSON logs
///
/// # Example
///
/// ```no_run
/// use taskboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use taskboard_shared::db::pool::DatabaseConfig;
use taskboard_shared::storage::AzureStorageConfig;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Blob storage for backups and attachments; `None` disables both
    pub storage: Option<AzureStorageConfig>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Production mode (HSTS on)
    pub production: bool,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Largest accepted attachment upload body, in bytes
    pub max_upload_bytes: usize,
}

/// Flat view of every recognized key, as the config sources deliver them
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default = "default_api_host")]
    api_host: String,
    #[serde(default = "default_api_port")]
    api_port: u16,
    #[serde(default)]
    api_production: bool,
    #[serde(default = "default_cors_origins")]
    api_cors_origins: String,
    #[serde(default = "default_max_upload_bytes")]
    api_max_upload_bytes: usize,

    #[serde(default = "default_db_host")]
    db_host: String,
    #[serde(default = "default_db_port")]
    db_port: u16,
    #[serde(default = "default_db_name")]
    db_name: String,
    #[serde(default = "default_db_user")]
    db_user: String,
    #[serde(default)]
    db_password: String,
    #[serde(default = "default_db_sslmode")]
    db_sslmode: String,
    #[serde(default = "default_db_max_connections")]
    db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_secs")]
    db_acquire_timeout_secs: u64,
    #[serde(default = "default_db_statement_timeout_ms")]
    db_statement_timeout_ms: u64,

    azure_storage_account_name: Option<String>,
    azure_storage_account_key: Option<String>,
    #[serde(default = "default_container")]
    azure_storage_container_name: String,
    azure_storage_endpoint: Option<String>,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_db_host() -> String {
    DatabaseConfig::default().host
}

fn default_db_port() -> u16 {
    DatabaseConfig::default().port
}

fn default_db_name() -> String {
    DatabaseConfig::default().database
}

fn default_db_user() -> String {
    DatabaseConfig::default().username
}

fn default_db_sslmode() -> String {
    DatabaseConfig::default().ssl_mode
}

fn default_db_max_connections() -> u32 {
    DatabaseConfig::default().max_connections
}

fn default_db_acquire_timeout_secs() -> u64 {
    DatabaseConfig::default().acquire_timeout_seconds
}

fn default_db_statement_timeout_ms() -> u64 {
    DatabaseConfig::default().statement_timeout_ms
}

fn default_container() -> String {
    "backups".to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Loads configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read, a value has the wrong type,
    /// or validation fails.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let file = std::env::var("TASKBOARD_CONFIG").unwrap_or_else(|_| "taskboard".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::default())
            .build()?;

        Self::from_settings(settings)
    }

    /// Builds and validates configuration from already-layered settings
    pub fn from_settings(settings: config::Config) -> anyhow::Result<Self> {
        let raw: RawSettings = settings.try_deserialize()?;

        let cors_origins = raw
            .api_cors_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let storage = match (
            non_blank(raw.azure_storage_account_name),
            non_blank(raw.azure_storage_account_key),
        ) {
            (Some(account_name), Some(account_key)) => Some(AzureStorageConfig {
                account_name,
                account_key,
                container: raw.azure_storage_container_name.trim().to_string(),
                endpoint: non_blank(raw.azure_storage_endpoint),
            }),
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of AZURE_STORAGE_ACCOUNT_NAME / AZURE_STORAGE_ACCOUNT_KEY is set; backups disabled"
                );
                None
            }
        };

        let config = Self {
            api: ApiConfig {
                host: raw.api_host,
                port: raw.api_port,
                production: raw.api_production,
                cors_origins,
                max_upload_bytes: raw.api_max_upload_bytes,
            },
            database: DatabaseConfig {
                host: raw.db_host,
                port: raw.db_port,
                database: raw.db_name,
                username: raw.db_user,
                password: raw.db_password,
                ssl_mode: raw.db_sslmode.trim().to_ascii_lowercase(),
                max_connections: raw.db_max_connections,
                acquire_timeout_seconds: raw.db_acquire_timeout_secs,
                statement_timeout_ms: raw.db_statement_timeout_ms,
                ..DatabaseConfig::default()
            },
            storage,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise fail later, at first use
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.max_upload_bytes == 0 {
            anyhow::bail!("API_MAX_UPLOAD_BYTES must be at least 1");
        }

        let db = &self.database;

        for (name, value) in [
            ("DB_HOST", &db.host),
            ("DB_NAME", &db.database),
            ("DB_USER", &db.username),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        db.parsed_ssl_mode()
            .map_err(|_| anyhow::anyhow!("DB_SSLMODE '{}' is not a valid SSL mode", db.ssl_mode))?;

        if db.max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be at least 1");
        }
        if db.acquire_timeout_seconds == 0 {
            anyhow::bail!("DB_ACQUIRE_TIMEOUT_SECS must be at least 1");
        }
        if db.statement_timeout_ms == 0 {
            anyhow::bail!("DB_STATEMENT_TIMEOUT_MS must be at least 1");
        }

        if let Some(storage) = &self.storage {
            if storage.container.is_empty() {
                anyhow::bail!("AZURE_STORAGE_CONTAINER_NAME must not be empty");
            }
        }

        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
