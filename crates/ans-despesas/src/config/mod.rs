use crate::tabular::{DecodePolicy, TextEncoding};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub data: DataConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let assets_dir =
            PathBuf::from(env::var("APP_ASSETS_DIR").unwrap_or_else(|_| "./assets".to_string()));
        let files_dir =
            PathBuf::from(env::var("APP_FILES_DIR").unwrap_or_else(|_| "./files".to_string()));
        let database_path = env::var("APP_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| files_dir.join("ans_despesas.db"));

        let encoding_fallback = match env::var("APP_ENCODING_FALLBACK") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidEncodingFallback { raw })?,
            Err(_) => true,
        };
        let decode = if encoding_fallback {
            DecodePolicy::default()
        } else {
            DecodePolicy::strict(TextEncoding::Utf8)
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            data: DataConfig {
                assets_dir,
                files_dir,
                database_path,
                decode,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Filesystem layout and decoding policy for the pipeline datasets.
///
/// `assets_dir` holds externally supplied inputs (the registry report),
/// `files_dir` holds the raw statement files and every generated dataset.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub assets_dir: PathBuf,
    pub files_dir: PathBuf,
    pub database_path: PathBuf,
    pub decode: DecodePolicy,
}

impl DataConfig {
    pub fn consolidated_path(&self) -> PathBuf {
        self.files_dir.join(crate::pipeline::consolidation::OUTPUT_FILE)
    }

    pub fn enriched_report_path(&self) -> PathBuf {
        self.files_dir.join(crate::pipeline::enrichment::ENRICHED_REPORT_FILE)
    }

    pub fn aggregated_report_path(&self) -> PathBuf {
        self.files_dir.join(crate::pipeline::enrichment::AGGREGATED_REPORT_FILE)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidEncodingFallback { raw: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidEncodingFallback { raw } => {
                write!(f, "APP_ENCODING_FALLBACK must be a boolean, got '{raw}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidEncodingFallback { .. } => None,
        }
    }
}
