use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Dossier Flow
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DossierFlowConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
    /// Notification queue and delivery settings
    pub notifications: NotificationConfig,
    /// Workflow engine settings
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, overridden by RUST_LOG when set
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Outcomes buffered between the engine and the dispatcher
    pub queue_capacity: usize,
    /// Delivery attempts per notification, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    /// How long a resolved role audience is reused
    pub audience_cache_ttl_seconds: u64,
}

impl NotificationConfig {
    pub fn audience_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.audience_cache_ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Time allowed for draining pending notifications on shutdown
    pub shutdown_timeout_seconds: u64,
}

impl WorkflowConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl Default for DossierFlowConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            database: Some(DatabaseConfig {
                url: ".dossier-flow/dossier-flow.db".to_string(),
                max_connections: 10,
                auto_migrate: true,
            }),
            notifications: NotificationConfig {
                queue_capacity: 256,
                max_attempts: 4,
                base_delay_ms: 200,
                max_delay_ms: 10_000,
                jitter: true,
                audience_cache_ttl_seconds: 60,
            },
            workflow: WorkflowConfig {
                shutdown_timeout_seconds: 10,
            },
        }
    }
}

impl DossierFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (dossier-flow.toml, .dossier-flow-rc)
    /// 3. Environment variables (prefixed with DOSSIER_FLOW_, nested with `__`)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) but looks for files under `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_file = dir.join("dossier-flow.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".dossier-flow-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("DOSSIER_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DossierFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = DossierFlowConfig::load_env_file();
        DossierFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DossierFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
