use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::app::ClientSettings;

#[derive(Parser, Debug)]
#[command(name = "minigram", about = "A small self-hosted photo sharing app")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for public blob URLs. Empty means same-origin paths.
    pub public_url: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    pub cache_control: String,
    /// Put uploaded post images under `<user name>/` in the images bucket.
    pub nest_uploads_under_user: bool,
    pub max_upload_bytes: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct IdentityConfig {
    pub cookie_name: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct NotificationsConfig {
    pub limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_control: "3600".to_string(),
            nest_uploads_under_user: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: "minigram_user_name".to_string(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { limit: 30 }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("minigram.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("blobs"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".minigram")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("minigram.db"))
    }

    pub fn blobs_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("blobs"))
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            notification_limit: self.notifications.limit,
            cache_control: self.storage.cache_control.clone(),
            nest_uploads_under_user: self.storage.nest_uploads_under_user,
        }
    }
}
