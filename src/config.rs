use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable that overrides `auth.jwt_secret`.
pub const JWT_SECRET_ENV: &str = "VERSEVAULT_JWT_SECRET";

const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

// one hour up to one year
const TOKEN_HOURS_RANGE: std::ops::RangeInclusive<i64> = 1..=24 * 365;

#[derive(Parser, Debug)]
#[command(name = "versevault", about = "Multi-user blogging service")]
pub struct Cli {
    /// TOML config file [default: <data-dir>/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, overriding `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port, overriding `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory holding the database and uploads [default: ~/.versevault]
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
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
    /// URL prefix returned for stored images.
    pub public_base: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            public_base: "/uploads".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_hours: 24,
            bcrypt_cost: 10,
        }
    }
}

impl Config {
    /// Layer the config file, then CLI flags, then the environment, over the defaults.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let file = cli
            .config
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = Self::from_file(&file)?;
        config.apply_cli(cli);
        config.apply_env();
        config
            .database
            .path
            .get_or_insert_with(|| data_dir.join("versevault.db"));
        config
            .storage
            .path
            .get_or_insert_with(|| data_dir.join("uploads"));
        Ok(config)
    }

    fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            self.auth.jwt_secret = secret;
        }
    }

    /// Checks that must pass before the server accepts requests.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            anyhow::bail!(
                "auth.jwt_secret is empty; set it in the config file or via {}",
                JWT_SECRET_ENV
            );
        }
        if !BCRYPT_COST_RANGE.contains(&self.auth.bcrypt_cost) {
            anyhow::bail!(
                "auth.bcrypt_cost must be between {} and {}",
                BCRYPT_COST_RANGE.start(),
                BCRYPT_COST_RANGE.end()
            );
        }
        if !TOKEN_HOURS_RANGE.contains(&self.auth.token_hours) {
            anyhow::bail!(
                "auth.token_hours must be between {} and {}",
                TOKEN_HOURS_RANGE.start(),
                TOKEN_HOURS_RANGE.end()
            );
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".versevault")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("versevault.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("uploads"))
    }
}
