use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_club_name")]
    pub club_name: String,
}

fn default_club_name() -> String {
    "Aqua Bear Swim Club".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Origins allowed by CORS. Empty means any.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on the in-memory store.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default)]
    pub staff: Vec<StaffAccountConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StaffAccountConfig {
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: Option<String>,
    /// Bootstrap only; hashed at startup.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    pub notice_seconds: u64,
    pub store_timeout_seconds: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            notice_seconds: 10,
            store_timeout_seconds: 10,
        }
    }
}

impl ConsoleConfig {
    pub fn notice_delay(&self) -> Duration {
        Duration::from_secs(self.notice_seconds)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// No key means notifications are logged and dropped.
    pub resend_api_key: Option<String>,
    pub api_base: String,
    pub from: String,
    pub to: String,
    pub site_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            api_base: "https://api.resend.com".to_string(),
            from: "Aqua Bear Swim Club <onboarding@resend.dev>".to_string(),
            to: "reservas@aquabear.mx".to_string(),
            site_url: "https://aqua-bear.vercel.app".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub limit: i64,
    pub window_seconds: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window_seconds: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `AQUABEAR__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("AQUABEAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
