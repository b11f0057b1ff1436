use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub swish: SwishConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Externally reachable base URL, used for confirmation links and
    /// Swish callback URLs (e.g. "https://portal.example.se").
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
    /// Session lifetime in days when "remember me" is requested at login
    #[serde(default = "default_remember_me_days")]
    pub remember_me_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            session_days: default_session_days(),
            remember_me_days: default_remember_me_days(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@localhost".to_string()
}

fn default_admin_password() -> String {
    // Generate a random password if not provided; it is logged once at seed time
    uuid::Uuid::new_v4().to_string()
}

fn default_session_days() -> i64 {
    7
}

fn default_remember_me_days() -> i64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Skolportal".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwishConfig {
    /// Use the Swish merchant test environment (MSS)
    #[serde(default = "default_swish_test_mode")]
    pub test_mode: bool,
    /// Merchant Swish number
    #[serde(default)]
    pub payee_alias: String,
    /// PKCS#12 client certificate bundle for mTLS
    pub cert_path: Option<PathBuf>,
    pub cert_password: Option<String>,
    /// CA bundle used to verify the Swish server certificate
    pub ca_cert_path: Option<PathBuf>,
    /// Outbound request timeout in seconds
    #[serde(default = "default_swish_timeout")]
    pub timeout_secs: u64,
    /// Override the API base URL (tests); normally derived from test_mode
    pub base_url: Option<String>,
}

impl Default for SwishConfig {
    fn default() -> Self {
        Self {
            test_mode: default_swish_test_mode(),
            payee_alias: String::new(),
            cert_path: None,
            cert_password: None,
            ca_cert_path: None,
            timeout_secs: default_swish_timeout(),
            base_url: None,
        }
    }
}

fn default_swish_test_mode() -> bool {
    true
}

fn default_swish_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults
    /// if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Config {
                server: ServerConfig::default(),
                auth: AuthConfig::default(),
                email: EmailConfig::default(),
                swish: SwishConfig::default(),
                logging: LoggingConfig::default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::load(Path::new("/nonexistent/skolportal.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_days, 7);
        assert!(config.swish.test_mode);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000
            public_url = "https://portal.example.se"

            [swish]
            payee_alias = "1234679304"
            test_mode = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.swish.payee_alias, "1234679304");
        assert!(!config.swish.test_mode);
        // Untouched sections keep defaults
        assert_eq!(config.auth.session_days, 7);
    }
}
