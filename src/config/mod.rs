//! Configuration management
//!
//! Configuration is read from `config.yml` and may be overridden through
//! `BLOGICUM_*` environment variables. Every field has a default, so a
//! missing or empty file yields a runnable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blog behaviour (pagination, sessions)
    #[serde(default)]
    pub blog: BlogConfig,
    /// Uploaded post images
    #[serde(default)]
    pub media: MediaConfig,
    /// Template overrides
    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/blogicum.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Blog behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    /// Title shown in the page header
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Posts per page on every paginated list
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
    /// Lifetime of a login session
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            posts_per_page: default_posts_per_page(),
            session_days: default_session_days(),
        }
    }
}

fn default_site_name() -> String {
    "Blogicum".to_string()
}

fn default_posts_per_page() -> u32 {
    10
}

fn default_session_days() -> i64 {
    7
}

/// Storage for post images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory served under `/media/`
    #[serde(default = "default_media_path")]
    pub path: PathBuf,
    /// Maximum image size in bytes (default: 5MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            path: default_media_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_media_path() -> PathBuf {
    PathBuf::from("media")
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl MediaConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// File extension for an image MIME type
    pub fn extension_for(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory whose `.html` files replace the embedded templates of the same name
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the default configuration; invalid
    /// YAML is reported with its line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides.
    ///
    /// Recognised variables:
    /// - BLOGICUM_SERVER_HOST, BLOGICUM_SERVER_PORT
    /// - BLOGICUM_DATABASE_DRIVER, BLOGICUM_DATABASE_URL
    /// - BLOGICUM_BLOG_SITE_NAME, BLOGICUM_BLOG_POSTS_PER_PAGE, BLOGICUM_BLOG_SESSION_DAYS
    /// - BLOGICUM_MEDIA_PATH, BLOGICUM_MEDIA_MAX_FILE_SIZE
    /// - BLOGICUM_TEMPLATES_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the site unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.blog.posts_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "blog.posts_per_page must be greater than zero".to_string(),
            ));
        }
        if self.blog.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "blog.session_days must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides; unparsable values are ignored
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BLOGICUM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BLOGICUM_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("BLOGICUM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("BLOGICUM_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(name) = std::env::var("BLOGICUM_BLOG_SITE_NAME") {
            self.blog.site_name = name;
        }
        if let Ok(per_page) = std::env::var("BLOGICUM_BLOG_POSTS_PER_PAGE") {
            if let Ok(per_page) = per_page.parse::<u32>() {
                if per_page > 0 {
                    self.blog.posts_per_page = per_page;
                }
            }
        }
        if let Ok(days) = std::env::var("BLOGICUM_BLOG_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                if days > 0 {
                    self.blog.session_days = days;
                }
            }
        }

        if let Ok(path) = std::env::var("BLOGICUM_MEDIA_PATH") {
            self.media.path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("BLOGICUM_MEDIA_MAX_FILE_SIZE") {
            if let Ok(size) = size.parse::<u64>() {
                self.media.max_file_size = size;
            }
        }

        if let Ok(path) = std::env::var("BLOGICUM_TEMPLATES_PATH") {
            self.templates.path = Some(PathBuf::from(path));
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Every test that touches BLOGICUM_* variables holds this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "BLOGICUM_SERVER_HOST",
    "BLOGICUM_SERVER_PORT",
    "BLOGICUM_DATABASE_DRIVER",
    "BLOGICUM_DATABASE_URL",
    "BLOGICUM_BLOG_SITE_NAME",
    "BLOGICUM_BLOG_POSTS_PER_PAGE",
    "BLOGICUM_BLOG_SESSION_DAYS",
    "BLOGICUM_MEDIA_PATH",
    "BLOGICUM_MEDIA_MAX_FILE_SIZE",
    "BLOGICUM_TEMPLATES_PATH",
];

#[cfg(test)]
fn clear_env() {
    for name in ENV_VARS {
        std::env::remove_var(name);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn driver_strategy() -> impl Strategy<Value = DatabaseDriver> {
        prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// A serialized configuration parses back to the same values
        #[test]
        fn config_yaml_roundtrip(
            host in "[a-z][a-z0-9]{0,10}",
            port in 1u16..=65535,
            driver in driver_strategy(),
            per_page in 1u32..=100,
            session_days in 1i64..=365,
        ) {
            let mut config = Config::default();
            config.server.host = host.clone();
            config.server.port = port;
            config.database.driver = driver;
            config.blog.posts_per_page = per_page;
            config.blog.session_days = session_days;

            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.server.host, host);
            prop_assert_eq!(loaded.server.port, port);
            prop_assert_eq!(loaded.database.driver, driver);
            prop_assert_eq!(loaded.blog.posts_per_page, per_page);
            prop_assert_eq!(loaded.blog.session_days, session_days);
        }

        /// Sections left out of the file fall back to defaults
        #[test]
        fn omitted_sections_use_defaults(port in 1u16..=65535) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", port).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.server.port, port);
            prop_assert_eq!(loaded.blog.posts_per_page, 10);
            prop_assert_eq!(loaded.media.path, PathBuf::from("media"));
        }
    }
}
