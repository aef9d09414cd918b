use std::ffi::OsString;
use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::{AuthStrategy, Credentials};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    #[serde(default = "default_auth")]
    pub default_auth: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub client_options: ClientOptions,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub basic: BasicAuthConfig,
    #[serde(default)]
    pub basic_token: TokenAuthConfig,
    #[serde(default)]
    pub oauth2: OAuth2Config,
}

#[derive(Debug, Default, Deserialize)]
pub struct BasicAuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenAuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuth2Config {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Static token used when no session holds one.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub cloud_id: String,
    /// Base for cloud-scoped calls; empty means `https://api.atlassian.com/ex/jira`.
    #[serde(default)]
    pub api_host: String,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: default_scopes(),
            access_token: String::new(),
            cloud_id: String::new(),
            api_host: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientOptions {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_name")]
    pub name: String,
    /// Seconds a stored value stays readable.
    #[serde(default = "default_session_duration")]
    pub duration: u64,
    /// SQLite file backing the session; empty keeps sessions in memory.
    #[serde(default)]
    pub db_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            duration: default_session_duration(),
            db_path: String::new(),
        }
    }
}

/// Values read from `JIRA_*` environment variables.
#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub host: Option<String>,
    pub default_auth: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub oauth_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub log_level: Option<String>,
}

impl AppConfigOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            host: read("JIRA_HOST"),
            default_auth: read("JIRA_AUTHENTICATION"),
            username: read("JIRA_USER"),
            password: read("JIRA_PASS"),
            api_token: read("JIRA_API_TOKEN"),
            oauth_token: read("JIRA_OAUTH_TOKEN"),
            client_id: read("JIRA_CLIENT_ID"),
            client_secret: read("JIRA_SECRET"),
            log_level: read("JIRA_LOG_LEVEL"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found at {path}. expected at $XDG_CONFIG_HOME/jira-rest/config.toml or ~/.config/jira-rest/config.toml")]
    MissingConfigFile { path: PathBuf },
    #[error("failed to resolve config path: HOME is not set and XDG_CONFIG_HOME is unset")]
    MissingHomeDirectory,
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load() -> Result<AppConfig, ConfigError> {
    let path = resolve_config_path()?;
    load_from(&path)
}

pub fn load_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let path = path.to_path_buf();
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingConfigFile { path: path.clone() }
        } else {
            ConfigError::ReadFailed {
                path: path.clone(),
                source,
            }
        }
    })?;

    let mut cfg = toml::from_str::<AppConfig>(&raw).map_err(|source| ConfigError::ParseFailed {
        path: path.clone(),
        source,
    })?;
    cfg.apply_overrides(&AppConfigOverrides::from_env())?;
    Ok(cfg)
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME");
    let home = std::env::var_os("HOME");
    resolve_config_path_from_env(xdg_config_home, home)
}

fn resolve_config_path_from_env(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = xdg_config_home.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join("jira-rest").join("config.toml"));
    }

    let home = home
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("jira-rest")
        .join("config.toml"))
}

impl AppConfig {
    /// Applies env overrides, then validates. Basic and token strategies share
    /// `JIRA_USER`.
    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = &overrides.host {
            self.host = value.clone();
        }
        if let Some(value) = &overrides.default_auth {
            self.default_auth = value.clone();
        }
        if let Some(value) = &overrides.username {
            self.auth.basic.username = value.clone();
            self.auth.basic_token.username = value.clone();
        }
        if let Some(value) = &overrides.password {
            self.auth.basic.password = value.clone();
        }
        if let Some(value) = &overrides.api_token {
            self.auth.basic_token.token = value.clone();
        }
        if let Some(value) = &overrides.oauth_token {
            self.auth.oauth2.access_token = value.clone();
        }
        if let Some(value) = &overrides.client_id {
            self.auth.oauth2.client_id = value.clone();
        }
        if let Some(value) = &overrides.client_secret {
            self.auth.oauth2.client_secret = value.clone();
        }
        if let Some(value) = &overrides.log_level {
            self.log_level = value.clone();
        }

        self.validate()
    }

    pub fn strategy(&self) -> Result<AuthStrategy, ConfigError> {
        self.default_auth
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("default_auth: {err}")))
    }

    /// Credentials for the selected strategy. OAuth2 without a static token
    /// yields `Credentials::None`; the token then comes from a session.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        Ok(match self.strategy()? {
            AuthStrategy::Basic => {
                Credentials::basic(&self.auth.basic.username, &self.auth.basic.password)
            }
            AuthStrategy::BasicToken => Credentials::api_token(
                &self.auth.basic_token.username,
                &self.auth.basic_token.token,
            ),
            AuthStrategy::OAuth2 if self.auth.oauth2.access_token.trim().is_empty() => {
                Credentials::None
            }
            AuthStrategy::OAuth2 => Credentials::bearer(&self.auth.oauth2.access_token),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }

        match self.strategy()? {
            AuthStrategy::Basic => {
                require(&self.auth.basic.username, "auth.basic.username")?;
                require(&self.auth.basic.password, "auth.basic.password")?;
            }
            AuthStrategy::BasicToken => {
                require(&self.auth.basic_token.username, "auth.basic_token.username")?;
                require(&self.auth.basic_token.token, "auth.basic_token.token")?;
            }
            AuthStrategy::OAuth2 => {
                if self.auth.oauth2.access_token.trim().is_empty() {
                    require(&self.auth.oauth2.client_id, "auth.oauth2.client_id")?;
                    require(&self.auth.oauth2.client_secret, "auth.oauth2.client_secret")?;
                }
                if self.auth.oauth2.scopes.is_empty() {
                    return Err(ConfigError::Invalid(
                        "auth.oauth2.scopes must contain at least one scope".into(),
                    ));
                }
            }
        }

        if self.session.name.trim().is_empty() {
            return Err(ConfigError::Invalid("session.name must not be empty".into()));
        }
        if self.session.duration == 0 {
            return Err(ConfigError::Invalid("session.duration must be > 0".into()));
        }
        if self.client_options.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "client_options.timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn default_auth() -> String {
    AuthStrategy::Basic.as_str().to_string()
}

fn default_log_level() -> String {
    "WARNING".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["read:jira-user".to_string(), "read:jira-work".to_string()]
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("jira-rest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_session_name() -> String {
    "jira_session".to_string()
}

const fn default_session_duration() -> u64 {
    3600
}
