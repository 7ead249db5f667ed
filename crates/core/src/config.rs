use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user_config::NamingScheme;

pub const DEFAULT_MEET_BASE_URL: &str = "https://g.co/meet";
pub const PLUGIN_ROUTE_PREFIX: &str = "/plugins/gmeet";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mattermost: MattermostConfig,
    pub plugin: PluginSettings,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
    /// Address the chat server uses to reach this service. Ask-prompt buttons
    /// post back here. Defaults to `http://{bind_address}:{port}`.
    pub public_url: String,
    /// The API takes the caller from `Mattermost-User-Id`. That header is only
    /// trustworthy behind a proxy that authenticates the session and overwrites
    /// it, so binding a non-loopback address requires opting in here.
    pub trust_identity_header: bool,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MattermostConfig {
    pub site_url: String,
    pub bot_token: SecretString,
    pub command_token: SecretString,
    /// Shared secret embedded in ask-prompt buttons. Button callbacks carry the
    /// user id in the body, and this token is what makes that id trusted. When
    /// empty, bootstrap generates one per process.
    pub action_token: SecretString,
    pub timeout_secs: u64,
}

/// The reloadable part of the configuration, handed to requests as an
/// immutable snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginSettings {
    pub naming_scheme: NamingScheme,
    pub meet_base_url: String,
    pub server_locale: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub site_url: Option<String>,
    pub bot_token: Option<String>,
    pub command_token: Option<String>,
    pub public_url: Option<String>,
    pub naming_scheme: Option<NamingScheme>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8065,
                health_check_port: 8066,
                graceful_shutdown_secs: 15,
                public_url: String::new(),
                trust_identity_header: false,
            },
            database: DatabaseConfig {
                url: "sqlite://gmeet.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            mattermost: MattermostConfig {
                site_url: String::new(),
                bot_token: String::new().into(),
                command_token: String::new().into(),
                action_token: String::new().into(),
                timeout_secs: 10,
            },
            plugin: PluginSettings::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            naming_scheme: NamingScheme::Words,
            meet_base_url: DEFAULT_MEET_BASE_URL.to_string(),
            server_locale: "en".to_string(),
        }
    }
}

impl PluginSettings {
    pub fn meeting_url(&self, meeting_id: &str) -> String {
        format!("{}/{meeting_id}", self.meet_base_url.trim_end_matches('/'))
    }
}

impl ServerConfig {
    pub fn public_base_url(&self) -> String {
        let public_url = self.public_url.trim();
        if public_url.is_empty() {
            format!("http://{}:{}", self.bind_address, self.port)
        } else {
            public_url.trim_end_matches('/').to_string()
        }
    }

    /// Callback URL the ask-prompt buttons point at.
    pub fn meetings_callback_url(&self) -> String {
        format!("{}{PLUGIN_ROUTE_PREFIX}/api/v1/meetings", self.public_base_url())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("gmeet.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(public_url) = server.public_url {
                self.server.public_url = public_url;
            }
            if let Some(trust_identity_header) = server.trust_identity_header {
                self.server.trust_identity_header = trust_identity_header;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(mattermost) = patch.mattermost {
            if let Some(site_url) = mattermost.site_url {
                self.mattermost.site_url = site_url;
            }
            if let Some(bot_token_value) = mattermost.bot_token {
                self.mattermost.bot_token = secret_value(bot_token_value);
            }
            if let Some(command_token_value) = mattermost.command_token {
                self.mattermost.command_token = secret_value(command_token_value);
            }
            if let Some(action_token_value) = mattermost.action_token {
                self.mattermost.action_token = secret_value(action_token_value);
            }
            if let Some(timeout_secs) = mattermost.timeout_secs {
                self.mattermost.timeout_secs = timeout_secs;
            }
        }

        if let Some(plugin) = patch.plugin {
            if let Some(naming_scheme) = plugin.naming_scheme {
                self.plugin.naming_scheme = naming_scheme.parse().map_err(|error| {
                    ConfigError::Validation(format!("plugin.naming_scheme: {error}"))
                })?;
            }
            if let Some(meet_base_url) = plugin.meet_base_url {
                self.plugin.meet_base_url = meet_base_url;
            }
            if let Some(server_locale) = plugin.server_locale {
                self.plugin.server_locale = server_locale;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GMEET_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GMEET_SERVER_PORT") {
            self.server.port = parse_u16("GMEET_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GMEET_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("GMEET_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("GMEET_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GMEET_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("GMEET_SERVER_PUBLIC_URL") {
            self.server.public_url = value;
        }
        if let Some(value) = read_env("GMEET_SERVER_TRUST_IDENTITY_HEADER") {
            self.server.trust_identity_header =
                parse_bool("GMEET_SERVER_TRUST_IDENTITY_HEADER", &value)?;
        }

        if let Some(value) = read_env("GMEET_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GMEET_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("GMEET_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GMEET_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GMEET_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GMEET_MATTERMOST_SITE_URL") {
            self.mattermost.site_url = value;
        }
        if let Some(value) = read_env("GMEET_MATTERMOST_BOT_TOKEN") {
            self.mattermost.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("GMEET_MATTERMOST_COMMAND_TOKEN") {
            self.mattermost.command_token = secret_value(value);
        }
        if let Some(value) = read_env("GMEET_MATTERMOST_ACTION_TOKEN") {
            self.mattermost.action_token = secret_value(value);
        }
        if let Some(value) = read_env("GMEET_MATTERMOST_TIMEOUT_SECS") {
            self.mattermost.timeout_secs = parse_u64("GMEET_MATTERMOST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GMEET_PLUGIN_NAMING_SCHEME") {
            self.plugin.naming_scheme = parse_naming_scheme("GMEET_PLUGIN_NAMING_SCHEME", &value)?;
        }
        if let Some(value) = read_env("GMEET_PLUGIN_MEET_BASE_URL") {
            self.plugin.meet_base_url = value;
        }
        if let Some(value) = read_env("GMEET_PLUGIN_SERVER_LOCALE") {
            self.plugin.server_locale = value;
        }

        let log_level = read_env("GMEET_LOGGING_LEVEL").or_else(|| read_env("GMEET_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("GMEET_LOGGING_FORMAT").or_else(|| read_env("GMEET_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(site_url) = overrides.site_url {
            self.mattermost.site_url = site_url;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.mattermost.bot_token = secret_value(bot_token);
        }
        if let Some(command_token) = overrides.command_token {
            self.mattermost.command_token = secret_value(command_token);
        }
        if let Some(public_url) = overrides.public_url {
            self.server.public_url = public_url;
        }
        if let Some(naming_scheme) = overrides.naming_scheme {
            self.plugin.naming_scheme = naming_scheme;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_database(&self.database)?;
        validate_mattermost(&self.mattermost)?;
        validate_plugin(&self.plugin)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Process-wide plugin settings. Readers clone an `Arc` snapshot; a reload
/// swaps the whole value under the write lock.
#[derive(Debug)]
pub struct SettingsHandle {
    current: RwLock<Arc<PluginSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: PluginSettings) -> Self {
        Self { current: RwLock::new(Arc::new(settings)) }
    }

    pub fn snapshot(&self) -> Arc<PluginSettings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, settings: PluginSettings) {
        let next = Arc::new(settings);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(PluginSettings::default())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("gmeet.toml"), PathBuf::from("config/gmeet.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == server.port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    let public_url = server.public_url.trim();
    if !public_url.is_empty() && !is_http_url(public_url) {
        return Err(ConfigError::Validation(
            "server.public_url must start with http:// or https://".to_string(),
        ));
    }

    if !server.trust_identity_header && !is_loopback(&server.bind_address) {
        return Err(ConfigError::Validation(format!(
            "server.bind_address `{}` is reachable from other hosts; put the service behind a \
             proxy that sets Mattermost-User-Id and set server.trust_identity_header = true",
            server.bind_address
        )));
    }

    Ok(())
}

fn is_loopback(bind_address: &str) -> bool {
    match bind_address.trim().parse::<IpAddr>() {
        Ok(address) => address.is_loopback(),
        Err(_) => bind_address.trim().eq_ignore_ascii_case("localhost"),
    }
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_mattermost(mattermost: &MattermostConfig) -> Result<(), ConfigError> {
    let site_url = mattermost.site_url.trim();
    if site_url.is_empty() {
        return Err(ConfigError::Validation(
            "mattermost.site_url is required (System Console > Environment > Web Server > Site URL)"
                .to_string(),
        ));
    }
    if !is_http_url(site_url) {
        return Err(ConfigError::Validation(
            "mattermost.site_url must start with http:// or https://".to_string(),
        ));
    }

    if mattermost.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "mattermost.bot_token is required. Create it under Integrations > Bot Accounts"
                .to_string(),
        ));
    }

    if mattermost.command_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "mattermost.command_token is required. Copy it from Integrations > Slash Commands > /gmeet"
                .to_string(),
        ));
    }

    if mattermost.timeout_secs == 0 || mattermost.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "mattermost.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_plugin(plugin: &PluginSettings) -> Result<(), ConfigError> {
    if !is_http_url(plugin.meet_base_url.trim()) {
        return Err(ConfigError::Validation(
            "plugin.meet_base_url must start with http:// or https://".to_string(),
        ));
    }

    if plugin.server_locale.trim().is_empty() {
        return Err(ConfigError::Validation("plugin.server_locale must not be empty".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_naming_scheme(key: &str, value: &str) -> Result<NamingScheme, ConfigError> {
    value.parse::<NamingScheme>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    database: Option<DatabasePatch>,
    mattermost: Option<MattermostPatch>,
    plugin: Option<PluginPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
    public_url: Option<String>,
    trust_identity_header: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MattermostPatch {
    site_url: Option<String>,
    bot_token: Option<String>,
    command_token: Option<String>,
    action_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginPatch {
    naming_scheme: Option<String>,
    meet_base_url: Option<String>,
    server_locale: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
