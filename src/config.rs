//! Configuration for nbviewerbot
//!
//! Settings come from a TOML file. Reddit credentials are never stored in
//! the file; it names the environment variables that hold them, and those
//! are resolved at runtime (optionally after loading a `.env` file).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Bot testing subreddits, always included in the "relevant" set
pub const SUBREDDITS_TEST: &[&str] = &[
    "testingground4bots",
    "bottestingplace",
    "bottesting",
    "bottest",
];

/// Subreddits where notebook links are commonly posted
pub const SUBREDDITS_RELEVANT: &[&str] = &[
    "datascience",
    "MachineLearning",
    "learnmachinelearning",
    "learnpython",
    "Python",
    "JupyterNotebooks",
    "IPython",
    "statistics",
    "datasets",
    "dataisbeautiful",
    "deeplearning",
    "computervision",
    "LanguageTechnology",
    "pystats",
    "rstats",
    "bioinformatics",
    "compsci",
    "kaggle",
];

/// Main bot configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub reddit: RedditSection,
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Reddit API access
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditSection {
    /// Environment variable containing the script app's client id
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,
    /// Environment variable containing the script app's client secret
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
    /// Environment variable containing the bot account's username
    #[serde(default = "default_username_env")]
    pub username_env: String,
    /// Environment variable containing the bot account's password
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RedditSection {
    fn default() -> Self {
        Self {
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_client_id_env() -> String {
    "CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "CLIENT_SECRET".to_string()
}

fn default_username_env() -> String {
    "USERNAME".to_string()
}

fn default_password_env() -> String {
    "PASSWORD".to_string()
}

fn default_user_agent() -> String {
    format!("rust:nbviewerbot:v{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

/// Which subreddits to watch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubredditSet {
    /// Relevant subreddits plus the bot testing subreddits
    #[default]
    Relevant,
    /// Only the bot testing subreddits
    Test,
    /// /r/all
    All,
}

impl SubredditSet {
    pub const ALL_SETS: [SubredditSet; 3] =
        [SubredditSet::Relevant, SubredditSet::Test, SubredditSet::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubredditSet::Relevant => "relevant",
            SubredditSet::Test => "test",
            SubredditSet::All => "all",
        }
    }
}

impl std::fmt::Display for SubredditSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubredditSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevant" => Ok(SubredditSet::Relevant),
            "test" => Ok(SubredditSet::Test),
            "all" => Ok(SubredditSet::All),
            other => Err(ConfigError::InvalidConfig(format!(
                "Unknown subreddit set '{other}', expected relevant, test or all"
            ))),
        }
    }
}

/// Dispatcher and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSection {
    #[serde(default)]
    pub subreddit_set: SubredditSet,
    /// Appended to the "relevant" set
    #[serde(default)]
    pub extra_subreddits: Vec<String>,
    #[serde(default = "default_reply_log_path")]
    pub reply_log_path: PathBuf,
    /// Bounded work queue size shared by both feeders
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How long the dispatcher waits on an empty queue before rechecking feeders
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Add a Binder link next to each nbviewer link
    #[serde(default)]
    pub binder_links: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            subreddit_set: SubredditSet::default(),
            extra_subreddits: Vec::new(),
            reply_log_path: default_reply_log_path(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            binder_links: false,
        }
    }
}

fn default_reply_log_path() -> PathBuf {
    PathBuf::from("reply_log.json")
}

fn default_queue_capacity() -> usize {
    500
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl BotSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Backoff for posting replies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("{0} not found in environment variables. Have you filled in your .env file?")]
    EnvVarNotFound(String),
    #[error("Failed to load env file {path}: {message}")]
    EnvFile { path: PathBuf, message: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reddit script-app credentials resolved from the environment
#[derive(Clone, PartialEq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and subreddit names
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "bot.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.bot.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "bot.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "retry.base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::InvalidConfig(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".to_string(),
            ));
        }
        for name in &self.bot.extra_subreddits {
            validate_subreddit_name(name)?;
        }
        Ok(())
    }

    /// Subreddits for the given set, sorted and without duplicates
    pub fn subreddits(&self, set: SubredditSet) -> Vec<String> {
        let mut subs: Vec<String> = match set {
            SubredditSet::All => vec!["all".to_string()],
            SubredditSet::Test => SUBREDDITS_TEST.iter().map(|s| s.to_string()).collect(),
            SubredditSet::Relevant => SUBREDDITS_RELEVANT
                .iter()
                .map(|s| s.to_string())
                .chain(self.bot.extra_subreddits.iter().cloned())
                .chain(SUBREDDITS_TEST.iter().map(|s| s.to_string()))
                .collect(),
        };
        subs.sort_by_key(|s| s.to_lowercase());
        subs.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        subs
    }

    /// Every named set with its subreddits, in `ALL_SETS` order
    pub fn subreddit_sets(&self) -> Vec<(SubredditSet, Vec<String>)> {
        SubredditSet::ALL_SETS
            .iter()
            .map(|set| (*set, self.subreddits(*set)))
            .collect()
    }

    /// Subreddits for the configured set
    pub fn active_subreddits(&self) -> Vec<String> {
        self.subreddits(self.bot.subreddit_set)
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Resolve Reddit credentials from the environment variables named in the config
    pub fn reddit_credentials(&self) -> Result<RedditCredentials, ConfigError> {
        Ok(RedditCredentials {
            client_id: Self::get_env_var_required(&self.reddit.client_id_env)?,
            client_secret: Self::get_env_var_required(&self.reddit.client_secret_env)?,
            username: Self::get_env_var_required(&self.reddit.username_env)?,
            password: Self::get_env_var_required(&self.reddit.password_env)?,
        })
    }
}

/// Load variables from a `.env` file.
///
/// With an explicit path the file must exist and its values override the
/// environment. Without one, a `.env` in the working directory is loaded if
/// present and never overrides.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => dotenvy::from_path_override(path)
            .map(|_| ())
            .map_err(|e| ConfigError::EnvFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        None => {
            // A missing default .env is fine
            let _ = dotenvy::dotenv();
            Ok(())
        }
    }
}

fn validate_subreddit_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ConfigError::InvalidConfig(format!(
            "Subreddit name '{name}' must match [A-Za-z0-9_]+"
        )));
    }
    Ok(())
}
