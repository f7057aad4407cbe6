// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("cache prefixes must be non-empty and must not prefix each other: '{0}' vs '{1}'")]
    PrefixCollision(String, String),
}

/// One key prefix per cached resource family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefixes {
    pub index_newest: String,
    pub index_hots: String,
    pub index_following: String,
    pub user_tweets: String,
    pub tweet_comments: String,
}

impl Default for KeyPrefixes {
    fn default() -> Self {
        Self {
            index_newest: "timeline:index:newest:".to_owned(),
            index_hots: "timeline:index:hots:".to_owned(),
            index_following: "timeline:index:following:".to_owned(),
            user_tweets: "timeline:user:tweets:".to_owned(),
            tweet_comments: "timeline:post:comments:".to_owned(),
        }
    }
}

impl KeyPrefixes {
    fn all(&self) -> [&str; 5] {
        [
            self.index_newest.as_str(),
            self.index_hots.as_str(),
            self.index_following.as_str(),
            self.user_tweets.as_str(),
            self.tweet_comments.as_str(),
        ]
    }

    /// Prefixes must be pairwise distinct, and no prefix may start another,
    /// otherwise keys of two resource kinds could meet.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = self.all();
        for (i, a) in all.iter().enumerate() {
            if a.is_empty() {
                return Err(ConfigError::PrefixCollision((*a).to_owned(), String::new()));
            }
            for b in all.iter().skip(i + 1) {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(ConfigError::PrefixCollision((*a).to_owned(), (*b).to_owned()));
                }
            }
        }
        Ok(())
    }
}

/// TTLs, capacity and key prefixes of the response cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub index_tweets_expire: Duration,
    pub user_tweets_expire: Duration,
    pub tweet_comments_expire: Duration,
    /// Entry limit of the in-process store.
    pub capacity: usize,
    pub prefixes: KeyPrefixes,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            index_tweets_expire: Duration::from_secs(120),
            user_tweets_expire: Duration::from_secs(60),
            tweet_comments_expire: Duration::from_secs(120),
            capacity: 4096,
            prefixes: KeyPrefixes::default(),
        }
    }
}

impl CacheSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = Self {
            index_tweets_expire: seconds_or("CACHE_INDEX_TWEETS_EXPIRE", defaults.index_tweets_expire)?,
            user_tweets_expire: seconds_or("CACHE_USER_TWEETS_EXPIRE", defaults.user_tweets_expire)?,
            tweet_comments_expire: seconds_or(
                "CACHE_TWEET_COMMENTS_EXPIRE",
                defaults.tweet_comments_expire,
            )?,
            capacity: parse_or("CACHE_CAPACITY", defaults.capacity)?,
            prefixes: defaults.prefixes,
        };
        settings.prefixes.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,
    pub cache: CacheSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            port: parse_or("APP_PORT", 8008)?,
            cache: CacheSettings::from_env()?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn seconds_or(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(name, default.as_secs()).map(Duration::from_secs)
}
