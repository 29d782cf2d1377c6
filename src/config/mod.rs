//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::comments::{
    CommentSettings, DEFAULT_CACHE_TTL, DEFAULT_IMAGE_URL_TTL, DEFAULT_PAGE_SIZE,
};

#[cfg(test)]
mod tests;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "commentary";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_POOL_SIZE: u32 = 8;
const DEFAULT_PROCESS_CACHE_CAPACITY: u64 = 10_000;
const DEFAULT_BLOB_BUCKET: &str = "user-comments";
const DEFAULT_BLOB_REGION: &str = "us-east-1";
/// Longest lifetime an S3 presigned URL may carry.
const MAX_IMAGE_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_PAGE_SIZE: u32 = 200;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub blob: BlobSettings,
    pub comments: CommentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// `None` runs the service against in-memory storage.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `None` selects the in-process cache.
    pub redis_url: Option<String>,
    pub pool_size: NonZeroU32,
    /// Entry limit for the in-process cache.
    pub process_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct BlobSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<Url>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("COMMENTARY").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    blob: RawBlobSettings,
    comments: RawCommentSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_database_override(&overrides.database);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(bucket) = overrides.blob_bucket.as_ref() {
            self.blob.bucket = Some(bucket.clone());
        }
        if let Some(endpoint) = overrides.blob_endpoint.as_ref() {
            self.blob.endpoint = Some(endpoint.clone());
        }
        if let Some(ttl) = overrides.comments_cache_ttl_seconds {
            self.comments.cache_ttl_seconds = Some(ttl);
        }
        if let Some(size) = overrides.comments_page_size {
            self.comments.page_size = Some(size);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            blob,
            comments,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            blob: build_blob_settings(blob)?,
            comments: build_comment_settings(comments)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let redis_url = non_blank(cache.redis_url);
    if let Some(url) = redis_url.as_deref() {
        let parsed = Url::parse(url)
            .map_err(|err| LoadError::invalid("cache.redis_url", err.to_string()))?;
        if !matches!(parsed.scheme(), "redis" | "rediss") {
            return Err(LoadError::invalid(
                "cache.redis_url",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }
    }

    let pool_size = non_zero_u32(
        cache.pool_size.unwrap_or(DEFAULT_CACHE_POOL_SIZE).into(),
        "cache.pool_size",
    )?;

    let process_capacity = cache
        .process_capacity
        .unwrap_or(DEFAULT_PROCESS_CACHE_CAPACITY);
    let process_capacity = usize::try_from(process_capacity)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.process_capacity",
                "must be greater than zero and fit in usize",
            )
        })?;

    Ok(CacheSettings {
        redis_url,
        pool_size,
        process_capacity,
    })
}

fn build_blob_settings(blob: RawBlobSettings) -> Result<BlobSettings, LoadError> {
    let bucket = non_blank(blob.bucket).unwrap_or_else(|| DEFAULT_BLOB_BUCKET.to_string());
    let region = non_blank(blob.region).unwrap_or_else(|| DEFAULT_BLOB_REGION.to_string());
    let endpoint = non_blank(blob.endpoint)
        .map(|value| {
            Url::parse(&value).map_err(|err| LoadError::invalid("blob.endpoint", err.to_string()))
        })
        .transpose()?;

    Ok(BlobSettings {
        bucket,
        region,
        endpoint,
    })
}

fn build_comment_settings(comments: RawCommentSettings) -> Result<CommentSettings, LoadError> {
    let cache_ttl_secs = comments
        .cache_ttl_seconds
        .unwrap_or(DEFAULT_CACHE_TTL.as_secs());
    if cache_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "comments.cache_ttl_seconds",
            "must be greater than zero",
        ));
    }
    if cache_ttl_secs > MAX_CACHE_TTL_SECS {
        return Err(LoadError::invalid(
            "comments.cache_ttl_seconds",
            format!("must not exceed {MAX_CACHE_TTL_SECS} seconds (30 days)"),
        ));
    }

    let page_size = non_zero_u32(
        comments.page_size.unwrap_or(DEFAULT_PAGE_SIZE.get()).into(),
        "comments.page_size",
    )?;
    if page_size.get() > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            "comments.page_size",
            format!("must not exceed {MAX_PAGE_SIZE}"),
        ));
    }

    let image_url_ttl_secs = comments
        .image_url_ttl_seconds
        .unwrap_or(DEFAULT_IMAGE_URL_TTL.as_secs());
    if image_url_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "comments.image_url_ttl_seconds",
            "must be greater than zero",
        ));
    }
    if image_url_ttl_secs > MAX_IMAGE_URL_TTL_SECS {
        return Err(LoadError::invalid(
            "comments.image_url_ttl_seconds",
            format!("must not exceed {MAX_IMAGE_URL_TTL_SECS} seconds (7 days)"),
        ));
    }

    Ok(CommentSettings {
        cache_ttl: Duration::from_secs(cache_ttl_secs),
        page_size,
        image_url_ttl: Duration::from_secs(image_url_ttl_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    redis_url: Option<String>,
    pool_size: Option<u32>,
    process_capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBlobSettings {
    bucket: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentSettings {
    cache_ttl_seconds: Option<u64>,
    page_size: Option<u32>,
    image_url_ttl_seconds: Option<u64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
