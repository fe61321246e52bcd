use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt, path::PathBuf};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_STORAGE_DIR: &str = "./uploads";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// `None` runs the proxy in local-only mode.
    pub remote: Option<RemoteConfig>,
}

/// Connection settings for the S3-compatible remote tier.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, localstack); enables path-style addressing.
    pub endpoint: Option<String>,
    /// Static credentials. Falls back to the default AWS chain when absent.
    pub credentials: Option<StaticCredentials>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload proxy with local cache and S3 fallback")]
pub struct Args {
    /// Host to bind to (overrides FILE_PROXY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILE_PROXY_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory used as the local tier (overrides FILE_PROXY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes (overrides FILE_PROXY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Remote bucket; omit to run local-only (overrides FILE_PROXY_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Remote region (overrides FILE_PROXY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint URL (overrides FILE_PROXY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::resolve(args, |key| env::var(key).ok())
    }

    /// Merge CLI arguments over values from `lookup`, then defaults.
    ///
    /// Empty environment values count as unset.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let env_port = match var("FILE_PROXY_PORT").or_else(|| var("PORT")) {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing port value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let env_max_upload = match var("FILE_PROXY_MAX_UPLOAD_BYTES") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing FILE_PROXY_MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let bucket = args
            .s3_bucket
            .filter(|b| !b.trim().is_empty())
            .or_else(|| var("FILE_PROXY_S3_BUCKET"));

        let remote = bucket.map(|bucket| {
            let credentials = match (
                var("FILE_PROXY_S3_ACCESS_KEY"),
                var("FILE_PROXY_S3_SECRET_KEY"),
            ) {
                (Some(access_key), Some(secret_key)) => Some(StaticCredentials {
                    access_key,
                    secret_key,
                }),
                _ => None,
            };
            RemoteConfig {
                bucket,
                region: args
                    .s3_region
                    .or_else(|| var("FILE_PROXY_S3_REGION"))
                    .unwrap_or_else(|| DEFAULT_REGION.into()),
                endpoint: args.s3_endpoint.or_else(|| var("FILE_PROXY_S3_ENDPOINT")),
                credentials,
            }
        });

        Ok(Self {
            host: args
                .host
                .or_else(|| var("FILE_PROXY_HOST"))
                .unwrap_or_else(|| DEFAULT_HOST.into()),
            port: args.port.unwrap_or(env_port),
            storage_dir: args
                .storage_dir
                .or_else(|| var("FILE_PROXY_STORAGE_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR)),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            remote,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
