use anyhow::{Context, bail};
use clap::Parser;
use geoshard::config::DEFAULT_ENDPOINT;
use geoshard::{ApiKey, GeocoderConfig, PipelineConfig, ResumePolicy};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the `geoshard` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first). Defaults match the settings the pipeline is
/// normally run with: batches of 100, a checkpoint every 1000 results and a
/// 10 second request timeout.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "geoshard",
    version,
    about = "Resumable address geocoding with one worker per API key"
)]
pub struct CliArgs {
    /// CSV file with the addresses to geocode.
    ///
    /// Environment variable: `GEOSHARD_INPUT`
    #[arg(long, env = "GEOSHARD_INPUT")]
    pub input: PathBuf,

    /// Name of the address column in the input CSV.
    ///
    /// Environment variable: `GEOSHARD_ADDRESS_COLUMN`
    #[arg(long, env = "GEOSHARD_ADDRESS_COLUMN", default_value_t = String::from("address"))]
    pub address_column: String,

    /// CSV file with a `key` column, one API key per row.
    ///
    /// Environment variable: `GEOSHARD_KEYS_FILE`
    #[arg(long, env = "GEOSHARD_KEYS_FILE")]
    pub keys_file: Option<PathBuf>,

    /// API key to use. Repeat the flag for several keys; each key gets its
    /// own worker. Combined with `--keys-file` if both are given.
    ///
    /// Environment variable: `GEOSHARD_API_KEYS` (comma-separated)
    #[arg(
        long = "api-key",
        env = "GEOSHARD_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub api_keys: Vec<String>,

    /// Parquet checkpoint. Created on first run, read on every later run.
    ///
    /// Environment variable: `GEOSHARD_CHECKPOINT`
    #[arg(
        long,
        env = "GEOSHARD_CHECKPOINT",
        default_value = "yandex_geocode_checkpoint.parquet"
    )]
    pub checkpoint: PathBuf,

    /// City appended to every query.
    ///
    /// Environment variable: `GEOSHARD_CITY`
    #[arg(long, env = "GEOSHARD_CITY", default_value_t = String::from("Москва"))]
    pub city: String,

    /// Country appended to every query.
    ///
    /// Environment variable: `GEOSHARD_COUNTRY`
    #[arg(long, env = "GEOSHARD_COUNTRY", default_value_t = String::from("Россия"))]
    pub country: String,

    /// Response language tag.
    ///
    /// Environment variable: `GEOSHARD_LANG`
    #[arg(long, env = "GEOSHARD_LANG", default_value_t = String::from("ru_RU"))]
    pub lang: String,

    /// Geocoder endpoint.
    ///
    /// Environment variable: `GEOSHARD_ENDPOINT`
    #[arg(long, env = "GEOSHARD_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// Results a worker collects before handing them to the writer.
    ///
    /// Environment variable: `GEOSHARD_BATCH_SIZE`
    #[arg(long, env = "GEOSHARD_BATCH_SIZE", default_value_t = 100)]
    pub batch_size: usize,

    /// Buffered results that trigger a checkpoint write. Lower values lose
    /// less work on a crash; every write rewrites the whole checkpoint.
    ///
    /// Environment variable: `GEOSHARD_FLUSH_EVERY`
    #[arg(long, env = "GEOSHARD_FLUSH_EVERY", default_value_t = 1000)]
    pub flush_every: usize,

    /// Per-request timeout in seconds. A timed out request is recorded as
    /// unresolved.
    ///
    /// Environment variable: `GEOSHARD_REQUEST_TIMEOUT_SECS`
    #[arg(long, env = "GEOSHARD_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Bound on batches waiting for the writer. Workers wait when it is
    /// full. Unbounded when omitted.
    ///
    /// Environment variable: `GEOSHARD_QUEUE_CAPACITY`
    #[arg(long, env = "GEOSHARD_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Retry addresses that are in the checkpoint without coordinates.
    #[arg(long, default_value_t = false)]
    pub retry_unresolved: bool,

    /// Write `address,latitude,longitude` for every input address to this
    /// CSV file after the run.
    ///
    /// Environment variable: `GEOSHARD_OUTPUT`
    #[arg(long, env = "GEOSHARD_OUTPUT")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input: PathBuf,
    pub address_column: String,
    pub keys_file: Option<PathBuf>,
    pub api_keys: Vec<ApiKey>,
    pub checkpoint: PathBuf,
    pub output: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub geocoder: GeocoderConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.batch_size == 0 {
            bail!("GEOSHARD_BATCH_SIZE must be greater than 0");
        }

        if args.flush_every == 0 {
            bail!("GEOSHARD_FLUSH_EVERY must be greater than 0");
        }

        if args.request_timeout_secs == 0 {
            bail!("GEOSHARD_REQUEST_TIMEOUT_SECS must be greater than 0");
        }

        if args.queue_capacity == Some(0) {
            bail!("GEOSHARD_QUEUE_CAPACITY must be greater than 0 when set");
        }

        let api_keys: Vec<ApiKey> = args
            .api_keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .map(ApiKey::from)
            .collect();

        if api_keys.is_empty() && args.keys_file.is_none() {
            bail!("No API keys: pass --api-key, set GEOSHARD_API_KEYS or use --keys-file");
        }

        let resume_policy = if args.retry_unresolved {
            ResumePolicy::RetryUnresolved
        } else {
            ResumePolicy::SkipAttempted
        };

        Ok(Self {
            input: args.input,
            address_column: args.address_column,
            keys_file: args.keys_file,
            api_keys,
            checkpoint: args.checkpoint,
            output: args.output,
            pipeline: PipelineConfig {
                batch_size: args.batch_size,
                flush_every: args.flush_every,
                queue_capacity: args.queue_capacity,
                resume_policy,
            },
            geocoder: GeocoderConfig {
                endpoint: args.endpoint,
                city: args.city,
                country: args.country,
                lang: args.lang,
                timeout: Duration::from_secs(args.request_timeout_secs),
            },
        })
    }
}

impl AppConfig {
    /// Keys from the command line followed by keys from `--keys-file`.
    /// Worker `k` uses the `k`th key.
    pub fn load_api_keys(&self) -> anyhow::Result<Vec<ApiKey>> {
        let mut keys = self.api_keys.clone();
        if let Some(path) = &self.keys_file {
            let from_file = geoshard::input::read_api_keys(path)
                .with_context(|| format!("failed to read API keys from {}", path.display()))?;
            keys.extend(from_file);
        }

        if keys.is_empty() {
            bail!("No API keys found");
        }
        Ok(keys)
    }
}
