use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub aws: AwsConfig,
    pub queue: QueueConfig,
    pub registry: RegistryConfig,
    pub landing: LandingConfig,
    pub harvest: HarvestConfig,
    pub alert: AlertConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MARKETFEED_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MARKETFEED_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let aws = AwsConfig::from_env_profiled(p);
        let landing = LandingConfig::from_env_profiled(p);
        Self {
            profile: p.to_string(),
            queue: QueueConfig::from_env_profiled(p, &aws.region),
            registry: RegistryConfig::from_env_profiled(p, &landing.bucket),
            harvest: HarvestConfig::from_env_profiled(p),
            alert: AlertConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            aws,
            landing,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  aws:       region={}, static_credentials={}", self.aws.region, self.aws.has_static_credentials());
        tracing::info!("  queue:     url={}, batch_size={}", self.queue.queue_url, self.queue.batch_size);
        tracing::info!("  registry:  s3://{}/{} -> s3://{}/{}", self.registry.source_bucket, self.registry.source_key, self.registry.writeback_bucket, self.registry.writeback_key());
        tracing::info!("  landing:   s3://{}/{}/, staging={}", self.landing.bucket, self.landing.root, self.landing.staging_dir.display());
        tracing::info!("  harvest:   interval={}, schedule={}", self.harvest.interval, self.harvest.schedule.as_deref().unwrap_or("(once)"));
        tracing::info!("  alert:     topic={}, webhook={}", self.alert.topic_arn.as_deref().unwrap_or("(none)"), self.alert.webhook_url.is_some());
        tracing::info!("  storage:   backend={:?}", self.storage.backend);
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub account_id: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "ap-southeast-2"),
            account_id: profiled_env_opt(p, "AWS_ACCOUNT_ID"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// Endpoint override with a scheme, if one is configured.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint_url
            .as_deref()
            .filter(|e| !e.is_empty())
            .map(|e| {
                if e.starts_with("http://") || e.starts_with("https://") {
                    e.to_string()
                } else {
                    format!("https://{e}")
                }
            })
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_url: String,
    /// Long-poll wait per receive call; 0 = short poll.
    pub wait_time_secs: u32,
    pub visibility_timeout_secs: u32,
    /// Receive calls per fetch-worker invocation.
    pub batch_size: u32,
}

impl QueueConfig {
    fn from_env_profiled(p: &str, region: &str) -> Self {
        let queue_url = profiled_env_opt(p, "QUEUE_URL").unwrap_or_else(|| {
            let name = profiled_env_or(p, "QUEUE_NAME", "marketfeed-jobs");
            let account = profiled_env_or(p, "AWS_ACCOUNT_ID", "000000000000");
            sqs_queue_url(region, &account, &name)
        });
        Self {
            queue_url,
            wait_time_secs: profiled_env_u32(p, "QUEUE_WAIT_TIME_SECS", 0),
            visibility_timeout_secs: profiled_env_u32(p, "QUEUE_VISIBILITY_TIMEOUT_SECS", 300),
            batch_size: profiled_env_u32(p, "FETCH_BATCH_SIZE", 5),
        }
    }
}

/// Standard SQS queue URL for a queue name.
pub fn sqs_queue_url(region: &str, account_id: &str, queue_name: &str) -> String {
    format!("https://sqs.{region}.amazonaws.com/{account_id}/{queue_name}")
}

// ── Source registry ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub source_bucket: String,
    pub source_key: String,
    /// Bucket the corrected registry is written to.
    pub writeback_bucket: String,
}

impl RegistryConfig {
    fn from_env_profiled(p: &str, landing_bucket: &str) -> Self {
        Self {
            source_bucket: profiled_env_or(p, "SOURCE_BUCKET", "marketfeed-sources"),
            source_key: profiled_env_or(p, "SOURCE_KEY", "sources.csv"),
            writeback_bucket: profiled_env_or(p, "REGISTRY_WRITEBACK_BUCKET", landing_bucket),
        }
    }

    /// Corrections always land under `ttt/<source_key>`.
    pub fn writeback_key(&self) -> String {
        format!("ttt/{}", self.source_key)
    }
}

// ── Landing area ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandingConfig {
    pub bucket: String,
    /// Key root that mode prefixes hang off (`POC/LINK/...`).
    pub root: String,
    pub staging_dir: PathBuf,
}

impl LandingConfig {
    fn from_env_profiled(p: &str) -> Self {
        let staging_dir = profiled_env_opt(p, "STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        Self {
            bucket: profiled_env_or(p, "LANDING_BUCKET", "dex.test"),
            root: profiled_env_or(p, "LANDING_ROOT", "POC"),
            staging_dir,
        }
    }
}

// ── Harvest ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Interval tag this harvester serves (matches registry column 2).
    pub interval: String,
    /// Optional cron expression for long-running mode.
    pub schedule: Option<String>,
}

impl HarvestConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            interval: profiled_env_or(p, "HARVEST_INTERVAL", "daily"),
            schedule: profiled_env_opt(p, "HARVEST_SCHEDULE"),
        }
    }

    /// A command-line schedule wins over the configured one.
    pub fn schedule_or(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.schedule.clone())
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub topic_arn: Option<String>,
    pub subject: String,
    pub webhook_url: Option<String>,
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            topic_arn: profiled_env_opt(p, "ALERT_TOPIC_ARN"),
            subject: profiled_env_or(p, "ALERT_SUBJECT", "Error from Marketdata Downloader!"),
            webhook_url: profiled_env_opt(p, "ALERT_WEBHOOK_URL"),
        }
    }
}

// ── Storage backend ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    S3,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root directory for the local backend; one subdirectory per bucket.
    pub local_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let backend = match profiled_env_or(p, "STORAGE_BACKEND", "s3").to_lowercase().as_str() {
            "local" => StorageBackendKind::Local,
            _ => StorageBackendKind::S3,
        };
        Self {
            backend,
            local_dir: PathBuf::from(profiled_env_or(p, "LOCAL_STORAGE_DIR", "data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for k in [
            "MARKETFEED_PROFILE",
            "QUEUE_URL",
            "QUEUE_NAME",
            "AWS_ACCOUNT_ID",
            "AWS_REGION",
            "LANDING_BUCKET",
            "REGISTRY_WRITEBACK_BUCKET",
            "SOURCE_KEY",
            "HARVEST_INTERVAL",
            "PROD_HARVEST_INTERVAL",
            "HARVEST_SCHEDULE",
            "PROD_HARVEST_SCHEDULE",
            "STORAGE_BACKEND",
            "FETCH_BATCH_SIZE",
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_match_production_deployment() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let cfg = Config::for_profile("");
        assert_eq!(cfg.aws.region, "ap-southeast-2");
        assert_eq!(cfg.landing.bucket, "dex.test");
        assert_eq!(cfg.landing.root, "POC");
        assert_eq!(cfg.queue.batch_size, 5);
        assert_eq!(cfg.queue.wait_time_secs, 0);
        assert_eq!(cfg.registry.writeback_bucket, "dex.test");
        assert_eq!(cfg.storage.backend, StorageBackendKind::S3);
    }

    #[test]
    fn queue_url_derived_from_name() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("QUEUE_NAME", "harvest-jobs");
        env::set_var("AWS_ACCOUNT_ID", "123456789012");

        let cfg = Config::for_profile("");
        assert_eq!(
            cfg.queue.queue_url,
            "https://sqs.ap-southeast-2.amazonaws.com/123456789012/harvest-jobs"
        );
        clear_env();
    }

    #[test]
    fn explicit_queue_url_wins() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("QUEUE_URL", "http://localhost:4566/000000000000/q");
        env::set_var("QUEUE_NAME", "ignored");

        let cfg = Config::for_profile("");
        assert_eq!(cfg.queue.queue_url, "http://localhost:4566/000000000000/q");
        clear_env();
    }

    #[test]
    fn profile_prefix_takes_precedence() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("HARVEST_INTERVAL", "daily");
        env::set_var("PROD_HARVEST_INTERVAL", "5min");

        assert_eq!(Config::for_profile("prod").harvest.interval, "5min");
        assert_eq!(Config::for_profile("").harvest.interval, "daily");
        clear_env();
    }

    #[test]
    fn profiled_schedule_is_used_without_flag() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("PROD_HARVEST_SCHEDULE", "*/5 * * * *");

        let prod = Config::for_profile("prod").harvest;
        assert_eq!(prod.schedule_or(None).as_deref(), Some("*/5 * * * *"));
        assert_eq!(
            prod.schedule_or(Some("0 6 * * *".into())).as_deref(),
            Some("0 6 * * *")
        );
        assert_eq!(Config::for_profile("").harvest.schedule_or(None), None);
        clear_env();
    }

    #[test]
    fn writeback_key_lives_under_ttt() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("SOURCE_KEY", "market_sources.csv");

        let cfg = Config::for_profile("");
        assert_eq!(cfg.registry.writeback_key(), "ttt/market_sources.csv");
        clear_env();
    }

    #[test]
    fn endpoint_gets_scheme() {
        let aws = AwsConfig {
            region: "ap-southeast-2".into(),
            account_id: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            endpoint_url: Some("localhost:4566".into()),
        };
        assert_eq!(aws.endpoint().as_deref(), Some("https://localhost:4566"));
    }
}
