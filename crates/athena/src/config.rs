use std::env;

use serde::{Deserialize, Serialize};

// ── Env helpers (mirrors core/config.rs, kept local to avoid the dependency) ──

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
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

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── AthenaConfig ─────────────────────────────────────────────────

/// Configuration for the partition catalog.
///
/// When `MARKETFEED_PROFILE=PROD`, checks `PROD_STACK_NAME` before `STACK_NAME`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// AWS region for Athena statements.
    pub region: String,
    /// Athena workgroup.
    pub workgroup: String,
    /// Deployment stack; names the completion-marker bucket.
    pub stack_name: String,
    /// Base database name, hyphens already replaced by underscores.
    pub database_name: String,
    /// Statement timeout in seconds when waiting for completion.
    pub timeout_seconds: u32,
    /// Poll statements to a terminal state instead of fire-and-forget.
    pub wait_for_completion: bool,
}

impl AthenaConfig {
    /// Build config from environment variables.
    ///
    /// `ATHENA_REGION` falls back to `AWS_REGION` before using the default.
    pub fn from_env() -> Self {
        let profile = env_opt("MARKETFEED_PROFILE")
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        Self::from_env_profiled(&profile)
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        let region = profiled_env_opt(profile, "ATHENA_REGION")
            .or_else(|| profiled_env_opt(profile, "AWS_REGION"))
            .unwrap_or_else(|| "ap-southeast-2".to_string());

        Self {
            region,
            workgroup: profiled_env_or(profile, "ATHENA_WORKGROUP", "primary"),
            stack_name: profiled_env_or(profile, "STACK_NAME", "test"),
            database_name: profiled_env_or(profile, "DATABASE_NAME", "precis-forecast")
                .replace('-', "_"),
            timeout_seconds: profiled_env_u32(profile, "ATHENA_TIMEOUT_SECONDS", 300),
            wait_for_completion: profiled_env_bool(profile, "ATHENA_WAIT", true),
        }
    }

    /// Bucket holding completion markers for this stack.
    pub fn marker_bucket(&self) -> String {
        format!("precis-forecast.{}", self.stack_name)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_athena_env() {
        let keys = [
            "MARKETFEED_PROFILE",
            "ATHENA_REGION",
            "ATHENA_WORKGROUP",
            "ATHENA_TIMEOUT_SECONDS",
            "ATHENA_WAIT",
            "AWS_REGION",
            "STACK_NAME",
            "DATABASE_NAME",
            "PROD_STACK_NAME",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_athena_env();

        let cfg = AthenaConfig::from_env_profiled("");

        assert_eq!(cfg.region, "ap-southeast-2");
        assert_eq!(cfg.workgroup, "primary");
        assert_eq!(cfg.timeout_seconds, 300);
        assert!(cfg.wait_for_completion);
        assert_eq!(cfg.marker_bucket(), "precis-forecast.test");
    }

    #[test]
    fn database_name_hyphens_become_underscores() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_athena_env();

        env::set_var("DATABASE_NAME", "market-data-prod");
        let cfg = AthenaConfig::from_env_profiled("");
        assert_eq!(cfg.database_name, "market_data_prod");

        clear_athena_env();
    }

    #[test]
    fn region_falls_back_to_aws_region() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_athena_env();

        env::set_var("AWS_REGION", "us-west-2");
        assert_eq!(AthenaConfig::from_env_profiled("").region, "us-west-2");

        env::set_var("ATHENA_REGION", "eu-west-1");
        assert_eq!(AthenaConfig::from_env_profiled("").region, "eu-west-1");

        clear_athena_env();
    }

    #[test]
    fn profiled_stack_name() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_athena_env();

        env::set_var("STACK_NAME", "staging");
        env::set_var("PROD_STACK_NAME", "prod");
        assert_eq!(AthenaConfig::from_env_profiled("PROD").marker_bucket(), "precis-forecast.prod");
        assert_eq!(AthenaConfig::from_env_profiled("").marker_bucket(), "precis-forecast.staging");

        clear_athena_env();
    }

    #[test]
    fn wait_can_be_disabled() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_athena_env();

        env::set_var("ATHENA_WAIT", "false");
        assert!(!AthenaConfig::from_env_profiled("").wait_for_completion);

        clear_athena_env();
    }
}
