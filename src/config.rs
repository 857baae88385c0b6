//! Run configuration passed explicitly through the out step

use crate::{request::Source, retry::RetryPolicy};
use std::{env, time::Duration};

/// Override of [RetryPolicy::max_attempts]
pub const RETRY_ATTEMPTS_ENV: &str = "IMGPUSH_RETRY_ATTEMPTS";
/// Override of [RetryPolicy::initial_delay] in milliseconds
pub const RETRY_DELAY_ENV: &str = "IMGPUSH_RETRY_DELAY_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Verbosity of log written to stderr
    pub log_level: log::LevelFilter,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: log::LevelFilter::Info,
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_source(source: &Source) -> Self {
        let mut settings = Settings::default();
        if source.debug {
            settings.log_level = log::LevelFilter::Debug;
        }
        settings.retry = retry_from_env(settings.retry, |key| env::var(key).ok());
        settings
    }
}

fn retry_from_env(mut retry: RetryPolicy, var: impl Fn(&str) -> Option<String>) -> RetryPolicy {
    if let Some(attempts) = var(RETRY_ATTEMPTS_ENV).and_then(|v| v.parse::<u32>().ok()) {
        retry.max_attempts = attempts.max(1);
    }
    if let Some(delay) = var(RETRY_DELAY_ENV).and_then(|v| v.parse::<u64>().ok()) {
        retry.initial_delay = Duration::from_millis(delay);
    }
    retry
}
