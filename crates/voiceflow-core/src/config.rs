use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

/// Process configuration, resolved once at startup from `VOICEFLOW_*`
/// environment variables and passed into each component as an explicit
/// handle, no ambient globals.
pub struct Config {
    /// SQLite file shared by the gateway, dispatchers, and cleanup scanner.
    pub db_path: PathBuf,
    /// Root directory of the filesystem object store.
    pub blob_root: PathBuf,
    pub port: u16,
    pub stt_url: String,
    pub tts_url: String,
    /// Per-request timeout for backend invocations.
    pub request_timeout: Duration,
    /// How long an idle worker sleeps before re-checking the queue.
    pub idle_poll_interval: Duration,
    /// TTL on cleanup records; artifacts are deleted after this elapses.
    pub cleanup_ttl: Duration,
    pub cleanup_scan_interval: Duration,
    /// Retry budget: total delivery attempts per job.
    pub max_attempts: u32,
    /// Delay before a retryable failure is redelivered.
    pub retry_delay: Duration,
    pub workers: usize,
    /// Queue lease; an expired lease makes the item claimable again.
    pub queue_lease: Duration,
    pub signing_secret: SecretString,
    /// Validity window of signed artifact URLs, measured from issuance.
    pub url_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("voiceflow.db"),
            blob_root: PathBuf::from("blobs"),
            port: 8080,
            stt_url: "http://stt-service:8000/v1/transcribe".into(),
            tts_url: "http://tts-service:8000/v1/synthesize".into(),
            request_timeout: Duration::from_secs(120),
            idle_poll_interval: Duration::from_millis(500),
            cleanup_ttl: Duration::from_secs(3600),
            cleanup_scan_interval: Duration::from_secs(30),
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            workers: 4,
            queue_lease: Duration::from_secs(600),
            signing_secret: SecretString::from("dev-secret-change-me".to_string()),
            url_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env_or("VOICEFLOW_DB_PATH", defaults.db_path),
            blob_root: env_or("VOICEFLOW_BLOB_ROOT", defaults.blob_root),
            port: env_or("VOICEFLOW_PORT", defaults.port),
            stt_url: env_or("VOICEFLOW_STT_URL", defaults.stt_url),
            tts_url: env_or("VOICEFLOW_TTS_URL", defaults.tts_url),
            request_timeout: env_secs("VOICEFLOW_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            idle_poll_interval: env_millis("VOICEFLOW_POLL_INTERVAL_MS", defaults.idle_poll_interval),
            cleanup_ttl: env_secs("VOICEFLOW_CLEANUP_TTL_SECS", defaults.cleanup_ttl),
            cleanup_scan_interval: env_secs(
                "VOICEFLOW_CLEANUP_SCAN_INTERVAL_SECS",
                defaults.cleanup_scan_interval,
            ),
            max_attempts: env_or("VOICEFLOW_MAX_ATTEMPTS", defaults.max_attempts),
            retry_delay: env_secs("VOICEFLOW_RETRY_DELAY_SECS", defaults.retry_delay),
            workers: env_or("VOICEFLOW_WORKERS", defaults.workers),
            queue_lease: env_secs("VOICEFLOW_QUEUE_LEASE_SECS", defaults.queue_lease),
            signing_secret: std::env::var("VOICEFLOW_SIGNING_SECRET")
                .map(SecretString::from)
                .unwrap_or(defaults.signing_secret),
            url_ttl: env_secs("VOICEFLOW_URL_TTL_SECS", defaults.url_ttl),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.cleanup_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.url_ttl, Duration::from_secs(900));
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("VOICEFLOW_TEST_PORT_OVERRIDE", "9999");
        let port: u16 = env_or("VOICEFLOW_TEST_PORT_OVERRIDE", 8080);
        assert_eq!(port, 9999);
        std::env::remove_var("VOICEFLOW_TEST_PORT_OVERRIDE");
    }

    #[test]
    fn unparseable_env_falls_back_to_default() {
        std::env::set_var("VOICEFLOW_TEST_BAD_SECS", "not-a-number");
        let timeout = env_secs("VOICEFLOW_TEST_BAD_SECS", Duration::from_secs(120));
        assert_eq!(timeout, Duration::from_secs(120));
        std::env::remove_var("VOICEFLOW_TEST_BAD_SECS");
    }

    #[test]
    fn missing_env_uses_default() {
        let workers: usize = env_or("VOICEFLOW_TEST_MISSING_KEY", 4);
        assert_eq!(workers, 4);
    }
}
