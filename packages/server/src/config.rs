use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub nats_url: String,
    pub ai_service_url: String,
    pub chat_service_url: String,
    pub auth_service_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            ai_service_url: env::var("AI_SERVICE_URL").context("AI_SERVICE_URL must be set")?,
            chat_service_url: env::var("CHAT_SERVICE_URL")
                .context("CHAT_SERVICE_URL must be set")?,
            auth_service_url: env::var("AUTH_SERVICE_URL")
                .context("AUTH_SERVICE_URL must be set")?,
        })
    }
}

/// Tuning knobs for the matching scheduler.
///
/// These are deliberate design constants rather than env-configurable values;
/// the defaults are the committed behaviour and tests rely on them.
#[derive(Debug, Clone)]
pub struct MatchTuning {
    /// Minimum combined score for a proposal.
    pub similarity_threshold: f64,
    /// Threshold multiplier applied in relaxed (post-timeout) mode.
    pub relaxed_multiplier: f64,
    /// Bonus added once when either user's preferred MBTI matches the other's own.
    pub mbti_bonus: f64,
    /// Cap on the candidate set evaluated per proposal cycle.
    pub candidate_pool_size: usize,
    /// Users dequeued per periodic sweep tick.
    pub sweep_batch_size: usize,
    /// Attempts against the similarity service before falling back to 0.0.
    pub similarity_retries: u32,
    /// Fixed delay between similarity retries.
    pub similarity_retry_backoff: Duration,
    /// How long a proposed pair may take to both accept.
    pub accept_window: Duration,
    /// Delay before the MATCH_SUCCESS notification, so clients can subscribe.
    pub proposal_notify_delay: Duration,
    /// Periodic sweep interval.
    pub sweep_interval: Duration,
    /// Waiting-pool garbage collection interval.
    pub gc_interval: Duration,
    /// Waiting time after which relaxed matching and timeout options kick in.
    pub wait_timeout: Duration,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            relaxed_multiplier: 0.8,
            mbti_bonus: 0.3,
            candidate_pool_size: 50,
            sweep_batch_size: 50,
            similarity_retries: 3,
            similarity_retry_backoff: Duration::from_secs(1),
            accept_window: Duration::from_secs(60),
            proposal_notify_delay: Duration::from_secs(3),
            sweep_interval: Duration::from_secs(5),
            gc_interval: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(300),
        }
    }
}
