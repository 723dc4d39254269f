//! Structured logging with tracing
//!
//! Configurable compact or JSON output, plus a slow query log that backends
//! feed with the native queries they run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Number of slow queries kept for reporting
const SLOW_QUERY_HISTORY: usize = 1000;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,

    /// Enable JSON format output
    pub json_format: bool,

    /// Enable slow query logging
    pub slow_query_logging: bool,

    /// Slow query threshold in milliseconds
    pub slow_query_threshold_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
            slow_query_logging: true,
            slow_query_threshold_ms: 100,
        }
    }
}

impl LoggingConfig {
    /// Parse log level from string
    pub fn parse_level(&self) -> Level {
        match self.level.to_uppercase().as_str() {
            "ERROR" => Level::ERROR,
            "WARN" => Level::WARN,
            "INFO" => Level::INFO,
            "DEBUG" => Level::DEBUG,
            "TRACE" => Level::TRACE,
            _ => Level::INFO,
        }
    }

    /// Slow query logger configured from this section
    pub fn slow_query_logger(&self) -> SlowQueryLogger {
        SlowQueryLogger::new(
            Duration::from_millis(self.slow_query_threshold_ms),
            self.slow_query_logging,
        )
    }
}

/// Install the global subscriber and build the slow query logger.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<SlowQueryLogger> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.parse_level().as_str()));

    let subscriber = Registry::default().with(env_filter);

    if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true);

        subscriber.with(json_layer).try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact();

        subscriber.with(fmt_layer).try_init()?;
    }

    tracing::info!(
        "Logging initialized: level={}, json={}, slow_queries={}",
        config.level,
        config.json_format,
        config.slow_query_logging
    );

    Ok(config.slow_query_logger())
}

/// Slow query logger
///
/// Clones share the same history.
#[derive(Debug, Clone)]
pub struct SlowQueryLogger {
    threshold: Duration,
    enabled: bool,
    queries: Arc<RwLock<Vec<SlowQuery>>>,
}

/// Slow query record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQuery {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub query: String,
    pub region: Option<String>,
    pub variables: usize,
}

/// Query execution tracker
#[derive(Debug)]
pub struct QueryTracker {
    start_time: Instant,
    query: String,
    region: Option<String>,
    variables: usize,
}

impl SlowQueryLogger {
    pub fn new(threshold: Duration, enabled: bool) -> Self {
        Self {
            threshold,
            enabled,
            queries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Logger that records nothing
    pub fn disabled() -> Self {
        Self::new(Duration::MAX, false)
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Start tracking a query
    pub fn start_query(
        &self,
        query: impl Into<String>,
        region: Option<String>,
        variables: usize,
    ) -> QueryTracker {
        QueryTracker {
            start_time: Instant::now(),
            query: query.into(),
            region,
            variables,
        }
    }

    /// Finish tracking a query and log if slow
    pub fn finish_query(&self, tracker: QueryTracker) {
        if !self.enabled {
            return;
        }

        let duration = tracker.start_time.elapsed();
        if duration < self.threshold {
            return;
        }

        let slow_query = SlowQuery {
            timestamp: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            query: tracker.query,
            region: tracker.region,
            variables: tracker.variables,
        };

        tracing::warn!(
            target: "slow_query",
            duration_ms = slow_query.duration_ms,
            query = %slow_query.query,
            region = ?slow_query.region,
            variables = slow_query.variables,
            "Slow query detected"
        );

        let mut queries = self.queries.write();
        queries.push(slow_query);

        if queries.len() > SLOW_QUERY_HISTORY {
            let len = queries.len();
            queries.drain(0..len - SLOW_QUERY_HISTORY);
        }
    }

    /// Most recent slow queries, newest first
    pub fn get_slow_queries(&self, limit: usize) -> Vec<SlowQuery> {
        let queries = self.queries.read();
        queries.iter().rev().take(limit).cloned().collect()
    }

    /// Get slow query statistics
    pub fn get_stats(&self) -> SlowQueryStats {
        let queries = self.queries.read();
        let threshold_ms = self.threshold.as_millis().min(u64::MAX as u128) as u64;

        if queries.is_empty() {
            return SlowQueryStats {
                threshold_ms,
                ..SlowQueryStats::default()
            };
        }

        let total_count = queries.len();
        let total_duration: u64 = queries.iter().map(|q| q.duration_ms).sum();
        let max_duration = queries.iter().map(|q| q.duration_ms).max().unwrap_or(0);

        SlowQueryStats {
            total_count,
            avg_duration_ms: total_duration / total_count as u64,
            max_duration_ms: max_duration,
            threshold_ms,
        }
    }
}

/// Slow query statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlowQueryStats {
    pub total_count: usize,
    pub avg_duration_ms: u64,
    pub max_duration_ms: u64,
    pub threshold_ms: u64,
}
