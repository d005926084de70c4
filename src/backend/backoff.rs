//! Attempt-level backoff between failed model calls.
//!
//! [`BackoffConfig`] computes the wait before the next attempt as
//! `base ^ attempt` seconds. With the default `base = 0.0` every wait is zero
//! and retries are immediate. The wait itself goes through a [`Delay`]
//! strategy so tests can swap in [`NoDelay`] or [`RecordingDelay`].

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Configuration for the power backoff applied between failed attempts.
///
/// # Example
///
/// ```
/// use llm_batch::backend::BackoffConfig;
/// use std::time::Duration;
///
/// let immediate = BackoffConfig::default();
/// assert_eq!(immediate.delay_for_attempt(3), Duration::ZERO);
///
/// let doubling = BackoffConfig::new(2.0);
/// assert_eq!(doubling.delay_for_attempt(3), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Base of the power. Default: 0.0 (no waiting).
    pub base: f64,

    /// Optional ceiling on a single wait. Default: none.
    pub max_delay: Option<Duration>,

    /// Jitter strategy. Default: None, so waits are exactly `base ^ attempt`.
    pub jitter: JitterStrategy,
}

/// Jitter strategy to spread retries against a shared provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    #[default]
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl BackoffConfig {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            max_delay: None,
            jitter: JitterStrategy::None,
        }
    }

    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the wait after failed attempt N (1-based).
    ///
    /// `0.0 ^ n` is zero for every `n >= 1`. Values that do not fit in a
    /// [`Duration`] saturate to `max_delay` when set, else to `Duration::MAX`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut secs = self.base.powi(exponent);
        if !secs.is_finite() || secs < 0.0 {
            secs = f64::INFINITY;
        }

        if let Some(max) = self.max_delay {
            secs = secs.min(max.as_secs_f64());
        }

        let jittered = match self.jitter {
            JitterStrategy::None => secs,
            JitterStrategy::Full if secs.is_finite() => fastrand::f64() * secs,
            JitterStrategy::Equal if secs.is_finite() => secs / 2.0 + fastrand::f64() * (secs / 2.0),
            _ => secs,
        };

        Duration::try_from_secs_f64(jittered).unwrap_or(Duration::MAX)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// How the invoker waits between attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real waiting on the tokio timer. Zero durations return immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Skips every wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn sleep(&self, _duration: Duration) {}
}

/// Records requested waits without sleeping. For tests.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}
