use std::future::Future;
use std::time::Duration;

use shadowlend_config::GatewayConfig;

/// Interval and attempt bound of one waiting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// 2 s, 60 attempts
    pub fn pickup(config: &GatewayConfig) -> Self {
        Self::new(config.pickup_interval(), config.pickup_attempts)
    }

    /// 1 s, 90 attempts
    pub fn callback(config: &GatewayConfig) -> Self {
        Self::new(config.callback_interval(), config.callback_attempts)
    }
}

/// Run `probe` until it yields a value or the attempt bound is spent.
///
/// Returns `Ok(None)` on exhaustion. Errors from `probe` stop the loop and
/// are returned as-is.
pub async fn poll<T, E, F, Fut>(policy: PollPolicy, stage: &str, mut probe: F) -> Result<Option<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = probe(attempt).await? {
            log::debug!("{stage}: ready after {attempt} attempt(s)");
            return Ok(Some(value));
        }
        log::debug!("{stage}: attempt {attempt}/{} not ready", policy.max_attempts);
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Ok(None)
}
