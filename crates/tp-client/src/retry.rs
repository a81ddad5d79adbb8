//! Caller-level retry for whole session lifecycles
//!
//! Nothing below this layer retries: a decode error or a dropped connection
//! fails the current attempt. The caller reconnects by running the whole
//! closure again.

use tp_core::config::BackoffConfig;
use tp_core::TpError;

use crate::backoff::ExponentialBackoff;

/// Run `op` up to `attempts` times, sleeping with exponential backoff between
/// failures. `op` receives the 1-based attempt number.
pub fn run_with_retry<T, F>(attempts: u32, backoff: &BackoffConfig, mut op: F) -> Result<T, TpError>
where
    F: FnMut(u32) -> Result<T, TpError>,
{
    let attempts = attempts.max(1);
    let mut backoff = ExponentialBackoff::from_config(backoff);
    let mut attempt = 1;

    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!("Giving up after {} attempts: {}", attempt, e);
                return Err(e);
            }
        }
    }
}
