//! Exponential backoff for read-only RPC calls.
//!
//! Only idempotent requests go through [`with_retry`]. Deposit transactions are never resent
//! automatically.

use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

const INITIAL_DELAY_MS: u64 = 200;
const MAX_DELAY_MS: u64 = 10_000;
const MAX_RETRIES: usize = 6;

const TRANSIENT_MARKERS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "rate limit",
    "too many requests",
    "429",
    "502",
    "503",
    "504",
    "temporarily unavailable",
    "reset by peer",
    "broken pipe",
];

/// Whether any cause in the error chain looks like a transport hiccup.
pub fn is_transient(err: &eyre::Report) -> bool {
    err.chain().any(|cause| {
        let msg = cause.to_string().to_lowercase();
        TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
    })
}

fn backoff_delay(attempt: usize) -> Duration {
    let base = INITIAL_DELAY_MS.saturating_mul(1 << attempt.min(10));
    let capped = base.min(MAX_DELAY_MS);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4);
    Duration::from_millis(capped + jitter)
}

pub async fn with_retry<F, Fut, T>(operation: &str, mut f: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = eyre::Result<T>>,
{
    let mut attempt = 0;

    loop {
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_transient(&err) {
            debug!(%operation, error = %err, "Non-transient error, giving up");
            return Err(err);
        }
        if attempt >= MAX_RETRIES {
            warn!(%operation, attempts = attempt, error = %err, "Retries exhausted");
            return Err(err);
        }

        let delay = backoff_delay(attempt);
        warn!(
            %operation,
            attempt = attempt + 1,
            max_attempts = MAX_RETRIES,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient RPC error, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
