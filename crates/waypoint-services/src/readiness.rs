//! Block-assembly readiness gating.
//!
//! Validating a block at height H only makes sense once block assembly is
//! within a bounded distance of H — otherwise coinbase maturity checks
//! fire against state that simply hasn't caught up yet. The wait loop
//! polls the assembly service with geometric backoff until it is close
//! enough or the retry budget runs out.
//!
//! Cancellation is the caller's: wrap the future in a timeout or a
//! select, and dropping it stops the loop immediately.

use std::time::Duration;

use async_trait::async_trait;
use waypoint_core::Error;

/// Snapshot of block assembly state, as reported by the assembly service.
#[derive(Debug, Clone)]
pub struct AssemblyState {
    pub current_height: u32,
}

#[async_trait]
pub trait BlockAssemblyClient: Send + Sync {
    async fn assembly_state(&self) -> Result<AssemblyState, Error>;
}

/// Retry schedule for readiness polling.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 45,
            initial_backoff: Duration::from_millis(20),
            backoff_multiplier: 4,
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Wait until assembly height + `max_behind` reaches `target_height`.
///
/// Returns the observed assembly height on success. Exhausting the retry
/// budget yields [`Error::ReadinessExceeded`] carrying the last observed
/// lag. Transient client errors count against the budget but don't end
/// the wait.
pub async fn wait_for_assembly_ready(
    client: &dyn BlockAssemblyClient,
    target_height: u32,
    max_behind: u32,
    retry: &RetryConfig,
) -> Result<u32, Error> {
    let mut backoff = retry.initial_backoff;
    let mut last_behind = u64::from(target_height);

    for attempt in 1..=retry.max_attempts {
        match client.assembly_state().await {
            Ok(state) => {
                if u64::from(state.current_height) + u64::from(max_behind)
                    >= u64::from(target_height)
                {
                    return Ok(state.current_height);
                }
                last_behind = u64::from(target_height) - u64::from(state.current_height);
                tracing::debug!(
                    attempt,
                    target_height,
                    assembly_height = state.current_height,
                    "block assembly behind, waiting"
                );
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "block assembly state unavailable, retrying");
            }
        }

        if attempt < retry.max_attempts {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * retry.backoff_multiplier).min(retry.max_backoff);
        }
    }

    Err(Error::ReadinessExceeded {
        attempts: retry.max_attempts,
        behind: last_behind,
    })
}
