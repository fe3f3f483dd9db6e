use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use waypoint_core::Error;
use waypoint_services::readiness::{
    wait_for_assembly_ready, AssemblyState, BlockAssemblyClient, RetryConfig,
};

/// Block assembly that processes a few blocks between polls, the way a
/// busy node actually behaves.
struct CatchingUpAssembly {
    height: AtomicU32,
    step: u32,
}

#[async_trait]
impl BlockAssemblyClient for CatchingUpAssembly {
    async fn assembly_state(&self) -> Result<AssemblyState, Error> {
        let current_height = self.height.fetch_add(self.step, Ordering::SeqCst);
        Ok(AssemblyState { current_height })
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_succeeds_once_assembly_is_close_enough() {
    let client = CatchingUpAssembly {
        height: AtomicU32::new(980),
        step: 3,
    };

    let height = wait_for_assembly_ready(&client, 1000, 5, &RetryConfig::default())
        .await
        .unwrap();
    assert!(height + 5 >= 1000);
}

#[tokio::test(start_paused = true)]
async fn test_wait_gives_up_with_descriptive_error() {
    let client = CatchingUpAssembly {
        height: AtomicU32::new(100),
        step: 0,
    };
    let retry = RetryConfig {
        max_attempts: 6,
        ..RetryConfig::default()
    };

    let err = wait_for_assembly_ready(&client, 500, 10, &retry)
        .await
        .unwrap_err();
    match err {
        Error::ReadinessExceeded { attempts, behind } => {
            assert_eq!(attempts, 6);
            assert_eq!(behind, 400);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Dropping the wait future — here via a timeout — cancels the loop; the
/// shared client shows how many polls actually happened.
#[tokio::test(start_paused = true)]
async fn test_wait_cancellation() {
    let client = Arc::new(CatchingUpAssembly {
        height: AtomicU32::new(0),
        step: 0,
    });

    let result = tokio::time::timeout(
        std::time::Duration::from_millis(30),
        wait_for_assembly_ready(client.as_ref(), 1_000_000, 0, &RetryConfig::default()),
    )
    .await;

    assert!(result.is_err(), "timeout should cancel the wait");
    let polls = client.height.load(Ordering::SeqCst);
    assert!(polls <= 3, "loop kept polling after cancellation: {polls}");
}
