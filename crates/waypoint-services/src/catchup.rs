//! Catchup progress tracking.
//!
//! Block validation drives this while it works through a run of blocks;
//! the HTTP surface reads it. One catchup at a time — a node doesn't
//! chase two targets at once — and the last failed attempt is kept for
//! the operator to see.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use waypoint_core::{Clock, SystemClock};

/// Where a catchup is headed, as handed to [`CatchupTracker::begin`].
#[derive(Debug, Clone, Default)]
pub struct CatchupTarget {
    pub peer_id: String,
    pub peer_url: String,
    pub block_hash: String,
    pub height: u32,
    pub fork_depth: u32,
    pub common_ancestor_hash: String,
    pub common_ancestor_height: u32,
}

/// A finished (failed) attempt, kept for the status report.
#[derive(Debug, Clone, Serialize)]
pub struct CatchupAttempt {
    pub peer_id: String,
    pub peer_url: String,
    pub target_block_hash: String,
    pub target_block_height: u32,
    pub error_message: String,
    pub error_type: String,
    pub attempt_time: i64,
    pub duration_ms: i64,
    pub blocks_validated: u64,
}

/// Point-in-time progress report.
#[derive(Debug, Clone, Serialize)]
pub struct CatchupStatus {
    pub is_catching_up: bool,
    pub peer_id: String,
    pub peer_url: String,
    pub target_block_hash: String,
    pub target_block_height: u32,
    pub current_height: u32,
    pub total_blocks: u64,
    pub blocks_fetched: u64,
    pub blocks_validated: u64,
    pub start_time: i64,
    pub duration_ms: i64,
    pub fork_depth: u32,
    pub common_ancestor_hash: String,
    pub common_ancestor_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_attempt: Option<CatchupAttempt>,
}

#[derive(Debug, Clone)]
struct ActiveCatchup {
    target: CatchupTarget,
    current_height: u32,
    total_blocks: u64,
    blocks_fetched: u64,
    blocks_validated: u64,
    started_at: DateTime<Utc>,
}

#[derive(Default)]
struct TrackerState {
    active: Option<ActiveCatchup>,
    previous: Option<CatchupAttempt>,
}

/// Shared catchup progress state.
pub struct CatchupTracker {
    state: RwLock<TrackerState>,
    clock: Arc<dyn Clock>,
}

impl Default for CatchupTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CatchupTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            clock,
        }
    }

    fn lock(&self) -> std::sync::RwLockWriteGuard<'_, TrackerState> {
        self.state.write().expect("catchup tracker lock poisoned")
    }

    /// Start tracking a catchup toward `target`. Replaces any active one.
    pub fn begin(&self, target: CatchupTarget) {
        let started_at = self.clock.now();
        tracing::info!(
            peer = %target.peer_id,
            target_height = target.height,
            "catchup started"
        );
        self.lock().active = Some(ActiveCatchup {
            target,
            current_height: 0,
            total_blocks: 0,
            blocks_fetched: 0,
            blocks_validated: 0,
            started_at,
        });
    }

    pub fn set_total_blocks(&self, total: u64) {
        if let Some(active) = self.lock().active.as_mut() {
            active.total_blocks = total;
        }
    }

    pub fn set_current_height(&self, height: u32) {
        if let Some(active) = self.lock().active.as_mut() {
            active.current_height = height;
        }
    }

    pub fn note_block_fetched(&self) {
        if let Some(active) = self.lock().active.as_mut() {
            active.blocks_fetched += 1;
        }
    }

    pub fn note_block_validated(&self) {
        if let Some(active) = self.lock().active.as_mut() {
            active.blocks_validated += 1;
        }
    }

    /// The catchup reached its target; the tracker goes idle.
    pub fn finish_success(&self) {
        let mut state = self.lock();
        if let Some(active) = state.active.take() {
            tracing::info!(
                peer = %active.target.peer_id,
                blocks_validated = active.blocks_validated,
                "catchup finished"
            );
            // A success clears any remembered failure
            state.previous = None;
        }
    }

    /// The catchup failed; remember it as the previous attempt.
    pub fn finish_failure(&self, error_type: &str, error_message: &str) {
        let now = self.clock.now();
        let mut state = self.lock();
        if let Some(active) = state.active.take() {
            tracing::warn!(
                peer = %active.target.peer_id,
                error_type,
                error_message,
                "catchup failed"
            );
            state.previous = Some(CatchupAttempt {
                peer_id: active.target.peer_id,
                peer_url: active.target.peer_url,
                target_block_hash: active.target.block_hash,
                target_block_height: active.target.height,
                error_message: error_message.to_owned(),
                error_type: error_type.to_owned(),
                attempt_time: active.started_at.timestamp(),
                duration_ms: (now - active.started_at).num_milliseconds(),
                blocks_validated: active.blocks_validated,
            });
        }
    }

    /// Current progress, or an idle report when nothing is running.
    pub fn status(&self) -> CatchupStatus {
        let now = self.clock.now();
        let state = self.state.read().expect("catchup tracker lock poisoned");

        match &state.active {
            Some(active) => CatchupStatus {
                is_catching_up: true,
                peer_id: active.target.peer_id.clone(),
                peer_url: active.target.peer_url.clone(),
                target_block_hash: active.target.block_hash.clone(),
                target_block_height: active.target.height,
                current_height: active.current_height,
                total_blocks: active.total_blocks,
                blocks_fetched: active.blocks_fetched,
                blocks_validated: active.blocks_validated,
                start_time: active.started_at.timestamp(),
                duration_ms: (now - active.started_at).num_milliseconds(),
                fork_depth: active.target.fork_depth,
                common_ancestor_hash: active.target.common_ancestor_hash.clone(),
                common_ancestor_height: active.target.common_ancestor_height,
                previous_attempt: state.previous.clone(),
            },
            None => CatchupStatus {
                is_catching_up: false,
                peer_id: String::new(),
                peer_url: String::new(),
                target_block_hash: String::new(),
                target_block_height: 0,
                current_height: 0,
                total_blocks: 0,
                blocks_fetched: 0,
                blocks_validated: 0,
                start_time: 0,
                duration_ms: 0,
                fork_depth: 0,
                common_ancestor_hash: String::new(),
                common_ancestor_height: 0,
                previous_attempt: state.previous.clone(),
            },
        }
    }
}
