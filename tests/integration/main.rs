//! Waypoint integration tests.
//!
//! These exercise the crates together, in-process: the registry under
//! concurrent recorders, snapshot round-trips on a real filesystem, the
//! generational cache under invalidation, catchup selection, readiness
//! waits, and the JSON surfaces.

mod api;
mod cache;
mod readiness;
mod snapshot;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use waypoint_core::{ManualClock, PeerId};
use waypoint_services::PeerRegistry;

pub fn pid(s: &str) -> PeerId {
    PeerId::parse(s).unwrap()
}

/// A registry on a frozen clock, plus the clock to drive it.
pub fn frozen_registry() -> (Arc<ManualClock>, Arc<PeerRegistry>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let registry = Arc::new(PeerRegistry::with_clock(clock.clone()));
    (clock, registry)
}

/// Make `id` pass every catchup selection filter at `height`.
pub fn make_eligible(registry: &PeerRegistry, id: &PeerId, height: u32) {
    registry.update_health(id, true, std::time::Duration::from_secs(1));
    registry.update_data_hub_url(id, &format!("http://{id}.example:8090"));
    registry.update_height(id, height, "hash");
}
