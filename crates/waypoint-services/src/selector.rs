//! Catchup peer selection.
//!
//! A read-only filter and sort over the registry. The order is total —
//! score, then success rate, then most recent success, then peer id — so
//! two calls with no intervening state change return identical sequences.

use std::cmp::Ordering;

use crate::record::PeerRecord;
use crate::registry::PeerRegistry;

/// Peers eligible to serve a catchup to `target_height`, best first.
///
/// Banned, unhealthy, and URL-less peers are excluded, as are peers whose
/// advertised height is below the target. No eligible peers is an empty
/// list, not an error.
pub fn peers_for_catchup(registry: &PeerRegistry, target_height: u32) -> Vec<PeerRecord> {
    let mut peers: Vec<PeerRecord> = registry
        .get_all_peers()
        .into_iter()
        .filter(|p| {
            !p.is_banned && p.is_healthy && !p.data_hub_url.is_empty() && p.height >= target_height
        })
        .collect();
    peers.sort_by(compare);
    peers
}

/// The single best peer to fetch a block at `target_height` from.
pub fn best_peer_for_block(registry: &PeerRegistry, target_height: u32) -> Option<PeerRecord> {
    peers_for_catchup(registry, target_height).into_iter().next()
}

fn compare(a: &PeerRecord, b: &PeerRecord) -> Ordering {
    b.reputation_score
        .total_cmp(&a.reputation_score)
        .then_with(|| b.success_rate().total_cmp(&a.success_rate()))
        // Option ordering puts None first, so b-vs-a ranks the more
        // recent success ahead and never-succeeded last
        .then_with(|| b.last_success.cmp(&a.last_success))
        .then_with(|| a.id.cmp(&b.id))
}
