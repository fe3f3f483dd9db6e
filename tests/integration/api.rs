use crate::*;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use waypoint_api::handlers::{
    handle_catchup_status, handle_peers, handle_reset_reputation, ResetReputationRequest,
};
use waypoint_api::ApiState;
use waypoint_services::{CatchupTarget, CatchupTracker, PeerService};

fn full_state() -> (ApiState, Arc<waypoint_services::PeerRegistry>) {
    let (_clock, registry) = frozen_registry();
    let state = ApiState {
        registry: Some(registry.clone()),
        reputation: Some(Arc::new(PeerService::new(registry.clone()))),
        catchup: Some(Arc::new(CatchupTracker::new())),
    };
    (state, registry)
}

#[tokio::test]
async fn test_peers_endpoint_lists_connected_peers() {
    let (state, registry) = full_state();

    let connected = pid("peer-connected");
    registry.set_connected(&connected, true, chrono::Utc::now());
    registry.record_attempt(&connected);
    registry.record_success(&connected, Duration::from_millis(100));

    let offline = pid("peer-offline");
    registry.add_peer(&offline);

    let Json(response) = handle_peers(State(state)).await;
    assert_eq!(response.count, 1);
    assert_eq!(response.peers.len(), 1);

    // The wire shape: snake_case keys, Unix-second timestamps, ms durations
    let value = serde_json::to_value(&response.peers[0]).unwrap();
    assert_eq!(value["id"], "peer-connected");
    assert_eq!(value["catchup_attempts"], 1);
    assert_eq!(value["catchup_avg_response_ms"], 100);
    assert!(value["catchup_last_success"].as_i64().unwrap() > 0);
    assert_eq!(value["catchup_last_failure"], 0);
    assert!(value["is_connected"].as_bool().unwrap());
}

#[tokio::test]
async fn test_peers_endpoint_without_registry_is_empty() {
    let state = ApiState {
        registry: None,
        reputation: None,
        catchup: None,
    };
    let Json(response) = handle_peers(State(state)).await;
    assert_eq!(response.count, 0);
    assert!(response.peers.is_empty());
}

#[tokio::test]
async fn test_reset_reputation_endpoint() {
    let (state, registry) = full_state();

    for i in 0..3 {
        registry.record_attempt(&pid(&format!("peer-{i}")));
    }

    // Empty peer_id resets everyone
    let Json(response) = handle_reset_reputation(
        State(state.clone()),
        Json(ResetReputationRequest {
            peer_id: String::new(),
        }),
    )
    .await
    .unwrap();
    assert!(response.ok);
    assert_eq!(response.peers_reset, 3);

    // A single peer resets just that one
    registry.record_attempt(&pid("peer-0"));
    let Json(response) = handle_reset_reputation(
        State(state),
        Json(ResetReputationRequest {
            peer_id: "peer-0".into(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.peers_reset, 1);
    assert_eq!(registry.get_peer(&pid("peer-0")).unwrap().attempts, 0);
}

#[tokio::test]
async fn test_reset_reputation_rejects_malformed_ids() {
    let (state, _registry) = full_state();

    let err = handle_reset_reputation(
        State(state),
        Json(ResetReputationRequest {
            peer_id: "peer one".into(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_reputation_without_service_is_unavailable() {
    let state = ApiState {
        registry: None,
        reputation: None,
        catchup: None,
    };

    let err = handle_reset_reputation(
        State(state),
        Json(ResetReputationRequest {
            peer_id: String::new(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.0, axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_catchup_status_endpoint() {
    let (state, _registry) = full_state();

    // Idle first
    let Json(status) = handle_catchup_status(State(state.clone())).await.unwrap();
    assert!(!status.is_catching_up);

    // Then with an active catchup
    let tracker = state.catchup.as_ref().unwrap();
    tracker.begin(CatchupTarget {
        peer_id: "peer-1".into(),
        peer_url: "http://peer1.example:8090".into(),
        block_hash: "target".into(),
        height: 900,
        ..CatchupTarget::default()
    });
    tracker.set_total_blocks(40);
    tracker.note_block_fetched();

    let Json(status) = handle_catchup_status(State(state.clone())).await.unwrap();
    assert!(status.is_catching_up);
    assert_eq!(status.peer_id, "peer-1");
    assert_eq!(status.total_blocks, 40);
    assert_eq!(status.blocks_fetched, 1);

    let value = serde_json::to_value(&status).unwrap();
    assert!(value.get("is_catching_up").is_some());
    assert!(value.get("target_block_height").is_some());
}
