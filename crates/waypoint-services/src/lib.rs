//! waypoint-services — the peer reputation and catchup coordination core.
//!
//! The registry tracks what each peer did; the reputation engine turns
//! that history into a bounded score; the selector orders candidates for
//! catchup; the snapshot store persists it all across restarts. The
//! generational cache and readiness helpers support the query and
//! validation paths around catchup.

pub mod catchup;
pub mod gencache;
pub mod readiness;
pub mod record;
pub mod recorder;
pub mod registry;
pub mod reputation;
pub mod rpc;
pub mod selector;
pub mod snapshot;

pub use catchup::{CatchupStatus, CatchupTarget, CatchupTracker};
pub use gencache::{CacheQuery, GenerationalCache};
pub use record::{PeerRecord, PeerStatus};
pub use recorder::{LocalPeerMetrics, Recorder, ReputationClient};
pub use registry::PeerRegistry;
pub use rpc::{PeerForCatchup, PeerRegistryInfo, PeerService};
