//! Live web dashboard: claim counts, protection-check stats and a feed of
//! claim changes.
//!
//! The dashboard only reads. Metrics are atomics, gauges are read from the
//! index on each push, and claim events arrive over the broadcast bus, so a
//! slow browser never holds up a protection check or a mutation.

pub mod metrics;
pub mod server;

use std::sync::Arc;

use claims_engine::ClaimIndex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::event_bus::{ChangeSource, ClaimEvent};
use crate::player_state::PlayerStateRegistry;

pub use metrics::{Gauges, Metrics, MetricsSnapshot};

/// Central state shared via `Arc<DashboardState>`.
pub struct DashboardState {
    pub metrics: Arc<Metrics>,
    pub index: Arc<ClaimIndex>,
    pub players: Arc<PlayerStateRegistry>,
    bus: broadcast::Sender<ClaimEvent>,
}

impl DashboardState {
    pub fn new(
        metrics: Arc<Metrics>,
        index: Arc<ClaimIndex>,
        players: Arc<PlayerStateRegistry>,
        bus: broadcast::Sender<ClaimEvent>,
    ) -> Self {
        Self {
            metrics,
            index,
            players,
            bus,
        }
    }

    pub fn gauges(&self) -> Gauges {
        Gauges {
            worlds: self.index.world_ids().len() as u64,
            claims: self.index.claim_count() as u64,
            partitions: self.index.partition_count() as u64,
            overrides_enabled: self.players.override_count() as u64,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.gauges())
    }

    /// One receiver per WebSocket client.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClaimEvent> {
        self.bus.subscribe()
    }
}

// ── Feed entries ─────────────────────────────────────────────────────────

#[derive(Clone, Serialize)]
pub struct FeedEntry {
    pub kind: &'static str,
    pub claim: String,
    pub label: String,
}

impl From<&ClaimEvent> for FeedEntry {
    fn from(event: &ClaimEvent) -> Self {
        let label = match event {
            ClaimEvent::Committed(batch) => {
                let ChangeSource::Player(by) = &batch.source;
                format!("{} changes by {}", batch.changes.len(), by)
            }
            ClaimEvent::TransferOffered(request) => {
                format!("offered to {}", request.target)
            }
            ClaimEvent::TransferClosed { request, reason } => {
                format!("request for {} {:?}", request.target, reason)
            }
        };
        Self {
            kind: event.kind(),
            claim: event.claim().to_string(),
            label,
        }
    }
}
