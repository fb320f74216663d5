//! Per-player session state: claim override toggles.
//!
//! Overrides let staff act inside any claim. They are session-only and are
//! cleared when the player leaves.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use claims_engine::{Authority, PlayerId};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub struct PlayerState {
    pub player: PlayerId,
    pub override_enabled: bool,
    pub since: DateTime<Utc>,
}

/// Broadcast whenever a player's override changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerStateEvent {
    OverrideChanged { player: PlayerId, enabled: bool },
}

/// Thread-safe registry of player session state.
///
/// Uses `std::sync::RwLock` because every operation is brief and the
/// permission resolver reads it on every protected action.
pub struct PlayerStateRegistry {
    players: RwLock<HashMap<PlayerId, PlayerState>>,
    event_tx: broadcast::Sender<PlayerStateEvent>,
}

impl PlayerStateRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            players: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Flip the player's override and return the new setting.
    pub fn toggle_override(&self, player: PlayerId) -> bool {
        let enabled = {
            let mut players = self.players.write().expect("player state poisoned");
            let state = players.entry(player).or_insert_with(|| PlayerState {
                player,
                override_enabled: false,
                since: Utc::now(),
            });
            state.override_enabled = !state.override_enabled;
            state.since = Utc::now();
            state.override_enabled
        };
        tracing::info!(target: "audit", player = %player, enabled, "claim override toggled");
        let _ = self
            .event_tx
            .send(PlayerStateEvent::OverrideChanged { player, enabled });
        enabled
    }

    /// Forget a player's session state, disabling any override.
    pub fn deregister(&self, player: PlayerId) {
        let removed = self
            .players
            .write()
            .expect("player state poisoned")
            .remove(&player);
        if removed.is_some_and(|s| s.override_enabled) {
            let _ = self.event_tx.send(PlayerStateEvent::OverrideChanged {
                player,
                enabled: false,
            });
        }
    }

    pub fn snapshot(&self) -> Vec<PlayerState> {
        self.players
            .read()
            .expect("player state poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn override_count(&self) -> usize {
        self.players
            .read()
            .expect("player state poisoned")
            .values()
            .filter(|s| s.override_enabled)
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerStateEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for PlayerStateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Authority for PlayerStateRegistry {
    fn has_override(&self, player: PlayerId) -> bool {
        self.players
            .read()
            .expect("player state poisoned")
            .get(&player)
            .is_some_and(|s| s.override_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_and_broadcasts() {
        let registry = PlayerStateRegistry::new();
        let mut rx = registry.subscribe();
        let admin = PlayerId::new();

        assert!(!registry.has_override(admin));
        assert!(registry.toggle_override(admin));
        assert!(registry.has_override(admin));
        assert_eq!(registry.override_count(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            PlayerStateEvent::OverrideChanged {
                player: admin,
                enabled: true
            }
        );

        assert!(!registry.toggle_override(admin));
        assert!(!registry.has_override(admin));
    }

    #[test]
    fn leaving_clears_the_override() {
        let registry = PlayerStateRegistry::new();
        let admin = PlayerId::new();
        registry.toggle_override(admin);
        registry.deregister(admin);
        assert!(!registry.has_override(admin));
        assert!(registry.snapshot().is_empty());
    }
}
