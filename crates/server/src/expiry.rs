//! Transfer-request expiry driver.
//!
//! Offers are timed by the service's timer queue; this task wakes on a fixed
//! interval and lets every due timer fire. Expiry events are published on the
//! claim bus by the service itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::service::ClaimService;

/// Spawn the expiry task. It runs for the lifetime of the runtime.
pub fn start(service: Arc<ClaimService>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can be due yet.
        interval.tick().await;

        tracing::info!("Transfer expiry started (interval {:?})", every);

        loop {
            interval.tick().await;
            let expired = service.expire_due(Utc::now()).await;
            if expired > 0 {
                tracing::debug!("{} transfer requests expired", expired);
            }
        }
    })
}
