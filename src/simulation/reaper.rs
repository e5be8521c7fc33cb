//! Background eviction of idle sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::simulation::store::SessionStore;

/// Spawn a task that reaps sessions idle longer than `ttl` every `interval`.
pub fn spawn_reaper(store: Arc<dyn SessionStore>, ttl: Duration, interval: Duration) -> JoinHandle<()> {
    info!("Session eviction enabled: ttl={:?}, checking every {:?}", ttl, interval);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = store.reap_expired(ttl);
            if reaped > 0 {
                info!("🧹 Reaped {} idle session(s), {} remaining", reaped, store.session_count());
            }
        }
    })
}
