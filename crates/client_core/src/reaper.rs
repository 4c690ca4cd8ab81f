use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::domain::{CallId, CallRecord};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::{state::SessionState, store::SessionStore};

pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_VOICE_READY_INTERVAL: Duration = Duration::from_secs(30);

/// Active calls whose elapsed time exceeds `threshold` at `now`, oldest first.
pub fn stale_calls(state: &SessionState, threshold: Duration, now: DateTime<Utc>) -> Vec<CallId> {
    let threshold = threshold.as_secs();
    let mut stale: Vec<&CallRecord> = state
        .active_calls
        .values()
        .filter(|call| call.elapsed_seconds(now) > threshold)
        .collect();
    stale.sort_by_key(|call| call.start_time);
    stale.into_iter().map(|call| call.id).collect()
}

/// Force-completes calls the backend never reported as finished.
#[derive(Debug, Clone, Copy)]
pub struct StaleCallReaper {
    threshold: Duration,
    interval: Duration,
}

impl Default for StaleCallReaper {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_THRESHOLD, DEFAULT_SWEEP_INTERVAL)
    }
}

impl StaleCallReaper {
    pub fn new(threshold: Duration, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// One pass: every stale call is moved to history as `auto_completed` with its elapsed time
    /// as duration. Calls that finish concurrently are left alone by the store.
    pub async fn sweep(&self, store: &SessionStore, now: DateTime<Utc>) -> Vec<CallRecord> {
        let state = store.state().await;
        let candidates = stale_calls(&state, self.threshold, now);
        if candidates.is_empty() {
            debug!("reaper: no stale calls");
            return Vec::new();
        }

        let mut reaped = Vec::with_capacity(candidates.len());
        for call_id in candidates {
            if let Some(record) = store.auto_complete(call_id, now).await {
                info!(
                    "reaper: auto-completed id={call_id} duration={}s",
                    record.duration_seconds
                );
                reaped.push(record);
            }
        }
        reaped
    }

    /// Runs `sweep` on a fixed interval until the returned task is aborted.
    pub fn spawn(self, store: Arc<SessionStore>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep(&store, Utc::now()).await;
            }
        })
    }
}

impl SessionStore {
    /// Applies the reaper once with an explicit threshold and clock.
    pub async fn reap_stale_calls(
        &self,
        threshold: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Vec<CallId> {
        let threshold = threshold.to_std().unwrap_or(Duration::ZERO);
        StaleCallReaper::new(threshold, DEFAULT_SWEEP_INTERVAL)
            .sweep(self, now)
            .await
            .into_iter()
            .map(|record| record.id)
            .collect()
    }
}

/// Re-checks voice readiness periodically while a user is signed in.
#[derive(Debug, Clone, Copy)]
pub struct VoiceReadyPoller {
    interval: Duration,
}

impl Default for VoiceReadyPoller {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE_READY_INTERVAL)
    }
}

impl VoiceReadyPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn spawn(self, store: Arc<SessionStore>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if store.state().await.user_id().is_some() {
                    store.check_voice_ready().await;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/reaper_tests.rs"]
mod tests;
