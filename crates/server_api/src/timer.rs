use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use chrono::Utc;
use shared::domain::SessionCode;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::registry::{SessionRegistry, SessionSlot};

/// Tokens are unique for the process so a timer can never be mistaken for the
/// timer of a later session that reused the same code.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// At most one pending turn expiry per session.
#[derive(Debug, Default)]
pub struct TurnTimer {
    armed: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    token: u64,
    task: JoinHandle<()>,
}

impl TurnTimer {
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    fn is_current(&self, token: u64) -> bool {
        self.armed.as_ref().is_some_and(|armed| armed.token == token)
    }

    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.task.abort();
        }
    }

    /// Forgets the pending task without aborting it; used by the task itself.
    fn release(&mut self) {
        self.armed = None;
    }

    fn arm(&mut self, registry: SessionRegistry, code: SessionCode, duration: Duration) {
        self.disarm();
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(expire_turn(registry, code, token, duration));
        self.armed = Some(ArmedTimer { token, task });
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Re-evaluates the timer after a turn boundary: always disarms, then re-arms from
/// now if the game is still running and the session has a turn duration.
pub(crate) fn sync_turn_timer(registry: &SessionRegistry, slot: &mut SessionSlot) {
    slot.timer.disarm();
    let secs = match slot.session.settings().turn_timer_secs() {
        Some(secs) if slot.session.is_in_progress() => secs,
        _ => {
            slot.session.set_turn_deadline(None);
            return;
        }
    };
    let deadline = Utc::now() + chrono::Duration::seconds(i64::from(secs));
    slot.session.set_turn_deadline(Some(deadline));
    let code = slot.session.code().clone();
    slot.timer
        .arm(registry.clone(), code, Duration::from_secs(u64::from(secs)));
}

async fn expire_turn(registry: SessionRegistry, code: SessionCode, token: u64, duration: Duration) {
    tokio::time::sleep(duration).await;

    let Some(handle) = registry.get(&code).await else {
        debug!(session = %code, "turn timer fired for removed session");
        return;
    };
    let mut slot = handle.lock().await;
    if !slot.timer.is_current(token) || !slot.session.is_in_progress() {
        debug!(session = %code, "stale turn timer ignored");
        return;
    }
    slot.timer.release();
    match slot.session.end_turn() {
        Ok(_) => {
            info!(session = %code, "turn expired");
            slot.touch();
            sync_turn_timer(&registry, &mut slot);
            handle.publish(&slot);
        }
        Err(error) => warn!(session = %code, %error, "turn expiry rejected"),
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
