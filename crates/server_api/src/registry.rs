use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use engine::Session;
use rand::Rng;
use shared::{
    domain::{PlayerId, SessionCode, SESSION_CODE_LEN},
    protocol::ServerEvent,
};
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::timer::TurnTimer;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const EVENT_BUFFER: usize = 64;
const MAX_CODE_ATTEMPTS: usize = 64;

/// Process-wide map from session code to session. The map lock is only held for
/// lookups and inserts; each session serializes its own operations behind its slot lock.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sessions: RwLock<HashMap<SessionCode, Arc<SessionHandle>>>,
    next_player_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sessions: RwLock::new(HashMap::new()),
                next_player_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn alloc_player_id(&self) -> PlayerId {
        PlayerId(self.inner.next_player_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Inserts a session under a fresh code. `None` when no unused code turned up
    /// within a bounded number of draws.
    pub async fn create(
        &self,
        build: impl FnOnce(SessionCode) -> Session,
    ) -> Option<Arc<SessionHandle>> {
        let mut sessions = self.inner.sessions.write().await;
        let code = unused_code(&sessions, &mut rand::thread_rng())?;
        let handle = Arc::new(SessionHandle::new(build(code.clone())));
        sessions.insert(code, Arc::clone(&handle));
        Some(handle)
    }

    pub async fn get(&self, code: &SessionCode) -> Option<Arc<SessionHandle>> {
        self.inner.sessions.read().await.get(code).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes a session and cancels its pending turn expiry.
    pub async fn remove(&self, code: &SessionCode) -> Option<Arc<SessionHandle>> {
        let handle = self.inner.sessions.write().await.remove(code)?;
        handle.lock().await.timer.disarm();
        Some(handle)
    }

    /// Removes sessions with no activity for at least `max_idle`.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<SessionCode> {
        let handles: Vec<Arc<SessionHandle>> =
            self.inner.sessions.read().await.values().cloned().collect();
        let mut reaped = Vec::new();
        for handle in handles {
            let idle = handle.lock().await.idle_for();
            if idle >= max_idle && self.remove(handle.code()).await.is_some() {
                info!(session = %handle.code(), idle_secs = idle.as_secs(), "reaped idle session");
                reaped.push(handle.code().clone());
            }
        }
        reaped
    }
}

fn unused_code<R: Rng + ?Sized>(
    sessions: &HashMap<SessionCode, Arc<SessionHandle>>,
    rng: &mut R,
) -> Option<SessionCode> {
    let code = (0..MAX_CODE_ATTEMPTS)
        .map(|_| random_code(rng))
        .find(|candidate| !sessions.contains_key(candidate));
    if code.is_none() {
        warn!(sessions = sessions.len(), "no unused session code found");
    }
    code
}

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> SessionCode {
    loop {
        let raw: String = (0..SESSION_CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect();
        if let Some(code) = SessionCode::parse(&raw) {
            return code;
        }
    }
}

pub struct SessionHandle {
    code: SessionCode,
    slot: Mutex<SessionSlot>,
    events: broadcast::Sender<ServerEvent>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            code: session.code().clone(),
            slot: Mutex::new(SessionSlot {
                session,
                timer: TurnTimer::default(),
                last_activity: Instant::now(),
            }),
            events,
        }
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Sends the current snapshot to every subscriber. Callers hold the slot lock, so
    /// subscribers see snapshots in mutation order.
    pub fn publish(&self, slot: &SessionSlot) {
        let _ = self.events.send(ServerEvent::UpdateState {
            state: slot.session.snapshot(),
        });
    }
}

/// Everything guarded by a session's lock.
pub struct SessionSlot {
    pub(crate) session: Session,
    pub(crate) timer: TurnTimer,
    last_activity: Instant,
}

impl SessionSlot {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
