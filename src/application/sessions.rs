use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache;
use uuid::Uuid;

use crate::domain::{
    errors::InspectError,
    input::InspectionImage,
    session::SessionStats,
    verdict::{Verdict, VerdictDisplay},
};

/// Outcome of the last form submission, waiting for the page load that shows it.
#[derive(Debug)]
pub enum Flash {
    Verdict { display: VerdictDisplay, image: InspectionImage },
    Failed(InspectError),
}

/// Counters plus a per-session gate so one session never has two predictions in flight.
#[derive(Debug, Default)]
pub struct Session {
    stats: Mutex<SessionStats>,
    flash: Mutex<Option<Flash>>,
    inflight: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn snapshot(&self) -> SessionStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn record(&self, verdict: Verdict) -> SessionStats {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.record(verdict);
        *stats
    }

    pub fn set_flash(&self, flash: Flash) {
        *self.flash.lock().unwrap_or_else(|e| e.into_inner()) = Some(flash);
    }

    /// Hands out the pending outcome once; later calls return `None`.
    pub fn take_flash(&self) -> Option<Flash> {
        self.flash.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub(crate) async fn begin(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inflight.lock().await
    }
}

pub type SessionHandle = Arc<Session>;

/// Result of looking up the caller's session.
pub struct SessionLease {
    pub id: Uuid,
    pub session: SessionHandle,
    /// The caller had no session id; the cookie must be issued.
    pub is_new: bool,
}

/// Session id -> counters. Idle sessions are dropped after `idle`.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new(idle: Duration) -> Self {
        Self { sessions: Cache::builder().time_to_idle(idle).build() }
    }

    /// Returns the session for `id`, creating it when unknown or expired.
    pub fn resolve(&self, id: Option<Uuid>) -> SessionLease {
        let (id, is_new) = match id {
            Some(id) => (id, false),
            None => (Uuid::new_v4(), true),
        };
        let session = self.sessions.get_with(id, || {
            tracing::debug!(session = %id, "new inspection session");
            Arc::new(Session::default())
        });
        SessionLease { id, session, is_new }
    }

    pub fn len(&self) -> u64 {
        self.sessions.entry_count()
    }
}
