//! Process-wide session store.
//!
//! Sessions live in a shared concurrent map owned by a single
//! [`SessionStore`] constructed at process start and injected into whatever
//! needs it — there is no ambient global. A recurring sweep task, started
//! lazily on first session creation, evicts expired records; it runs
//! independently of request processing and never blocks it. Two requests
//! racing on the same session id are resolved last-writer-wins on lifetime
//! extension.
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use rand::RngCore;

/// Store tuning. Durations come from configuration (humantime strings such
/// as `1h` / `1d`).
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Maximum lifetime of a session after its last request.
    pub max_age: Duration,
    /// Interval at which abandoned sessions are cleaned up.
    pub sweep_interval: Duration,
    /// Size in bytes of generated session keys.
    pub key_size: usize,
    /// User assigned when a session starts.
    pub default_user: String,
    /// Role assigned when a session starts.
    pub default_user_role: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            key_size: 24,
            default_user: "nobody".to_string(),
            default_user_role: "guest".to_string(),
        }
    }
}

/// One session. Requests hold lookups by id, never ownership; the store owns
/// every record until the sweep evicts it.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user: String,
    pub user_role: String,
    pub access_token: Option<String>,
    pub expires_at: Instant,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && !self.is_expired()
    }
}

/// Shared session map with lazy recurring sweep.
pub struct SessionStore {
    settings: SessionSettings,
    sessions: scc::HashMap<String, SessionRecord>,
    sweeper_started: AtomicBool,
}

impl SessionStore {
    pub fn new(settings: SessionSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            sessions: scc::HashMap::new(),
            sweeper_started: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Cryptographically random token of `size` bytes, hex-encoded.
    pub fn generate_key(size: usize) -> String {
        let mut bytes = vec![0u8; size];
        rand::rng().fill_bytes(&mut bytes);
        let mut key = String::with_capacity(size * 2);
        for byte in bytes {
            key.push_str(&format!("{byte:02x}"));
        }
        key
    }

    /// Allocate a fresh session with default identity and a full lifetime.
    /// The first creation starts the sweep task.
    pub async fn create(self: &Arc<Self>) -> SessionRecord {
        self.start_sweeper();
        let record = SessionRecord {
            session_id: Self::generate_key(self.settings.key_size),
            user: self.settings.default_user.clone(),
            user_role: self.settings.default_user_role.clone(),
            access_token: None,
            expires_at: Instant::now() + self.settings.max_age,
        };
        let _ = self
            .sessions
            .insert_async(record.session_id.clone(), record.clone())
            .await;
        tracing::info!(session_id = %record.session_id, "session created");
        record
    }

    /// Look up a session by id, expired or not.
    pub async fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions
            .read_async(session_id, |_, record| record.clone())
            .await
    }

    /// Find a non-expired session holding `access_token`.
    pub async fn find(&self, access_token: &str) -> Option<SessionRecord> {
        let mut found = None;
        self.sessions
            .any_async(|_, record| {
                if record.access_token.as_deref() == Some(access_token) && !record.is_expired() {
                    found = Some(record.clone());
                    return true;
                }
                false
            })
            .await;
        found
    }

    /// Reset a session's expiry to now + `max_age`. Last writer wins.
    pub async fn set_lifetime(&self, session_id: &str, max_age: Duration) -> Option<SessionRecord> {
        self.sessions
            .update_async(session_id, |_, record| {
                record.expires_at = Instant::now() + max_age;
                record.clone()
            })
            .await
    }

    /// Extend a session by the configured max-age.
    pub async fn touch(&self, session_id: &str) -> Option<SessionRecord> {
        self.set_lifetime(session_id, self.settings.max_age).await
    }

    /// Store an access token on a session (authentication), or clear it and
    /// demote the session back to the default identity.
    pub async fn set_access_token(
        &self,
        session_id: &str,
        token: Option<String>,
    ) -> Option<SessionRecord> {
        let settings = self.settings.clone();
        self.sessions
            .update_async(session_id, move |_, record| {
                match token {
                    Some(token) => record.access_token = Some(token),
                    None => {
                        record.access_token = None;
                        record.user = settings.default_user.clone();
                        record.user_role = settings.default_user_role.clone();
                    }
                }
                record.clone()
            })
            .await
    }

    /// Evict every expired record. Safe to run concurrently with lookups and
    /// with itself; returns the number of evictions.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.sessions
            .retain_async(|_, record| {
                let keep = record.expires_at > now;
                if !keep {
                    evicted += 1;
                }
                keep
            })
            .await;
        if evicted > 0 {
            tracing::info!(count = evicted, "session sweep evicted expired records");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.len()
    }

    fn start_sweeper(self: &Arc<Self>) {
        if self
            .sweeper_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let store = Arc::downgrade(self);
        let interval = self.settings.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would sweep an empty store.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.sweep().await;
                    }
                    None => break,
                }
            }
        });
    }
}
