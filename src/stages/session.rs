//! Session stage: resolve or create the request's session.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::core::{
    context::Context,
    envelope::Envelope,
    pipeline::{RequestMeta, Stage, StageError},
    session::{SessionRecord, SessionStore},
};

/// Resolves the request to a session record and merges the session identity
/// into the context. Resolution order: a presented access token first, then
/// the cookie-borne session id (extending its lifetime), else a fresh
/// session. The store is injected at construction; this stage holds no
/// state of its own between requests.
pub struct SessionStage {
    context: Context,
    store: Arc<SessionStore>,
}

impl SessionStage {
    pub fn new(context: Context, store: Arc<SessionStore>) -> Self {
        Self { context, store }
    }

    async fn resolve(&self) -> SessionRecord {
        if let Some(token) = self.context.get_str("accessToken") {
            if let Some(record) = self.store.find(token).await {
                self.store.touch(&record.session_id).await;
                return record;
            }
        }
        if let Some(session_id) = self.context.get_str("sessionId") {
            if let Some(record) = self.store.get(session_id).await {
                if !record.is_expired() {
                    // Lifetime extension races are last-writer-wins.
                    if let Some(extended) = self.store.touch(session_id).await {
                        return extended;
                    }
                }
            }
        }
        self.store.create().await
    }
}

#[async_trait]
impl Stage for SessionStage {
    fn name(&self) -> &'static str {
        "Session"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        let record = self.resolve().await;
        tracing::debug!(session_id = %record.session_id, user = %record.user, "session resolved");
        Ok(Envelope::success(json!({
            "sessionId": record.session_id,
            "user": record.user,
            "userRole": record.user_role,
            "authenticated": record.is_authenticated(),
        })))
    }
}
