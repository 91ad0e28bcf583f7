//! Access-control stage: session role → access filter.
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::{
    context::Context,
    envelope::Envelope,
    pipeline::{RequestMeta, Stage, StageError},
};

/// Maps the resolved session role onto the document visibility filter the
/// Model stage folds into its query: which access levels and document
/// statuses the current user may see. Unknown roles fall back to guest
/// visibility.
pub struct AccessStage {
    context: Context,
}

impl AccessStage {
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Visibility per role. This table gates reads only; write permissions
    /// ride on the operation tables of the dispatch stages.
    fn filter_for(role: &str) -> Value {
        match role {
            "user" | "author" | "editor" => json!({
                "accessLevel": ["public", "authenticated"],
                "documentStatus": ["published"],
            }),
            "publisher" => json!({
                "accessLevel": ["public", "private", "authenticated"],
                "documentStatus": ["published", "unpublished"],
            }),
            "manager" | "administrator" => json!({
                "accessLevel": ["public", "private", "authenticated", "unauthenticated"],
                "documentStatus": ["published", "unpublished", "archived", "trashed"],
            }),
            _ => json!({
                "accessLevel": ["public", "unauthenticated"],
                "documentStatus": ["published"],
            }),
        }
    }
}

#[async_trait]
impl Stage for AccessStage {
    fn name(&self) -> &'static str {
        "Access"
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    async fn handle(&mut self, _request: &RequestMeta) -> Result<Envelope, StageError> {
        let role = self.context.get_str("userRole").unwrap_or("guest");
        let filter = Self::filter_for(role);
        tracing::debug!(role, "access filter resolved");
        Ok(Envelope::success(json!({ "accessFilter": filter })))
    }
}
