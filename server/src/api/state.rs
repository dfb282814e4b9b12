//! Shared application state handed to every route handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::core::config::AuthConfig;
use crate::domain::adapters::AdapterContainer;
use crate::domain::conversation::ConversationService;
use crate::domain::events::EventBus;
use crate::domain::job::JobStore;
use crate::domain::pipeline::PipelineConfig;
use crate::domain::query::QueryService;
use crate::domain::scheduler::TaskScheduler;
use crate::domain::session::SessionRegistry;

#[derive(Clone)]
pub struct ApiState {
    pub conversations: Arc<ConversationService>,
    pub jobs: Arc<JobStore>,
    pub events: Arc<EventBus>,
    pub sessions: Arc<SessionRegistry>,
    pub scheduler: Arc<TaskScheduler>,
    pub adapters: Arc<AdapterContainer>,
    pub query_service: Arc<QueryService>,
    pub pipeline_config: PipelineConfig,
    pub auth_config: AuthConfig,
}

impl FromRef<ApiState> for AuthConfig {
    fn from_ref(state: &ApiState) -> AuthConfig {
        state.auth_config.clone()
    }
}
