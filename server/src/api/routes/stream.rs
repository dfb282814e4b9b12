//! Live client channel (§6): an SSE stream of typed events for the
//! attached session — `message.new`, `stream.start`/`token`/`end`,
//! `job.update`, `ping`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;

use crate::api::state::ApiState;
use crate::core::constants::SSE_KEEPALIVE_INTERVAL_SECS;
use crate::domain::session::{SessionId, SessionRegistry};

pub fn routes() -> Router<ApiState> {
    Router::new().route("/stream", get(live_channel))
}

/// Detaches the session from the registry when the SSE stream ends,
/// whether the client disconnects or the handler itself drops it.
struct DetachOnDrop {
    sessions: Arc<SessionRegistry>,
    id: SessionId,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        self.sessions.detach(self.id);
    }
}

async fn live_channel(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, mut receiver) = state.sessions.attach(None);
    let sessions = state.sessions.clone();

    let stream = async_stream::stream! {
        let _guard = DetachOnDrop { sessions, id };
        while let Some(event) = receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => tracing::warn!(error = %e, "failed to serialize session event"),
            }
        }
    };

    let keepalive_ping = serde_json::json!({ "type": "ping", "data": {} }).to_string();
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_INTERVAL_SECS))
            .text(keepalive_ping),
    )
}
