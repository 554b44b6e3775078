//! HTTP request handlers

use super::types::{AgentsResponse, ErrorResponse, HistoryQuery, HistoryResponse};
use super::ws::ws_handler;
use super::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Real-time channel
        .route("/ws/warroom", get(ws_handler))
        .route("/api/warroom/history", get(get_history))
        .route("/api/warroom/agents", get(list_agents))
        .route("/version", get(get_version))
        .with_state(state)
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query.limit.unwrap_or(state.history_limit);
    let messages = state
        .room
        .store()
        .load_history(limit)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(HistoryResponse { messages }))
}

async fn list_agents(State(state): State<AppState>) -> Result<Json<AgentsResponse>, AppError> {
    let roster = state
        .room
        .resolver()
        .resolve_aliases()
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;

    Ok(Json(AgentsResponse {
        agents: roster.agents().to_vec(),
    }))
}

async fn get_version() -> &'static str {
    concat!("warroom ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    /// Roster source unreadable
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{room_in, sample_roster, MockRunner, StaticRoster};
    use crate::timeline::TimelineMessage;
    use std::sync::Arc;

    fn state(dir: &tempfile::TempDir, roster: StaticRoster) -> AppState {
        let room = room_in(dir.path(), roster, Arc::new(MockRunner::new()));
        AppState::new(Arc::new(room), 2)
    }

    #[tokio::test]
    async fn test_history_uses_default_limit() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, StaticRoster::new(sample_roster()));
        for i in 0..3 {
            state
                .room
                .store()
                .append(TimelineMessage::system(format!("m{i}")))
                .await
                .unwrap();
        }

        let Json(resp) = get_history(State(state.clone()), Query(HistoryQuery { limit: None }))
            .await
            .unwrap();
        let contents: Vec<_> = resp.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2"]);

        let Json(resp) = get_history(State(state), Query(HistoryQuery { limit: Some(10) }))
            .await
            .unwrap();
        assert_eq!(resp.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_agents_lists_roster() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, StaticRoster::new(sample_roster()));
        let Json(resp) = list_agents(State(state)).await.unwrap();
        let ids: Vec<_> = resp.agents.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1", "c1"]);
    }

    #[tokio::test]
    async fn test_agents_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, StaticRoster::failing());
        let err = list_agents(State(state)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
