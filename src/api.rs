//! HTTP and WebSocket surface of the war room

mod handlers;
mod types;
mod ws;

pub use handlers::create_router;

use crate::engine::WarRoom;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub room: Arc<WarRoom>,
    /// Default size of a history replay
    pub history_limit: usize,
}

impl AppState {
    pub fn new(room: Arc<WarRoom>, history_limit: usize) -> Self {
        Self {
            room,
            history_limit,
        }
    }
}
