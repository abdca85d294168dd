//! Shared application state for the Axum API server.

use pushline_common::config::AppConfig;
use pushline_common::store::NotificationStore;
use pushline_queue::DurableQueue;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: NotificationStore,
    pub queue: DurableQueue,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: NotificationStore, queue: DurableQueue, config: AppConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }
}
