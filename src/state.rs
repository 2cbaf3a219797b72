use chrono::{DateTime, Utc};

use crate::hub::Hub;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: Hub,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self {
            hub,
            started_at: Utc::now(),
        }
    }
}
