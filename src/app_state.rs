// =============================================================================
// Central Application State
// =============================================================================
//
// Shared by every HTTP handler through `Arc<AppState>`. The service owns its
// own interior mutability (the analysis cache), so nothing here needs a lock;
// configuration is frozen after startup.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::runtime_config::AppConfig;
use crate::service::StockService;

pub struct AppState {
    pub config: AppConfig,
    pub service: Arc<StockService>,

    /// Instant the server started. Used for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, service: Arc<StockService>) -> Self {
        Self {
            config,
            service,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
