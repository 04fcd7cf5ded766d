use std::sync::Arc;

use caldesk_core::{SchedulerConfig, SchedulingService, Storage};

pub type SharedStorage = Arc<dyn Storage + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<SchedulingService<SharedStorage>>,
}

impl AppState {
    pub fn new(storage: SharedStorage, config: SchedulerConfig) -> Self {
        AppState {
            service: Arc::new(SchedulingService::new(storage, config)),
        }
    }

    pub fn service(&self) -> &SchedulingService<SharedStorage> {
        &self.service
    }
}
