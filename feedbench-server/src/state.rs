//! Application state shared across handlers

use std::sync::Arc;

use crate::service::FeedService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    service: Arc<dyn FeedService>,
}

impl AppState {
    pub fn new(service: Arc<dyn FeedService>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { service }),
        }
    }

    pub fn service(&self) -> &dyn FeedService {
        self.inner.service.as_ref()
    }
}
