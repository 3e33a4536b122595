use std::sync::Arc;

use crate::proxy::upstream::client::UpstreamClient;

/// Axum application state. The caches and the rate-limit store are
/// process-wide singletons reached through their `global()` accessors; only
/// per-deployment services live here.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub models: Arc<Vec<String>>,
}
