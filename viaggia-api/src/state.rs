use std::sync::Arc;
use viaggia_store::app_config::SearchConfig;
use viaggia_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub search: SearchConfig,
}

impl AppState {
    pub fn new(store: Store, search: SearchConfig) -> Self {
        Self {
            store: Arc::new(store),
            search,
        }
    }
}
