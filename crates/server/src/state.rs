use guichet_core::{Config, Dispatcher, QueueStore, SanitizedConfig};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn QueueStore>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn QueueStore>) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), config.dispatch.clone());
        Self {
            config,
            store,
            dispatcher,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn QueueStore {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
