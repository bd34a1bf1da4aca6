use factrag_core::config::ServerConfig;
use factrag_knowledge::RagService;

/// Shared by every request handler.
pub struct AppState {
    pub service: RagService,
    pub server: ServerConfig,
}

impl AppState {
    pub fn new(service: RagService, server: ServerConfig) -> Self {
        Self { service, server }
    }
}
