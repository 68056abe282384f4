//! Application state shared by all handlers.

use std::sync::Arc;

use mediaload_core::MediaHooks;
use mediaload_services::ChunkAssembler;

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<ChunkAssembler>,
    /// Host callbacks for finished media and already-recorded sessions.
    pub hooks: Arc<dyn MediaHooks>,
}

impl AppState {
    pub fn new(assembler: Arc<ChunkAssembler>, hooks: Arc<dyn MediaHooks>) -> Self {
        Self { assembler, hooks }
    }
}
