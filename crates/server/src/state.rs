use std::sync::Arc;
use vault_core::processor::OcrProcessor;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<OcrProcessor>,
}
