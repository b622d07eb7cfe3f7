use std::sync::Arc;

use crate::persistence::Backend;
use crate::transfer::TransferService;

/// Gateway application state (shared)
pub struct AppState<B: Backend> {
    /// Backend for account management queries
    pub backend: Arc<B>,
    /// Transfer entry point (shares the same backend)
    pub transfers: TransferService<B>,
}

impl<B: Backend> AppState<B> {
    pub fn new(transfers: TransferService<B>) -> Self {
        Self {
            backend: Arc::clone(transfers.backend()),
            transfers,
        }
    }
}
