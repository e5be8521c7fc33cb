//! JSON HTTP API used by the web front end and the WhatsApp webhook.

pub mod error;
pub mod router;
pub mod server;
pub mod sessions;

use std::sync::Arc;

use crate::simulation::SessionStore;

/// Shared state handed to every endpoint.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn SessionStore>,
}

impl ApiContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

pub use error::ApiError;
pub use router::build_router;
pub use server::ApiServer;
