//! Handler types and dependencies

use std::sync::Arc;

use crate::download::formats::FormatResolver;
use crate::download::pipeline::Pipeline;
use crate::download::tokens::SelectionTokenStore;
use crate::telegram::credentials::CredentialStore;
use crate::telegram::transport::ChatTransport;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub transport: Arc<dyn ChatTransport>,
    pub resolver: FormatResolver,
    pub tokens: Arc<SelectionTokenStore>,
    pub credentials: Arc<CredentialStore>,
    pub pipeline: Pipeline,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        resolver: FormatResolver,
        tokens: Arc<SelectionTokenStore>,
        credentials: Arc<CredentialStore>,
        pipeline: Pipeline,
    ) -> Self {
        Self {
            transport,
            resolver,
            tokens,
            credentials,
            pipeline,
        }
    }
}
