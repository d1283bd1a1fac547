use std::sync::Arc;

use crate::application::services::ConversionGateway;

/// Room left in a request body for multipart boundaries, part headers and
/// option fields.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_document_bytes: u64,
    pub max_batch_documents: usize,
}

impl UploadLimits {
    /// Largest body accepted by routes taking one document.
    pub fn single_body_bytes(&self) -> usize {
        self.document_bytes().saturating_add(MULTIPART_OVERHEAD_BYTES)
    }

    /// Largest body accepted by batch routes.
    pub fn batch_body_bytes(&self) -> usize {
        self.document_bytes()
            .saturating_mul(self.max_batch_documents)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }

    fn document_bytes(&self) -> usize {
        usize::try_from(self.max_document_bytes).unwrap_or(usize::MAX)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ConversionGateway>,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(gateway: Arc<ConversionGateway>, limits: UploadLimits) -> Self {
        Self { gateway, limits }
    }
}
