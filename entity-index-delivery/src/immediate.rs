//! In-process delivery.

use tracing::{debug, instrument};

use crate::errors::DeliveryError;
use entity_index_repository::{IndexService, WriteOutcome};
use entity_index_shared::IndexUpdateRequest;

/// Applies each update through the index service before returning.
///
/// Failures go straight back to the caller; nothing is retried here.
#[derive(Clone)]
pub struct ImmediateDelivery {
    index_service: IndexService,
}

impl ImmediateDelivery {
    pub fn new(index_service: IndexService) -> Self {
        Self { index_service }
    }

    #[instrument(
        skip(self, request),
        fields(entity_id = %request.entity_id, version = %request.version)
    )]
    pub async fn deliver(&self, request: &IndexUpdateRequest) -> Result<WriteOutcome, DeliveryError> {
        let outcome = self.index_service.apply(request).await?;
        debug!(outcome = ?outcome, "Applied index update immediately");
        Ok(outcome)
    }
}
