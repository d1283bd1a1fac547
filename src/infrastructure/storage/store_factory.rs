use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{StagingStore, StagingStoreError};
use crate::presentation::config::{StagingProvider, StagingSettings};

use super::object_staging_store::ObjectStagingStore;

pub struct StagingStoreFactory;

impl StagingStoreFactory {
    pub fn create(settings: &StagingSettings) -> Result<Arc<dyn StagingStore>, StagingStoreError> {
        match settings.provider {
            StagingProvider::Local => {
                let path = PathBuf::from(&settings.local_path);
                tracing::info!(path = %path.display(), "Using local staging store");
                Ok(Arc::new(ObjectStagingStore::local(path)?))
            }
            StagingProvider::Memory => {
                tracing::info!("Using in-memory staging store");
                Ok(Arc::new(ObjectStagingStore::in_memory()))
            }
        }
    }
}
