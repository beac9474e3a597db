use core_catalog::{CatalogError, ProviderId};
use std::fmt::Display;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Feed for provider {provider_id} unavailable: {cause}")]
    ProviderFetch {
        provider_id: ProviderId,
        cause: String,
    },

    #[error("Store operation '{operation}' failed: {cause}")]
    Store { operation: String, cause: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SyncError {
    pub fn provider_fetch(provider_id: ProviderId, cause: impl Display) -> Self {
        SyncError::ProviderFetch {
            provider_id,
            cause: cause.to_string(),
        }
    }

    pub fn store(operation: impl Into<String>, cause: impl Display) -> Self {
        SyncError::Store {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Attach the failing store operation to a catalog error.
pub(crate) trait StoreContext<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T> StoreContext<T> for core_catalog::Result<T> {
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|e: CatalogError| SyncError::store(operation, e))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
