pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use anyhow::Result;

use crate::config::{BackendKind, WatchConfig};

use super::backend::DetectorBackend;

/// Build the configured backend.
pub fn build(config: &WatchConfig) -> Result<Box<dyn DetectorBackend>> {
    match config.backend {
        BackendKind::Stub => Ok(Box::new(StubBackend::new())),
        BackendKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(TractBackend::new(&config.model)?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                anyhow::bail!("the tract backend requires the backend-tract feature")
            }
        }
    }
}
