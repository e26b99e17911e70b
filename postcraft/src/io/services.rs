//! Collaborator abstractions invoked by the workflow controller.
//!
//! Each trait is a request/response seam: a call either succeeds with a
//! structured payload or fails as a unit. The controller never interprets
//! error contents beyond their message. Tests use scripted implementations
//! that return predetermined payloads without touching the network.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::core::history::HistoryEntry;
use crate::core::types::{Candidate, CandidatePair, ContextBundle, FormInput, PublishReceipt};
use crate::io::archive::ArchivePublisher;
use crate::io::config::AppConfig;
use crate::io::http::HttpBackend;

/// Retrieves context material for a validated form.
#[async_trait]
pub trait ContextService: Send + Sync {
    async fn fetch(&self, form: &FormInput) -> Result<ContextBundle>;
}

/// Produces the first candidate pair.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, form: &FormInput, context: &ContextBundle) -> Result<CandidatePair>;
}

/// Produces a refined pair from the selected candidate of a closed round.
#[async_trait]
pub trait RefinementService: Send + Sync {
    async fn refine(&self, selected_text: &str, request: &str, round: u32)
    -> Result<CandidatePair>;
}

/// Persists the outcome of a completed workflow. Must not be retried implicitly.
#[async_trait]
pub trait PublishService: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt>;
}

/// Everything a publisher receives, snapshotted when publication starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRequest {
    pub form: FormInput,
    pub final_result: Candidate,
    pub history: Vec<HistoryEntry>,
    pub context: ContextBundle,
}

/// The collaborator set a controller is built with.
#[derive(Clone)]
pub struct Services {
    pub context: Arc<dyn ContextService>,
    pub generation: Arc<dyn GenerationService>,
    pub refinement: Arc<dyn RefinementService>,
    pub publish: Arc<dyn PublishService>,
}

impl Services {
    /// Use one backend for all four collaborators.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ContextService + GenerationService + RefinementService + PublishService + 'static,
    {
        Self {
            context: backend.clone(),
            generation: backend.clone(),
            refinement: backend.clone(),
            publish: backend,
        }
    }

    /// Replace the publisher, keeping the other collaborators.
    pub fn with_publisher(mut self, publish: Arc<dyn PublishService>) -> Self {
        self.publish = publish;
        self
    }

    /// Build the HTTP-backed set described by `config`, publishing to the
    /// local archive when it is enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::new(&config.backend)?);
        let services = Self::from_backend(backend);
        if config.archive.enabled {
            info!(path = %config.archive.path.display(), "publishing to local archive");
            return Ok(services.with_publisher(Arc::new(ArchivePublisher::new(
                config.archive.path.clone(),
            ))));
        }
        Ok(services)
    }
}
