use std::sync::Arc;

use tokio::runtime::Builder;
use tokio::runtime::Runtime;

use crate::error::Result;
use crate::orchestrator::Answer;
use crate::orchestrator::Health;
use crate::orchestrator::IngestReport;
use crate::orchestrator::OrchestratorStats;
use crate::orchestrator::PreparedChunk;
use crate::orchestrator::RetrievalOrchestrator;

/// Runs the orchestrator to completion on the calling thread.
///
/// Owns a current-thread runtime, so it must not be used from inside another
/// tokio runtime.
pub struct BlockingOrchestrator {
    inner: Arc<RetrievalOrchestrator>,
    runtime: Runtime,
}

impl BlockingOrchestrator {
    pub fn new(inner: Arc<RetrievalOrchestrator>) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { inner, runtime })
    }

    pub fn ingest(&self, document_text: &str) -> Result<IngestReport> {
        self.runtime.block_on(self.inner.ingest(document_text))
    }

    pub fn ingest_prepared(&self, prepared: Vec<PreparedChunk>) -> Result<IngestReport> {
        self.runtime.block_on(self.inner.ingest_prepared(prepared))
    }

    pub fn ask(&self, question: &str) -> Result<Answer> {
        self.runtime.block_on(self.inner.ask(question))
    }

    pub fn health(&self) -> Health {
        self.inner.health()
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.inner.stats()
    }

    /// The shared orchestrator, for handing to async callers.
    pub fn orchestrator(&self) -> &Arc<RetrievalOrchestrator> {
        &self.inner
    }
}
