//! Compiled-graph cache keyed by configuration fingerprint.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::builder::GraphBuilder;
use super::{GraphValidationError, WorkflowGraph};
use crate::engine::EngineConfig;

/// Shares compiled graphs across executions with the same configuration.
///
/// Graph construction is cheap, but caching keeps the determinism guarantee
/// visible: two executions with equal configs literally run the same graph.
#[derive(Default)]
pub struct GraphCache {
    graphs: Mutex<FxHashMap<u64, Arc<WorkflowGraph>>>,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the graph for `config`, building and validating it on first use.
    pub fn get_or_build(
        &self,
        config: &EngineConfig,
    ) -> Result<Arc<WorkflowGraph>, GraphValidationError> {
        let key = config.fingerprint();
        if let Some(graph) = self.graphs.lock().get(&key) {
            return Ok(Arc::clone(graph));
        }
        // Built outside the lock; a racing builder just does redundant work.
        let graph = Arc::new(GraphBuilder::new(config).build()?);
        let mut guard = self.graphs.lock();
        let entry = guard.entry(key).or_insert_with(|| Arc::clone(&graph));
        Ok(Arc::clone(entry))
    }
}
