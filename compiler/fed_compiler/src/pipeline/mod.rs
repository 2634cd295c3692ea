//! The pass pipeline and its artifact cache.
//!
//! `compile` imports the source into a private arena, uniquifies it, and
//! looks the result up by `(content hash, pipeline fingerprint)`. On a miss
//! the passes run in order, repeatedly, until a full round leaves the root
//! unchanged; the fixed point is validated, compacted into a fresh arena
//! and cached.

#[cfg(test)]
mod tests;

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use fed_ir::{infer_type, Arena, IntrinsicRegistry, NodeId};
use rustc_hash::FxHasher;

use crate::passes::{standard_passes, uniquify};
use crate::{validate_canonical, Artifact, CompilerError, Pass, PassContext, PipelineConfig};

/// Cache key: uniquified source hash and pipeline fingerprint.
type CacheKey = (u64, u64);

/// An ordered list of passes plus a compiled-artifact cache.
///
/// Shareable across threads. Concurrent compiles of the same source may
/// both run the passes; the first to finish populates the cache and both
/// return the cached artifact.
pub struct Pipeline {
    passes: Vec<Arc<dyn Pass>>,
    config: PipelineConfig,
    cache: DashMap<CacheKey, Arc<Artifact>>,
}

impl Pipeline {
    /// Pipeline running the standard passes.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_passes(standard_passes(), config)
    }

    pub fn with_passes(passes: Vec<Arc<dyn Pass>>, config: PipelineConfig) -> Self {
        Self {
            passes,
            config,
            cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Hash of the pass list, the configuration and the registry.
    pub fn fingerprint(&self, registry: &IntrinsicRegistry) -> u64 {
        let mut hasher = FxHasher::default();
        for pass in &self.passes {
            pass.name().hash(&mut hasher);
        }
        self.config.hash(&mut hasher);
        registry.fingerprint().hash(&mut hasher);
        hasher.finish()
    }

    /// Compile the tree at `root` into a canonical artifact.
    ///
    /// The source arena is only read. Nothing is cached on failure.
    #[tracing::instrument(level = "debug", skip_all, fields(nodes = source.node_count(root)))]
    pub fn compile(&self, source: &Arena, root: NodeId) -> Result<Arc<Artifact>, CompilerError> {
        let registry = Arc::clone(source.registry());
        let mut arena = Arena::new(Arc::clone(&registry));
        let root = arena.import(source, root)?;
        infer_type(&mut arena, root)?;
        let root = uniquify(&mut arena, root)?;

        let key = (arena.content_hash(root), self.fingerprint(&registry));
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(hash = key.0, "artifact cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let fixed = self.run_to_fixed_point(&mut arena, root)?;
        validate_canonical(&arena, fixed, &self.config)?;

        // The working arena holds every intermediate tree; keep only the result.
        let mut compact = Arena::new(registry);
        let fixed = compact.import(&arena, fixed)?;
        let artifact = Arc::new(Artifact::new(compact, fixed, key.0, key.1));
        tracing::debug!(
            hash = key.0,
            nodes = artifact.arena().node_count(fixed),
            "compiled artifact"
        );
        let cached = self.cache.entry(key).or_insert(artifact);
        Ok(Arc::clone(cached.value()))
    }

    /// Run every pass in order until a whole round changes nothing.
    pub fn run_to_fixed_point(
        &self,
        arena: &mut Arena,
        mut root: NodeId,
    ) -> Result<NodeId, CompilerError> {
        let cx = PassContext {
            config: &self.config,
        };
        for iteration in 0..self.config.max_iterations {
            let before = root;
            for pass in &self.passes {
                let input = root;
                root = pass
                    .run(&cx, arena, input)
                    .map_err(|e| e.in_pass(pass.name(), || arena.render_short(input)))?;
                if root != input {
                    tracing::trace!(pass = pass.name(), iteration, "pass rewrote tree");
                }
            }
            if root == before {
                tracing::debug!(iterations = iteration + 1, "fixed point reached");
                return Ok(root);
            }
        }
        Err(CompilerError::FixedPointNotReached {
            iterations: self.config.max_iterations,
            subtree: arena.render_short(root),
        })
    }

    /// Number of cached artifacts.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("passes", &self.pass_names())
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .finish()
    }
}
