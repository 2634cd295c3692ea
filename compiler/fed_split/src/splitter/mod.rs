//! The mergeable-computation compiler.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use dashmap::DashMap;
use fed_compiler::{Artifact, CompilerError, Pipeline, PipelineConfig};
use fed_ir::{Arena, IntrinsicRegistry, NodeKind};
use fed_types::TypeFlags;

use crate::collect::collect_sites;
use crate::pieces::build_pieces;
use crate::{AggregationSite, MergeableForm, UnsplittableComputationError, UnsplittableReason};

/// Splits compiled computations into independently executable pieces.
///
/// Splits are cached by artifact content and pipeline fingerprint.
pub struct MergeableCompiler {
    registry: Arc<IntrinsicRegistry>,
    /// Inlines without bound so every aggregation is a visible expression.
    expand: Pipeline,
    /// Compiles the pieces.
    pipeline: Pipeline,
    cache: DashMap<(u64, u64), Arc<MergeableForm>>,
}

impl MergeableCompiler {
    pub fn new(registry: Arc<IntrinsicRegistry>, config: PipelineConfig) -> Self {
        Self {
            registry,
            expand: Pipeline::new(config.with_inline_fan_out(usize::MAX)),
            pipeline: Pipeline::new(config),
            cache: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<IntrinsicRegistry> {
        &self.registry
    }

    /// Split `artifact` into client, merge and server pieces.
    #[tracing::instrument(level = "debug", skip_all, fields(hash = artifact.content_hash()))]
    pub fn split(
        &self,
        artifact: &Artifact,
    ) -> Result<Arc<MergeableForm>, UnsplittableComputationError> {
        let key = (
            artifact.content_hash(),
            self.pipeline.fingerprint(&self.registry),
        );
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("split cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let form = Arc::new(self.split_uncached(artifact)?);
        tracing::debug!(
            aggregations = form.aggregation_count(),
            "split computation"
        );
        let cached = self.cache.entry(key).or_insert(form);
        Ok(Arc::clone(cached.value()))
    }

    fn split_uncached(&self, artifact: &Artifact) -> Result<MergeableForm, UnsplittableComputationError> {
        let compilation = |e: CompilerError| {
            UnsplittableComputationError::new(UnsplittableReason::Compilation(e), artifact.render())
        };

        let mut source = Arena::new(Arc::clone(&self.registry));
        let root = source
            .import(artifact.arena(), artifact.root())
            .map_err(|e| compilation(e.into()))?;
        let expanded = self.expand.compile(&source, root).map_err(compilation)?;

        let mut arena = Arena::new(Arc::clone(&self.registry));
        let root = arena
            .import(expanded.arena(), expanded.root())
            .map_err(|e| compilation(e.into()))?;
        let fail = |reason, arena: &Arena| UnsplittableComputationError::new(reason, arena.render_short(root));

        let NodeKind::Lambda {
            param: Some(param),
            body,
        } = *arena.kind(root)
        else {
            return Err(fail(UnsplittableReason::NotAFunction, &arena));
        };
        let flags = |ty| arena.types().flags(ty);
        if !flags(param.ty).contains(TypeFlags::AT_CLIENTS) {
            return Err(fail(UnsplittableReason::NoClientsParameter, &arena));
        }
        if flags(arena.ty(body)).contains(TypeFlags::AT_CLIENTS) {
            return Err(fail(UnsplittableReason::ClientsPlacedResult, &arena));
        }

        let sites = collect_sites(&arena, param.name, body)?;
        let pieces = build_pieces(&mut arena, root, param, body, &sites)?;

        let client = self.pipeline.compile(&arena, pieces.client).map_err(compilation)?;
        let merge = self.pipeline.compile(&arena, pieces.merge).map_err(compilation)?;
        let server = self.pipeline.compile(&arena, pieces.server).map_err(compilation)?;
        let aggregations = sites
            .into_iter()
            .map(|site| AggregationSite {
                intrinsic: site.intrinsic,
                partial: site.merge.partial,
                merge: site.merge.merge,
                finalize: site.merge.finalize,
            })
            .collect();
        Ok(MergeableForm {
            client,
            merge,
            server,
            aggregations,
        })
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for MergeableCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeableCompiler")
            .field("pipeline", &self.pipeline)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
