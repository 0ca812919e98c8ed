use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};

use crate::api::registry::{RegistryClient, RegistryConfig};
use crate::config::{Config, PackageSpec};
use crate::error::Error;
use crate::executor::Executor;
use crate::filter::{AgeStage, ExcludeStage, FilterPipeline, FilterState, KeepTaggedStage, KeepUntaggedStage, StructuralStage, TagDeleteStage};
use crate::graph::{Graph, GraphBuilder};
use crate::index::PackageIndex;
use crate::manifest::Manifest;
use crate::package::client::PackageClient;
use crate::validator::Validator;

/// Running total across every package an `Orchestrator::run` call visits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub versions_deleted: usize,
    pub multi_arch_parents_deleted: usize,
}

impl Stats {
    fn merge(&mut self, other: &Stats) {
        self.versions_deleted += other.versions_deleted;
        self.multi_arch_parents_deleted += other.multi_arch_parents_deleted;
    }
}

/// Resolves the target package set and walks it once, sequentially
/// (§4.8, §5): build `PackageIndex` -> `GraphBuilder::build` ->
/// `FilterPipeline::run` -> execute `delete_set` -> optional
/// `Validator::validate`. Replaces the teacher's `Instance` + `Task` +
/// `Scheduler` trio, which existed only to drive a recurring
/// Docker-event-triggered cron schedule this spec has no counterpart
/// for - see DESIGN.md.
pub struct Orchestrator {
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<Stats, Error> {
        let package_client = PackageClient::new(&self.config.token, self.config.dry_run)?;
        let names = self.resolve_packages(&package_client).await?;
        if names.is_empty() {
            return Err(Error::NoTargetPackages);
        }

        let mut total = Stats::default();
        for name in names {
            info!("cleaning up package '{name}'");
            let stats = self.run_package(&name).await?;
            info!(
                "finished package '{name}': {} version(s) deleted, {} multi-arch parent(s) deleted",
                stats.versions_deleted, stats.multi_arch_parents_deleted
            );
            total.merge(&stats);
        }

        info!(
            "cleanup statistics: {} version(s) deleted, {} multi-arch parent(s) deleted",
            total.versions_deleted, total.multi_arch_parents_deleted
        );
        Ok(total)
    }

    /// Single name, comma-list, or wildcard/regex pattern. Pattern mode
    /// is only reachable once `Config::from_env` has already confirmed
    /// `expand_packages` is set; it still requires one extra listing
    /// call here to expand the account's catalog against the pattern.
    async fn resolve_packages(&self, package_client: &PackageClient) -> Result<Vec<String>, Error> {
        match &self.config.packages {
            PackageSpec::Single(name) => Ok(vec![name.clone()]),
            PackageSpec::List(names) => Ok(names.clone()),
            PackageSpec::Pattern(pattern) => {
                let all = package_client.list_packages(&self.config.owner).await?;
                Ok(all.into_iter().filter(|name| pattern.matches(name)).collect())
            }
        }
    }

    async fn run_package(&self, package: &str) -> Result<Stats, Error> {
        let package_client = PackageClient::new(&self.config.token, self.config.dry_run)?;
        let mut index = PackageIndex::load(&package_client, &self.config.owner, package).await?;

        let registry_config = Arc::new(RegistryConfig::new("ghcr.io", &self.config.owner_name, package));
        let mut registry = RegistryClient::new(registry_config, Some(self.config.token.clone()))?;
        let mut graph = GraphBuilder::build(&index, &mut registry).await?;

        let pipeline = self.build_pipeline();
        let mut executor = Executor::new(
            registry,
            package_client,
            self.config.owner.clone(),
            package.to_string(),
            self.config.dry_run,
        );
        let state = pipeline.run(&mut index, &graph, &mut executor).await?;

        let (stats, _deleted) = execute_deletions(&mut executor, &mut index, &mut graph, &state).await?;

        if self.config.validate {
            index.reload(executor.package_client(), &self.config.owner, package).await?;
            let warnings = Validator::new().validate(&index, &graph);
            for warning in &warnings {
                warn!("validation: {warning}");
            }
            if self.config.fail_on_warnings && !warnings.is_empty() {
                return Err(Error::ValidationFailed(warnings.len()));
            }
        }

        Ok(stats)
    }

    fn build_pipeline(&self) -> FilterPipeline {
        FilterPipeline::new(
            ExcludeStage::new(self.config.exclude_tags.clone()),
            AgeStage::new(self.config.older_than),
            TagDeleteStage::new(self.config.delete_tags.clone()),
            StructuralStage::new(
                self.config.delete_ghost_images,
                self.config.delete_partial_images,
                self.config.delete_orphaned_images,
            ),
            KeepTaggedStage::new(self.config.keep_n_tagged),
            KeepUntaggedStage::new(self.config.keep_n_untagged, self.config.delete_untagged),
        )
    }
}

/// Prefetch every candidate, then delete each surviving top-level digest
/// in `delete_set` that a prior iteration's cascade hasn't already
/// claimed. `delete_set` never contains untag targets - those already
/// executed inside `FilterPipeline::run`'s Stage C.
async fn execute_deletions(
    executor: &mut Executor,
    index: &mut PackageIndex,
    graph: &mut Graph,
    state: &FilterState,
) -> Result<(Stats, HashSet<String>), Error> {
    executor.prefetch(&state.delete_set).await?;

    let mut deleted = HashSet::new();
    let mut multi_arch_parents_deleted = 0;

    for digest in &state.delete_set {
        if deleted.contains(digest) {
            continue;
        }
        let is_index = matches!(executor.registry_mut().cached(digest), Some(Manifest::Index { .. }));
        executor
            .delete_standard(digest, index, graph, &state.excluded_tags, &mut deleted)
            .await?;
        if is_index {
            multi_arch_parents_deleted += 1;
        }
    }

    let stats = Stats {
        versions_deleted: deleted.len(),
        multi_arch_parents_deleted,
    };
    Ok((stats, deleted))
}
