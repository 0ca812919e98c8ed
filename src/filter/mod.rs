pub mod age;
pub mod exclude;
pub mod keep_tagged;
pub mod keep_untagged;
pub mod parsing;
pub mod structural;
pub mod tag_delete;

use std::collections::HashSet;

use crate::error::Error;
use crate::executor::Executor;
use crate::graph::Graph;
use crate::index::PackageIndex;

pub use age::AgeStage;
pub use exclude::ExcludeStage;
pub use keep_tagged::KeepTaggedStage;
pub use keep_untagged::KeepUntaggedStage;
pub use structural::StructuralStage;
pub use tag_delete::TagDeleteStage;

/// Mutable state threaded through every stage of one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct FilterState {
    pub filter_set: HashSet<String>,
    pub delete_set: HashSet<String>,
    pub untag_set: Vec<(String, String)>,
    pub excluded_tags: HashSet<String>,
}

impl FilterState {
    pub fn seed(top_level: HashSet<String>) -> Self {
        Self {
            filter_set: top_level,
            ..Self::default()
        }
    }
}

/// The fixed, ordered policy stages A-F. Unlike the plugin registry it
/// replaces, stage order here is not user-configurable - only which
/// stages are enabled is, via the resolved `Config`.
#[derive(Debug, Default)]
pub struct FilterPipeline {
    exclude: ExcludeStage,
    age: AgeStage,
    tag_delete: TagDeleteStage,
    structural: StructuralStage,
    keep_tagged: KeepTaggedStage,
    keep_untagged: KeepUntaggedStage,
}

impl FilterPipeline {
    pub fn new(
        exclude: ExcludeStage,
        age: AgeStage,
        tag_delete: TagDeleteStage,
        structural: StructuralStage,
        keep_tagged: KeepTaggedStage,
        keep_untagged: KeepUntaggedStage,
    ) -> Self {
        Self {
            exclude,
            age,
            tag_delete,
            structural,
            keep_tagged,
            keep_untagged,
        }
    }

    /// Run every stage in fixed order over `index`/`graph`. Stage C may
    /// mutate `index` in place (the untag protocol reloads it).
    pub async fn run(
        &self,
        index: &mut PackageIndex,
        graph: &Graph,
        executor: &mut Executor,
    ) -> Result<FilterState, Error> {
        let top_level = graph.top_level_digests(index);
        let mut state = FilterState::seed(top_level);

        self.exclude.apply(&mut state, index);
        self.age.apply(&mut state, index);
        self.tag_delete.apply(&mut state, index, executor).await?;
        // Untagging may have freed tags that now match the exclude
        // pattern for the first time (a tag can only exist on one
        // digest at a time), so exclude is re-resolved before the
        // structural and count-based stages run.
        self.exclude.apply(&mut state, index);
        self.structural.apply(&mut state, index, graph);
        self.keep_tagged.apply(&mut state, index);
        self.keep_untagged.apply(&mut state, index);

        Ok(state)
    }
}
