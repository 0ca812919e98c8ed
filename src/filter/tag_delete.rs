use crate::error::Error;
use crate::executor::Executor;
use crate::filter::parsing::PatternSet;
use crate::filter::FilterState;
use crate::index::PackageIndex;

const MAX_PASSES: u32 = 2;

/// Stage C - delete-by-tag. Two-phase: tags whose target still carries
/// other tags go through the untag protocol; tags whose target carries
/// only themselves are deleted directly. Bounded to two passes over the
/// index, since a tag can become a direct delete only once, immediately
/// after the pass that untags its sibling tags.
#[derive(Debug, Default)]
pub struct TagDeleteStage {
    pattern: Option<PatternSet>,
}

impl TagDeleteStage {
    pub fn new(pattern: Option<PatternSet>) -> Self {
        Self { pattern }
    }

    pub async fn apply(
        &self,
        state: &mut FilterState,
        index: &mut PackageIndex,
        executor: &mut Executor,
    ) -> Result<(), Error> {
        let Some(pattern) = &self.pattern else {
            return Ok(());
        };

        for _pass in 0..MAX_PASSES {
            let untag_targets = partition(pattern, state, index);

            if untag_targets.is_empty() {
                break;
            }

            for (tag, digest) in &untag_targets {
                executor.untag(tag, digest, index).await?;
            }
        }

        Ok(())
    }
}

/// Resolve `pattern` against every current tag, moving single-tagged
/// targets straight into `delete_set` and returning the multi-tagged
/// targets that still need the untag protocol.
fn partition(pattern: &PatternSet, state: &mut FilterState, index: &PackageIndex) -> Vec<(String, String)> {
    let mut untag_targets = Vec::new();

    for tag in index.tags().map(String::from).collect::<Vec<_>>() {
        if state.excluded_tags.contains(&tag) || !pattern.matches(&tag) {
            continue;
        }
        let Some(digest) = index.digest_by_tag(&tag).map(String::from) else {
            continue;
        };
        if !state.filter_set.contains(&digest) {
            continue;
        }

        let tag_count = index
            .version_by_digest(&digest)
            .map(|version| version.tags.len())
            .unwrap_or(0);

        if tag_count >= 2 {
            untag_targets.push((tag, digest));
        } else {
            state.delete_set.insert(digest.clone());
            state.filter_set.remove(&digest);
        }
    }

    untag_targets
}
