use crate::filter::FilterState;
use crate::graph::{referrer_subject_digest, Graph};
use crate::index::PackageIndex;

/// Stage D - structural cleanup: ghost images, partial images (which
/// subsume ghost), and orphaned referrer tags.
#[derive(Debug, Default)]
pub struct StructuralStage {
    delete_ghost_images: bool,
    delete_partial_images: bool,
    delete_orphaned_images: bool,
}

impl StructuralStage {
    pub fn new(delete_ghost_images: bool, delete_partial_images: bool, delete_orphaned_images: bool) -> Self {
        Self {
            delete_ghost_images,
            delete_partial_images,
            delete_orphaned_images,
        }
    }

    pub fn apply(&self, state: &mut FilterState, index: &PackageIndex, graph: &Graph) {
        if self.delete_ghost_images || self.delete_partial_images {
            self.apply_ghost_and_partial(state, index, graph);
        }
        if self.delete_orphaned_images {
            self.apply_orphaned_referrers(state, index);
        }
    }

    fn apply_ghost_and_partial(&self, state: &mut FilterState, index: &PackageIndex, graph: &Graph) {
        let candidates: Vec<String> = state.filter_set.iter().cloned().collect();
        for digest in candidates {
            let Some(children) = graph.declared_children.get(&digest) else {
                continue;
            };
            if children.is_empty() {
                continue;
            }

            let missing = children.iter().filter(|child| !index.contains_digest(child)).count();
            if missing == 0 {
                continue;
            }
            let is_ghost = missing == children.len();

            let delete = (is_ghost && (self.delete_ghost_images || self.delete_partial_images))
                || (!is_ghost && self.delete_partial_images);

            if delete {
                state.delete_set.insert(digest.clone());
                state.filter_set.remove(&digest);
            }
        }
    }

    fn apply_orphaned_referrers(&self, state: &mut FilterState, index: &PackageIndex) {
        for tag in index.tags().map(String::from).collect::<Vec<_>>() {
            if state.excluded_tags.contains(&tag) {
                continue;
            }
            let Some(subject) = referrer_subject_digest(&tag) else {
                continue;
            };
            if index.contains_digest(&subject) {
                continue;
            }
            if let Some(digest) = index.digest_by_tag(&tag).map(String::from) {
                state.delete_set.insert(digest.clone());
                state.filter_set.remove(&digest);
            }
        }
    }
}
