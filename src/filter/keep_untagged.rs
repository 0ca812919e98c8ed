use crate::filter::FilterState;
use crate::index::PackageIndex;
use crate::package::PackageVersion;

/// Stage F - keep-N-untagged or delete-untagged, mutually exclusive.
/// `Config::resolve_defaults` is responsible for the "neither C/D/E/F
/// option configured -> delete_untagged defaults true" rule; this stage
/// only ever sees an already-resolved decision.
#[derive(Debug, Default)]
pub struct KeepUntaggedStage {
    keep_n_untagged: Option<usize>,
    delete_untagged: bool,
}

impl KeepUntaggedStage {
    pub fn new(keep_n_untagged: Option<usize>, delete_untagged: bool) -> Self {
        Self {
            keep_n_untagged,
            delete_untagged,
        }
    }

    pub fn apply(&self, state: &mut FilterState, index: &PackageIndex) {
        if let Some(keep_n) = self.keep_n_untagged {
            let mut untagged: Vec<&PackageVersion> = state
                .filter_set
                .iter()
                .filter_map(|digest| index.version_by_digest(digest))
                .filter(|version| version.is_untagged())
                .collect();
            untagged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

            let evicted: Vec<String> = untagged.into_iter().skip(keep_n).map(|v| v.digest.clone()).collect();
            for digest in evicted {
                state.delete_set.insert(digest.clone());
                state.filter_set.remove(&digest);
            }
        } else if self.delete_untagged {
            let untagged_digests: Vec<String> = state
                .filter_set
                .iter()
                .filter(|digest| {
                    index
                        .version_by_digest(digest)
                        .map(|version| version.is_untagged())
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            for digest in untagged_digests {
                state.delete_set.insert(digest.clone());
                state.filter_set.remove(&digest);
            }
        }
    }
}
