use crate::filter::FilterState;
use crate::index::PackageIndex;
use crate::package::PackageVersion;

/// Stage E - keep-N-tagged. Retains the N most recently updated tagged
/// digests remaining in `filter_set`; everything else is deleted.
#[derive(Debug, Default)]
pub struct KeepTaggedStage {
    keep_n: Option<usize>,
}

impl KeepTaggedStage {
    pub fn new(keep_n: Option<usize>) -> Self {
        Self { keep_n }
    }

    pub fn apply(&self, state: &mut FilterState, index: &PackageIndex) {
        let Some(keep_n) = self.keep_n else {
            return;
        };

        let mut tagged: Vec<&PackageVersion> = state
            .filter_set
            .iter()
            .filter_map(|digest| index.version_by_digest(digest))
            .filter(|version| version.is_tagged())
            .collect();
        tagged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let evicted: Vec<String> = tagged.into_iter().skip(keep_n).map(|v| v.digest.clone()).collect();
        for digest in evicted {
            state.delete_set.insert(digest.clone());
            state.filter_set.remove(&digest);
        }
    }
}
