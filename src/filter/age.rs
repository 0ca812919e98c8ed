use chrono::{Duration, Utc};

use crate::filter::FilterState;
use crate::index::PackageIndex;

/// Stage B - age. Drops digests whose version is too young to delete.
#[derive(Debug, Default)]
pub struct AgeStage {
    older_than: Option<Duration>,
}

impl AgeStage {
    pub fn new(older_than: Option<Duration>) -> Self {
        Self { older_than }
    }

    pub fn apply(&self, state: &mut FilterState, index: &PackageIndex) {
        let Some(older_than) = self.older_than else {
            return;
        };
        let cutoff = Utc::now() - older_than;

        state.filter_set.retain(|digest| {
            index
                .version_by_digest(digest)
                .map(|version| version.updated_at < cutoff)
                .unwrap_or(false)
        });
    }
}
