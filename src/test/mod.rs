use std::collections::HashSet;

use chrono::Duration;

use crate::package::PackageVersion;

/// Build a `PackageVersion` fixture for unit tests: `offset_seconds` is
/// relative to "now", negative for the past. Tags are taken verbatim, so
/// an empty vec produces an untagged version.
pub fn version_at(id: u64, digest: impl Into<String>, tags: Vec<impl Into<String>>, offset_seconds: i64) -> PackageVersion {
    let updated_at = chrono::Utc::now() + Duration::seconds(offset_seconds);
    PackageVersion::new(
        id,
        digest.into(),
        tags.into_iter().map(Into::into).collect::<HashSet<String>>(),
        updated_at,
    )
}
