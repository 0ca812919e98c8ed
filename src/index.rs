use std::collections::HashMap;

use crate::package::{OwnerKind, PackageClient, PackageVersion};

/// In-memory catalogue of one package's versions, built from a single
/// `PackageClient::list_versions` pass.
///
/// Exposes three bijective views over the same underlying data -
/// digest-to-id, id-to-version, and tag-to-digest - plus a handful of
/// pure accessor methods. Mutating operations elsewhere in the engine
/// (untagging, deleting) invalidate this state; callers must
/// [`PackageIndex::reload`] to observe it.
#[derive(Debug, Default, Clone)]
pub struct PackageIndex {
    by_digest: HashMap<String, u64>,
    by_id: HashMap<u64, PackageVersion>,
    by_tag: HashMap<String, String>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(
        client: &PackageClient,
        owner: &OwnerKind,
        package: &str,
    ) -> Result<Self, crate::package::error::PackageApiError> {
        let versions = client.list_versions(owner, package).await?;
        Ok(Self::from_versions(versions))
    }

    pub fn from_versions(versions: Vec<PackageVersion>) -> Self {
        let mut index = Self::new();
        index.populate(versions);
        index
    }

    /// Rebuild all three maps from a fresh listing.
    pub async fn reload(
        &mut self,
        client: &PackageClient,
        owner: &OwnerKind,
        package: &str,
    ) -> Result<(), crate::package::error::PackageApiError> {
        let versions = client.list_versions(owner, package).await?;
        self.by_digest.clear();
        self.by_id.clear();
        self.by_tag.clear();
        self.populate(versions);
        Ok(())
    }

    fn populate(&mut self, versions: Vec<PackageVersion>) {
        for version in versions {
            self.by_digest.insert(version.digest.clone(), version.id);
            for tag in &version.tags {
                self.by_tag.insert(tag.clone(), version.digest.clone());
            }
            self.by_id.insert(version.id, version);
        }
    }

    pub fn digests(&self) -> impl Iterator<Item = &str> {
        self.by_digest.keys().map(String::as_str)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.by_tag.keys().map(String::as_str)
    }

    pub fn digest_by_tag(&self, tag: &str) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    pub fn id_by_digest(&self, digest: &str) -> Option<u64> {
        self.by_digest.get(digest).copied()
    }

    pub fn version_by_digest(&self, digest: &str) -> Option<&PackageVersion> {
        self.by_digest
            .get(digest)
            .and_then(|id| self.by_id.get(id))
    }

    pub fn version_by_id(&self, id: u64) -> Option<&PackageVersion> {
        self.by_id.get(&id)
    }

    pub fn versions(&self) -> impl Iterator<Item = &PackageVersion> {
        self.by_id.values()
    }

    pub fn contains_digest(&self, digest: &str) -> bool {
        self.by_digest.contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::version_at;

    #[test]
    fn test_populate_builds_bijective_views() {
        let versions = vec![
            version_at(1, "sha256:a", vec!["latest"], 0),
            version_at(2, "sha256:b", Vec::<String>::new(), -10),
        ];
        let index = PackageIndex::from_versions(versions);

        assert_eq!(index.len(), 2);
        assert_eq!(index.digest_by_tag("latest"), Some("sha256:a"));
        assert_eq!(index.id_by_digest("sha256:b"), Some(2));
        assert!(index.version_by_digest("sha256:a").unwrap().is_tagged());
        assert!(index.version_by_digest("sha256:b").unwrap().is_untagged());
        assert!(index.contains_digest("sha256:a"));
        assert!(!index.contains_digest("sha256:z"));
    }

    #[test]
    fn test_empty_index() {
        let index = PackageIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.digest_by_tag("anything"), None);
    }
}
