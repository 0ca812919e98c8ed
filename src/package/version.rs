use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One stored manifest in a package, as reported by the packages API.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageVersion {
    pub id: u64,
    pub digest: String,
    pub tags: HashSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl PackageVersion {
    pub fn new(id: u64, digest: String, tags: HashSet<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            digest,
            tags,
            updated_at,
        }
    }

    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn is_untagged(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Wire shape of a single entry in the packages API's version listing.
#[derive(Deserialize, Debug)]
pub struct ApiPackageVersion {
    pub id: u64,
    /// The packages API calls the digest the version's "name".
    pub name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ApiPackageMetadata,
}

#[derive(Deserialize, Debug, Default)]
pub struct ApiPackageMetadata {
    #[serde(default)]
    pub container: ApiPackageContainer,
}

#[derive(Deserialize, Debug, Default)]
pub struct ApiPackageContainer {
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<ApiPackageVersion> for PackageVersion {
    fn from(raw: ApiPackageVersion) -> Self {
        PackageVersion::new(
            raw.id,
            raw.name,
            raw.metadata.container.tags.into_iter().collect(),
            raw.updated_at,
        )
    }
}
