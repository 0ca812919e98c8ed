use std::collections::HashSet;

use log::{debug, info, warn};

use crate::api::error::ApiError;
use crate::api::registry::RegistryClient;
use crate::error::Error;
use crate::graph::{referrer_subject_digest, Graph};
use crate::index::PackageIndex;
use crate::manifest::{child_label, Manifest};
use crate::package::client::PackageClient;
use crate::package::OwnerKind;

/// Performs the ordered deletions a filter pipeline run selects: the
/// untag protocol and the standard (possibly recursive) delete.
pub struct Executor {
    registry: RegistryClient,
    package_client: PackageClient,
    owner: OwnerKind,
    package: String,
    dry_run: bool,
}

impl Executor {
    pub fn new(
        registry: RegistryClient,
        package_client: PackageClient,
        owner: OwnerKind,
        package: String,
        dry_run: bool,
    ) -> Self {
        Self {
            registry,
            package_client,
            owner,
            package,
            dry_run,
        }
    }

    pub fn registry_mut(&mut self) -> &mut RegistryClient {
        &mut self.registry
    }

    /// Expose the packages-API client so the orchestrator can reload the
    /// index one final time before an optional post-run validation pass,
    /// without threading a second client instance through.
    pub fn package_client(&self) -> &PackageClient {
        &self.package_client
    }

    /// Warm the manifest cache for every candidate before any delete
    /// call executes, so a network failure mid-run can't leave child
    /// labelling half-done.
    pub async fn prefetch(&mut self, candidates: &HashSet<String>) -> Result<(), Error> {
        for digest in candidates {
            match self.registry.get_manifest_by_digest(digest).await {
                Ok(_) => {}
                Err(ApiError::NotFound) => {
                    warn!("Manifest for digest '{digest}' is missing during prefetch; will be recorded as missing when deleted");
                }
                Err(err) => return Err(Error::from(err)),
            }
        }
        Ok(())
    }

    /// Delete `root_digest`, cascading into children that become
    /// unshared and referrer attachments of every digest deleted along
    /// the way. Implemented as an explicit worklist rather than
    /// recursion: Rust's `async fn` cannot call itself directly without
    /// manually boxing the future, and a worklist reads just as clearly
    /// here while keeping every `.await` a plain sequential suspension
    /// point, per the single-call-at-a-time model.
    pub async fn delete_standard(
        &mut self,
        root_digest: &str,
        index: &mut PackageIndex,
        graph: &mut Graph,
        excluded_tags: &HashSet<String>,
        deleted: &mut HashSet<String>,
    ) -> Result<(), Error> {
        let mut queue = vec![root_digest.to_string()];

        while let Some(digest) = queue.pop() {
            if deleted.contains(&digest) {
                continue;
            }

            let manifest = match self.registry.get_manifest_by_digest(&digest).await {
                Ok(manifest) => Some(manifest),
                Err(ApiError::NotFound) => {
                    warn!("Manifest for digest '{digest}' is missing; deleting the version without child cleanup");
                    None
                }
                Err(err) => return Err(Error::from(err)),
            };

            if let Some(id) = index.id_by_digest(&digest) {
                self.package_client.delete_version(&self.owner, &self.package, id).await?;
            }
            deleted.insert(digest.clone());

            if let Some(Manifest::Index { manifests: children, .. }) = &manifest {
                for child in children {
                    let Some(parents) = graph.used_by.get_mut(&child.digest) else {
                        continue;
                    };
                    parents.remove(&digest);

                    if parents.is_empty() {
                        graph.used_by.remove(&child.digest);
                        if index.contains_digest(&child.digest) {
                            let label = child_label(child, self.registry.cached(&child.digest));
                            info!("deleting child '{}' ({label}) of '{digest}'", child.digest);
                            queue.push(child.digest.clone());
                        }
                    } else {
                        debug!(
                            "retaining child '{}': still used by {} other parent(s)",
                            child.digest,
                            parents.len()
                        );
                    }
                }
            }

            for tag in index.tags().map(String::from).collect::<Vec<_>>() {
                if excluded_tags.contains(&tag) {
                    continue;
                }
                if referrer_subject_digest(&tag).as_deref() != Some(digest.as_str()) {
                    continue;
                }
                if let Some(target) = index.digest_by_tag(&tag).map(String::from) {
                    info!("cascading into referrer '{tag}' of '{digest}'");
                    queue.push(target);
                }
            }
        }

        Ok(())
    }

    /// The untag protocol: rebind `tag` off `digest` by uploading a
    /// content-empty substitute manifest, then delete the ephemeral
    /// version the registry creates for it. A `PutManifest` failure
    /// aborts only this tag; the caller continues with the rest.
    ///
    /// In dry-run mode the protocol never reaches the registry at all -
    /// `PutManifest` would itself rebind the tag to a real new digest,
    /// which is an observable mutation no `dry_run` check downstream
    /// could undo. Logging the intended action and returning is the only
    /// way to keep `PackageIndex` identical before and after.
    pub async fn untag(&mut self, tag: &str, digest: &str, index: &mut PackageIndex) -> Result<(), Error> {
        if self.dry_run {
            info!("Dry run: would untag '{tag}' from '{digest}'");
            return Ok(());
        }

        let manifest = self.registry.get_manifest_by_tag(tag, digest).await?;
        let emptied = manifest.emptied();

        if let Err(err) = self.registry.put_manifest(tag, &emptied).await {
            log::error!("Failed to untag '{tag}' on '{digest}'. Reason: {err}");
            return Ok(());
        }

        index.reload(&self.package_client, &self.owner, &self.package).await?;

        let Some(ephemeral_digest) = index.digest_by_tag(tag).map(String::from) else {
            warn!("Tag '{tag}' did not reappear after untagging; nothing to clean up");
            return Ok(());
        };
        let Some(ephemeral_id) = index.id_by_digest(&ephemeral_digest) else {
            warn!("Ephemeral version for tag '{tag}' (digest '{ephemeral_digest}') vanished before cleanup");
            return Ok(());
        };

        self.package_client
            .delete_version(&self.owner, &self.package, ephemeral_id)
            .await?;
        index.reload(&self.package_client, &self.owner, &self.package).await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::api::registry::{RegistryClient, RegistryConfig};
    use crate::manifest::{LayerDescriptor, ManifestDescriptor, Platform};
    use crate::package::client::PackageClient;
    use crate::test::version_at;

    use super::*;

    // The package client runs in dry-run mode throughout: `delete_version`
    // becomes a no-op, so `delete_standard`'s graph/index bookkeeping can
    // be exercised without a live packages API. Every manifest the test
    // needs is seeded into the registry's cache up front for the same
    // reason.
    fn executor_with_seeded_manifests(manifests: Vec<(&str, Manifest)>) -> Executor {
        let config = Arc::new(RegistryConfig::new("ghcr.io", "acme", "widgets"));
        let mut registry = RegistryClient::new(config, None).expect("client should build");
        for (digest, manifest) in manifests {
            registry.seed_cache(digest, manifest);
        }
        let package_client = PackageClient::new("token", true).expect("client should build");
        Executor::new(
            registry,
            package_client,
            OwnerKind::Organization(String::from("acme")),
            String::from("widgets"),
            false,
        )
    }

    fn image(digest: &str) -> Manifest {
        Manifest::Image {
            media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
            layers: vec![LayerDescriptor {
                media_type: String::from("application/vnd.oci.image.layer.v1.tar+gzip"),
                digest: digest.to_string(),
                size: 1,
            }],
        }
    }

    fn index_manifest(children: Vec<&str>) -> Manifest {
        Manifest::Index {
            media_type: String::from("application/vnd.oci.image.index.v1+json"),
            manifests: children
                .into_iter()
                .map(|digest| ManifestDescriptor {
                    digest: digest.to_string(),
                    media_type: String::from("application/vnd.oci.image.manifest.v1+json"),
                    size: 1,
                    platform: Some(Platform {
                        architecture: String::from("amd64"),
                        variant: None,
                    }),
                    artifact_type: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_delete_standard_cascades_into_unshared_child() {
        let mut executor = executor_with_seeded_manifests(vec![
            ("sha256:parent", index_manifest(vec!["sha256:child"])),
            ("sha256:child", image("sha256:layer")),
        ]);
        let mut index = PackageIndex::from_versions(vec![
            version_at(1, "sha256:parent", vec!["image1"], 0),
            version_at(2, "sha256:child", Vec::<String>::new(), 0),
        ]);
        let mut graph = Graph::default();
        graph
            .used_by
            .insert(String::from("sha256:child"), HashSet::from([String::from("sha256:parent")]));
        let mut deleted = HashSet::new();

        executor
            .delete_standard("sha256:parent", &mut index, &mut graph, &HashSet::new(), &mut deleted)
            .await
            .expect("delete should succeed");

        assert!(deleted.contains("sha256:parent"));
        assert!(deleted.contains("sha256:child"));
        assert!(!graph.used_by.contains_key("sha256:child"));
    }

    #[tokio::test]
    async fn test_delete_standard_retains_shared_child() {
        let mut executor = executor_with_seeded_manifests(vec![(
            "sha256:parent1",
            index_manifest(vec!["sha256:shared"]),
        )]);
        let mut index = PackageIndex::from_versions(vec![
            version_at(1, "sha256:parent1", vec!["image1"], 0),
            version_at(2, "sha256:parent2", vec!["image2"], 0),
            version_at(3, "sha256:shared", Vec::<String>::new(), 0),
        ]);
        let mut graph = Graph::default();
        graph.used_by.insert(
            String::from("sha256:shared"),
            HashSet::from([String::from("sha256:parent1"), String::from("sha256:parent2")]),
        );
        let mut deleted = HashSet::new();

        executor
            .delete_standard("sha256:parent1", &mut index, &mut graph, &HashSet::new(), &mut deleted)
            .await
            .expect("delete should succeed");

        assert!(deleted.contains("sha256:parent1"));
        assert!(!deleted.contains("sha256:shared"));
        let remaining_parents = graph.used_by.get("sha256:shared").expect("still tracked");
        assert_eq!(remaining_parents.len(), 1);
        assert!(remaining_parents.contains("sha256:parent2"));
    }

    #[tokio::test]
    async fn test_delete_standard_cascades_into_referrer() {
        let hex = "e".repeat(64);
        let subject_tag = format!("sha256-{hex}");
        let subject_digest = format!("sha256:{hex}");
        let mut executor = executor_with_seeded_manifests(vec![(subject_digest.as_str(), image("sha256:layer"))]);
        let mut index = PackageIndex::from_versions(vec![
            version_at(1, &subject_digest, vec!["image1"], 0),
            version_at(2, "sha256:attestation", vec![&subject_tag], 0),
        ]);
        let mut graph = Graph::default();
        let mut deleted = HashSet::new();

        executor
            .delete_standard(&subject_digest, &mut index, &mut graph, &HashSet::new(), &mut deleted)
            .await
            .expect("delete should succeed");

        assert!(deleted.contains(subject_digest.as_str()));
        assert!(deleted.contains("sha256:attestation"));
    }

    #[tokio::test]
    async fn test_delete_standard_is_guarded_against_revisits() {
        let mut executor = executor_with_seeded_manifests(vec![("sha256:a", image("sha256:layer"))]);
        let mut index = PackageIndex::from_versions(vec![version_at(1, "sha256:a", vec!["t"], 0)]);
        let mut graph = Graph::default();
        let mut deleted = HashSet::from([String::from("sha256:a")]);

        executor
            .delete_standard("sha256:a", &mut index, &mut graph, &HashSet::new(), &mut deleted)
            .await
            .expect("delete should succeed");

        assert_eq!(deleted.len(), 1);
    }

    #[tokio::test]
    async fn test_untag_is_a_noop_in_dry_run() {
        let mut executor = executor_with_seeded_manifests(vec![]);
        executor.dry_run = true;
        let mut index = PackageIndex::from_versions(vec![version_at(1, "sha256:a", vec!["tag1", "tag2"], 0)]);

        executor
            .untag("tag1", "sha256:a", &mut index)
            .await
            .expect("dry-run untag should succeed");

        assert_eq!(index.digest_by_tag("tag1"), Some("sha256:a"));
        assert_eq!(index.digest_by_tag("tag2"), Some("sha256:a"));
        assert_eq!(index.len(), 1);
    }
}
