use std::collections::{HashMap, HashSet};

use log::{trace, warn};

use crate::api::error::ApiError;
use crate::api::registry::RegistryClient;
use crate::index::PackageIndex;
use crate::manifest::Manifest;

/// The `usedBy` relation plus referrer-tag bookkeeping for one package.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    /// child digest -> set of parent (index) digests that list it
    pub used_by: HashMap<String, HashSet<String>>,
    /// subject digest -> set of referrer (attachment) digests attached to it
    pub referrers: HashMap<String, HashSet<String>>,
    /// index digest -> every child digest it declares, present or not.
    /// Unlike `used_by`, this records declarations regardless of whether
    /// the child exists as a version - ghost/partial detection needs to
    /// tell "no children exist" from "no children are declared".
    pub declared_children: HashMap<String, Vec<String>>,
}

impl Graph {
    /// The set of digests that are children of some index manifest, or
    /// are themselves referrer attachments of some top-level digest.
    /// Policies never consider these directly - only top-level digests.
    pub fn children_of_top_level(&self) -> HashSet<String> {
        let mut children: HashSet<String> = self.used_by.keys().cloned().collect();
        for targets in self.referrers.values() {
            children.extend(targets.iter().cloned());
        }
        children
    }

    pub fn top_level_digests(&self, index: &PackageIndex) -> HashSet<String> {
        let children = self.children_of_top_level();
        index
            .digests()
            .filter(|digest| !children.contains(*digest))
            .map(String::from)
            .collect()
    }

    pub fn parents_of(&self, digest: &str) -> Option<&HashSet<String>> {
        self.used_by.get(digest)
    }

    pub fn referrers_of(&self, digest: &str) -> Option<&HashSet<String>> {
        self.referrers.get(digest)
    }
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Walk every digest in `index`, fetch its manifest, and build the
    /// `usedBy` relation and referrer-tag set.
    pub async fn build(
        index: &PackageIndex,
        registry: &mut RegistryClient,
    ) -> Result<Graph, ApiError> {
        let mut used_by: HashMap<String, HashSet<String>> = HashMap::new();
        let mut declared_children: HashMap<String, Vec<String>> = HashMap::new();

        let digests: Vec<String> = index.digests().map(String::from).collect();
        for digest in &digests {
            let manifest = match registry.get_manifest_by_digest(digest).await {
                Ok(manifest) => manifest,
                Err(ApiError::NotFound) => {
                    warn!("Manifest for digest '{digest}' is missing; skipping in graph build");
                    continue;
                }
                Err(err) => return Err(err),
            };
            trace!("parsed manifest for '{digest}': {manifest:?}");

            if let Manifest::Index { .. } = &manifest {
                let children: Vec<String> = manifest.children().iter().map(|c| c.digest.clone()).collect();
                for child_digest in &children {
                    if index.contains_digest(child_digest) {
                        used_by
                            .entry(child_digest.clone())
                            .or_default()
                            .insert(digest.clone());
                    }
                }
                declared_children.insert(digest.clone(), children);
            }
        }

        let referrers = discover_referrers(index);

        Ok(Graph {
            used_by,
            referrers,
            declared_children,
        })
    }
}

fn discover_referrers(index: &PackageIndex) -> HashMap<String, HashSet<String>> {
    let mut referrers: HashMap<String, HashSet<String>> = HashMap::new();
    for tag in index.tags() {
        let Some(subject_digest) = referrer_subject_digest(tag) else {
            continue;
        };
        if !index.contains_digest(&subject_digest) {
            continue;
        }
        if let Some(target_digest) = index.digest_by_tag(tag) {
            referrers
                .entry(subject_digest)
                .or_default()
                .insert(target_digest.to_string());
        }
    }
    referrers
}

/// Identify whether `tag` names a referrer attachment, returning the
/// subject digest it attaches to. Matches the authoritative
/// prefix-match-with-71-char-trim rule: `sha256-<64 lowercase hex>`
/// possibly followed by an arbitrary suffix (the exact-match-only
/// variant from earlier tool revisions is superseded).
pub fn referrer_subject_digest(tag: &str) -> Option<String> {
    let rest = tag.strip_prefix("sha256-")?;
    if rest.len() < 64 {
        return None;
    }
    let hex = &rest[..64];
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("sha256:{hex}"))
}
