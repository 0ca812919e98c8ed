use thiserror::Error;

use crate::graph::{referrer_subject_digest, Graph};
use crate::index::PackageIndex;

/// A post-run integrity finding. Never fails a run on its own -
/// `Orchestrator` decides whether to escalate based on configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    #[error("index manifest '{parent}' lists missing child '{child}'")]
    MissingChild { parent: String, child: String },

    #[error("referrer tag '{tag}' has no existing subject (expected '{subject}')")]
    MissingReferrerSubject { tag: String, subject: String },
}

/// Optional post-run structural scan (§4.7). Informational only: it
/// reports what survived a run in an inconsistent state, it never
/// reverses or retries anything.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, index: &PackageIndex, graph: &Graph) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        self.check_declared_children(index, graph, &mut warnings);
        self.check_referrer_subjects(index, &mut warnings);
        warnings
    }

    fn check_declared_children(&self, index: &PackageIndex, graph: &Graph, warnings: &mut Vec<ValidationWarning>) {
        for (parent, children) in &graph.declared_children {
            if !index.contains_digest(parent) {
                continue;
            }
            for child in children {
                if !index.contains_digest(child) {
                    warnings.push(ValidationWarning::MissingChild {
                        parent: parent.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
    }

    fn check_referrer_subjects(&self, index: &PackageIndex, warnings: &mut Vec<ValidationWarning>) {
        for tag in index.tags() {
            let Some(subject) = referrer_subject_digest(tag) else {
                continue;
            };
            if !index.contains_digest(&subject) {
                warnings.push(ValidationWarning::MissingReferrerSubject {
                    tag: tag.to_string(),
                    subject,
                });
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::version_at;

    #[test]
    fn test_missing_child_is_reported() {
        let index = PackageIndex::from_versions(vec![version_at(1, "sha256:parent", vec!["t"], 0)]);
        let mut graph = Graph::default();
        graph
            .declared_children
            .insert(String::from("sha256:parent"), vec![String::from("sha256:missing")]);

        let warnings = Validator::new().validate(&index, &graph);

        assert_eq!(
            warnings,
            vec![ValidationWarning::MissingChild {
                parent: String::from("sha256:parent"),
                child: String::from("sha256:missing"),
            }]
        );
    }

    #[test]
    fn test_present_children_produce_no_warning() {
        let index = PackageIndex::from_versions(vec![
            version_at(1, "sha256:parent", vec!["t"], 0),
            version_at(2, "sha256:child", Vec::<String>::new(), 0),
        ]);
        let mut graph = Graph::default();
        graph
            .declared_children
            .insert(String::from("sha256:parent"), vec![String::from("sha256:child")]);

        assert!(Validator::new().validate(&index, &graph).is_empty());
    }

    #[test]
    fn test_orphaned_referrer_tag_is_reported() {
        let hex = "f".repeat(64);
        let tag = format!("sha256-{hex}");
        let index = PackageIndex::from_versions(vec![version_at(1, "sha256:attachment", vec![&tag], 0)]);

        let warnings = Validator::new().validate(&index, &Graph::default());

        assert_eq!(
            warnings,
            vec![ValidationWarning::MissingReferrerSubject {
                tag,
                subject: format!("sha256:{hex}"),
            }]
        );
    }

    #[test]
    fn test_referrer_tag_with_existing_subject_is_fine() {
        let hex = "9".repeat(64);
        let tag = format!("sha256-{hex}");
        let subject = format!("sha256:{hex}");
        let index = PackageIndex::from_versions(vec![
            version_at(1, &subject, Vec::<String>::new(), 0),
            version_at(2, "sha256:attachment", vec![&tag], 0),
        ]);

        assert!(Validator::new().validate(&index, &Graph::default()).is_empty());
    }
}
