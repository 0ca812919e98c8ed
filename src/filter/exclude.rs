use crate::filter::parsing::PatternSet;
use crate::filter::FilterState;
use crate::index::PackageIndex;

/// Stage A - exclude. Removes every digest whose tag matches the
/// exclude pattern from `filter_set` and records the matched tags so
/// later stages never re-add them.
#[derive(Debug, Default)]
pub struct ExcludeStage {
    pattern: Option<PatternSet>,
}

impl ExcludeStage {
    pub fn new(pattern: Option<PatternSet>) -> Self {
        Self { pattern }
    }

    pub fn apply(&self, state: &mut FilterState, index: &PackageIndex) {
        let Some(pattern) = &self.pattern else {
            return;
        };

        for tag in index.tags() {
            if !pattern.matches(tag) {
                continue;
            }
            if let Some(digest) = index.digest_by_tag(tag) {
                state.filter_set.remove(digest);
            }
            state.excluded_tags.insert(tag.to_string());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::filter::parsing::parse_pattern_set;
    use crate::test::version_at;

    fn fixture_index() -> PackageIndex {
        PackageIndex::from_versions(vec![
            version_at(1, "sha256:a", vec!["dummy"], 0),
            version_at(2, "sha256:b", vec!["keep-me"], -1),
            version_at(3, "sha256:c", Vec::<String>::new(), -2),
        ])
    }

    #[test]
    fn test_exclude_removes_matching_digest() {
        let index = fixture_index();
        let mut state = FilterState::seed(["sha256:a", "sha256:b", "sha256:c"].map(String::from).into());
        let stage = ExcludeStage::new(parse_pattern_set("dummy", false));

        stage.apply(&mut state, &index);

        assert!(!state.filter_set.contains("sha256:a"));
        assert!(state.filter_set.contains("sha256:b"));
        assert!(state.excluded_tags.contains("dummy"));
    }

    #[test]
    fn test_no_pattern_is_noop() {
        let index = fixture_index();
        let mut state = FilterState::seed(["sha256:a", "sha256:b"].map(String::from).into());
        let stage = ExcludeStage::new(None);

        stage.apply(&mut state, &index);

        assert_eq!(state.filter_set.len(), 2);
        assert!(state.excluded_tags.is_empty());
    }
}
