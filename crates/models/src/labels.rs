use std::collections::BTreeMap;

/// Labels attach key/value pairs to a document. They are consulted by the
/// `parentSelector` of other documents during parent selection.
pub type Labels = BTreeMap<String, String>;

/// True if every key/value pair of `selector` is present in `labels`.
/// An empty selector matches nothing during parent selection (it marks a
/// root document), so callers check for emptiness before matching.
pub fn selector_matches(selector: &Labels, labels: &Labels) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

#[cfg(test)]
mod test {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_selector_matching() {
        let target = labels(&[("tier", "global"), ("name", "network")]);

        assert!(selector_matches(&labels(&[("tier", "global")]), &target));
        assert!(selector_matches(
            &labels(&[("tier", "global"), ("name", "network")]),
            &target,
        ));
        // Value mismatch.
        assert!(!selector_matches(&labels(&[("tier", "site")]), &target));
        // Key absent from the target.
        assert!(!selector_matches(&labels(&[("zone", "a")]), &target));
        // The empty selector vacuously matches; callers treat it as "root".
        assert!(selector_matches(&labels(&[]), &target));
    }
}
