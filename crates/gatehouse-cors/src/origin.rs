//! Origin acceptance.

use std::sync::Arc;

use crate::policy::CorsPolicy;

/// A custom origin check that replaces the engine's list matching.
pub type OriginPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Builds the origin override for `policy`.
///
/// The gateway reads an empty `allow_origins` as "do not restrict", so in
/// that case every origin is accepted. A non-empty list returns `None` and the
/// engine matches origins against the list itself.
pub fn origin_predicate(policy: &CorsPolicy) -> Option<OriginPredicate> {
    if policy.allow_origins.is_empty() {
        Some(Arc::new(|_origin: &str| true))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_defers_to_engine() {
        let policy = CorsPolicy {
            allow_origins: vec!["http://a.com".to_string()],
            ..Default::default()
        };
        assert!(origin_predicate(&policy).is_none());
    }

    #[test]
    fn test_empty_list_accepts_unusual_origins() {
        let predicate = origin_predicate(&CorsPolicy::default()).unwrap();
        for origin in ["", "*", "null", "https://*.example.com", "http://münchen.de"] {
            assert!(predicate(origin), "rejected {origin:?}");
        }
    }

    proptest! {
        #[test]
        fn empty_list_accepts_any_origin(origin in ".*") {
            let predicate = origin_predicate(&CorsPolicy::default()).unwrap();
            prop_assert!(predicate(&origin));
        }
    }
}
