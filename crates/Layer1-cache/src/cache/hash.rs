//! Cache key hashing

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// 64-bit hash of any hashable value (stable within one process)
pub fn compute_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of a JSON value, independent of object key order.
///
/// `serde_json::Map` keeps keys sorted, so the compact serialization is
/// already canonical.
pub fn hash_json(value: &serde_json::Value) -> u64 {
    compute_hash(&value.to_string())
}

/// Fingerprint of a search: `hash(project_path, query)`
pub fn search_fingerprint(project: &Path, query: &str) -> u64 {
    compute_hash(&(project, query))
}

/// Opaque computed-value key built from a namespace and JSON arguments,
/// e.g. `computed_key("outline", &json!({"path": "/a.rs"}))`.
///
/// The namespace stays readable so `invalidate_computed("outline")` can
/// match it as a substring.
pub fn computed_key(namespace: &str, args: &serde_json::Value) -> String {
    format!("{}:{:016x}", namespace, hash_json(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_fingerprint() {
        let a = search_fingerprint(Path::new("/proj"), "todo");
        let b = search_fingerprint(Path::new("/proj"), "todo");
        let c = search_fingerprint(Path::new("/proj"), "fixme");
        let d = search_fingerprint(Path::new("/other"), "todo");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_computed_key_ignores_key_order() {
        let k1 = computed_key("outline", &json!({"path": "/a.rs", "depth": 2}));
        let k2 = computed_key("outline", &json!({"depth": 2, "path": "/a.rs"}));
        let k3 = computed_key("outline", &json!({"depth": 3, "path": "/a.rs"}));

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert!(k1.starts_with("outline:"));
    }
}
