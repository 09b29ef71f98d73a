//! Structural operation fingerprints

use crate::stmt::Operation;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Structural hash of an operation's shape.
///
/// Covers the operation kind, data model, target, criteria text, projection,
/// ordering, and the *presence* of limit and offset. Bound argument values
/// and the limit/offset values themselves are excluded: changing only the
/// values of an otherwise identical operation keeps the fingerprint stable,
/// which is what lets repeated executions reuse a prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Compute the fingerprint of an operation's current shape
    pub fn of(op: &Operation) -> Self {
        let mut hasher = DefaultHasher::new();
        op.kind().hash(&mut hasher);
        op.data_model().hash(&mut hasher);
        op.target().hash(&mut hasher);
        op.criteria_expr().hash(&mut hasher);
        op.projection().hash(&mut hasher);
        op.ordering().hash(&mut hasher);
        op.limit_value().is_some().hash(&mut hasher);
        op.offset_value().is_some().hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    /// Raw hash value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_stable_across_repeated_calls() {
        let op = Operation::find("users").criteria("age > :a");
        assert_eq!(Fingerprint::of(&op), Fingerprint::of(&op));
    }

    #[test]
    fn test_bound_values_do_not_change_fingerprint() {
        let op = Operation::find("users")
            .criteria("age > :a")
            .bind(Value::from(30));
        let fp = Fingerprint::of(&op);
        let op = op.bind_all([Value::from(99)]);
        assert_eq!(Fingerprint::of(&op), fp);
    }

    #[test]
    fn test_limit_value_does_not_change_fingerprint() {
        let op = Operation::find("users").limit(10);
        let fp = Fingerprint::of(&op);
        let op = op.limit(500);
        assert_eq!(Fingerprint::of(&op), fp);
    }

    #[test]
    fn test_limit_presence_changes_fingerprint() {
        let without = Operation::find("users");
        let fp = Fingerprint::of(&without);
        let with = without.limit(10);
        assert_ne!(Fingerprint::of(&with), fp);
    }

    #[test]
    fn test_criteria_shape_changes_fingerprint() {
        let op = Operation::find("users").criteria("age > :a");
        let fp = Fingerprint::of(&op);
        let op = op.criteria("age < :a");
        assert_ne!(Fingerprint::of(&op), fp);
    }

    #[test]
    fn test_projection_changes_fingerprint() {
        let op = Operation::find("users");
        let fp = Fingerprint::of(&op);
        let op = op.project(["name", "age"]);
        assert_ne!(Fingerprint::of(&op), fp);
    }

    #[test]
    fn test_kind_distinguishes_operations() {
        let find = Operation::find("users");
        let delete = Operation::delete("users");
        assert_ne!(Fingerprint::of(&find), Fingerprint::of(&delete));
    }
}
