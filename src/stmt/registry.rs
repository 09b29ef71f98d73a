//! Per-session prepared-statement registry

use crate::stmt::Fingerprint;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// How the next execution of an operation should go over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Send the full statement ad hoc
    AdHoc,
    /// Prepare the shape under `stmt_id`, then execute it
    PrepareAndExecute {
        /// Client-local statement id to allocate
        stmt_id: u32,
    },
    /// Execute the already-prepared statement with fresh bound values
    ExecutePrepared {
        /// Client-local statement id
        stmt_id: u32,
    },
    /// Shape changed: deallocate the held statement, then execute ad hoc
    DeallocateAndAdHoc {
        /// Client-local statement id to deallocate
        stmt_id: u32,
    },
}

/// A successfully prepared statement
#[derive(Debug, Clone, Copy)]
pub struct PreparedStatement {
    /// Client-local id (recycled via the lowest-free pool)
    pub stmt_id: u32,
    /// Monotonic preparation sequence number; never recycled
    pub server_seq: u64,
    /// Shape the statement was prepared with
    pub fingerprint: Fingerprint,
}

#[derive(Debug)]
struct OperationEntry {
    baseline: Fingerprint,
    executions: u32,
    pending_id: Option<u32>,
    prepared: Option<PreparedStatement>,
}

impl OperationEntry {
    fn first(baseline: Fingerprint) -> Self {
        Self {
            baseline,
            executions: 0,
            pending_id: None,
            prepared: None,
        }
    }
}

enum Decision {
    Hit(u32),
    Invalidate(u32),
    AdHoc,
    TryPrepare,
}

/// Tracks operation shapes across executions and allocates client-local
/// statement ids.
///
/// The registry never talks to the wire itself; the session asks it for an
/// [`ExecutionPlan`] and reports back what the server said
/// ([`prepared`](Self::prepared), [`prepare_failed`](Self::prepare_failed),
/// [`deallocated`](Self::deallocated)).
#[derive(Debug)]
pub struct PreparedStatementRegistry {
    entries: HashMap<u64, OperationEntry>,
    /// Deallocated ids, reused lowest-first
    free_ids: BinaryHeap<Reverse<u32>>,
    /// Lowest id never handed out
    next_id: u32,
    /// Monotonic count of successful preparations in this session
    server_seq: u64,
    /// Sticky: set when the server ran out of prepared-statement slots
    prepares_disabled: bool,
}

impl Default for PreparedStatementRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PreparedStatementRegistry {
    /// Create an empty registry; ids start at 1
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            free_ids: BinaryHeap::new(),
            next_id: 1,
            server_seq: 0,
            prepares_disabled: false,
        }
    }

    /// Decide how to execute an operation whose current shape hashes to
    /// `fingerprint`.
    ///
    /// The first execution of a shape is always ad hoc; the second unchanged
    /// execution prepares (unless preparation is disabled for the session);
    /// later unchanged executions reuse the preparation; a shape change
    /// deallocates it.
    pub fn plan(&mut self, op_id: u64, fingerprint: Fingerprint) -> ExecutionPlan {
        let decision = {
            let entry = self
                .entries
                .entry(op_id)
                .or_insert_with(|| OperationEntry::first(fingerprint));

            if let Some(prepared) = &entry.prepared {
                if prepared.fingerprint == fingerprint {
                    entry.executions += 1;
                    Decision::Hit(prepared.stmt_id)
                } else {
                    Decision::Invalidate(prepared.stmt_id)
                }
            } else if entry.executions == 0 {
                entry.executions = 1;
                Decision::AdHoc
            } else if entry.baseline != fingerprint {
                entry.baseline = fingerprint;
                entry.executions = 1;
                Decision::AdHoc
            } else {
                Decision::TryPrepare
            }
        };

        match decision {
            Decision::Hit(stmt_id) => {
                crate::metrics::counters::stmt_cache_hit();
                ExecutionPlan::ExecutePrepared { stmt_id }
            }
            Decision::Invalidate(stmt_id) => ExecutionPlan::DeallocateAndAdHoc { stmt_id },
            Decision::AdHoc => ExecutionPlan::AdHoc,
            Decision::TryPrepare => {
                if self.prepares_disabled {
                    if let Some(entry) = self.entries.get_mut(&op_id) {
                        entry.executions += 1;
                    }
                    ExecutionPlan::AdHoc
                } else {
                    let stmt_id = self.allocate_id();
                    if let Some(entry) = self.entries.get_mut(&op_id) {
                        entry.executions += 1;
                        entry.pending_id = Some(stmt_id);
                    }
                    ExecutionPlan::PrepareAndExecute { stmt_id }
                }
            }
        }
    }

    /// Record a successful `Prepare` for the operation's pending id
    pub fn prepared(&mut self, op_id: u64) {
        if let Some(entry) = self.entries.get_mut(&op_id) {
            if let Some(stmt_id) = entry.pending_id.take() {
                self.server_seq += 1;
                entry.prepared = Some(PreparedStatement {
                    stmt_id,
                    server_seq: self.server_seq,
                    fingerprint: entry.baseline,
                });
                crate::metrics::counters::stmt_prepared();
            }
        }
    }

    /// Record a rejected `Prepare`.
    ///
    /// `resource_exhausted` marks the statement-count-exhausted case: it
    /// flips the sticky per-session flag so no further `Prepare` is ever
    /// attempted for any operation on this session.
    pub fn prepare_failed(&mut self, op_id: u64, resource_exhausted: bool) {
        let released = self
            .entries
            .get_mut(&op_id)
            .and_then(|entry| entry.pending_id.take());
        if let Some(stmt_id) = released {
            self.release_id(stmt_id);
        }

        if resource_exhausted && !self.prepares_disabled {
            self.prepares_disabled = true;
            crate::metrics::counters::stmt_degraded();
            tracing::debug!(
                "server has no prepared-statement slots left; falling back to ad hoc execution for the rest of the session"
            );
        }
    }

    /// Record a completed `Deallocate` and rebase the operation on its new
    /// shape. The freed id becomes the lowest available for the next
    /// preparation in this session.
    pub fn deallocated(&mut self, op_id: u64, new_fingerprint: Fingerprint) {
        let released = self.entries.get_mut(&op_id).and_then(|entry| {
            let prepared = entry.prepared.take();
            entry.baseline = new_fingerprint;
            entry.executions = 1;
            prepared.map(|p| p.stmt_id)
        });
        if let Some(stmt_id) = released {
            self.release_id(stmt_id);
        }
    }

    /// Whether preparation is disabled for the rest of this session
    pub fn prepares_disabled(&self) -> bool {
        self.prepares_disabled
    }

    /// Monotonic count of successful preparations in this session
    pub fn server_seq(&self) -> u64 {
        self.server_seq
    }

    /// The prepared statement currently held for an operation, if any
    pub fn prepared_for(&self, op_id: u64) -> Option<&PreparedStatement> {
        self.entries.get(&op_id)?.prepared.as_ref()
    }

    /// Number of operations tracked
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry tracks no operations
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and reset the id pool.
    ///
    /// Used on session reset; the sticky degraded flag is kept, since the
    /// underlying connection (and the server's statement capacity for it)
    /// is the same.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_ids.clear();
        self.next_id = 1;
    }

    fn allocate_id(&mut self) -> u32 {
        if let Some(Reverse(stmt_id)) = self.free_ids.pop() {
            stmt_id
        } else {
            let stmt_id = self.next_id;
            self.next_id += 1;
            stmt_id
        }
    }

    fn release_id(&mut self, stmt_id: u32) {
        self.free_ids.push(Reverse(stmt_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::Operation;

    fn fp(op: &Operation) -> Fingerprint {
        Fingerprint::of(op)
    }

    #[test]
    fn test_first_execution_is_ad_hoc() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("age > :a");
        assert_eq!(registry.plan(op.id(), fp(&op)), ExecutionPlan::AdHoc);
    }

    #[test]
    fn test_second_unchanged_execution_prepares() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("age > :a");

        assert_eq!(registry.plan(op.id(), fp(&op)), ExecutionPlan::AdHoc);
        assert_eq!(
            registry.plan(op.id(), fp(&op)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
    }

    #[test]
    fn test_prepared_executions_reuse_the_statement() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("age > :a");

        registry.plan(op.id(), fp(&op));
        registry.plan(op.id(), fp(&op));
        registry.prepared(op.id());

        for _ in 0..3 {
            assert_eq!(
                registry.plan(op.id(), fp(&op)),
                ExecutionPlan::ExecutePrepared { stmt_id: 1 }
            );
        }
    }

    #[test]
    fn test_shape_change_deallocates() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("age > :a");

        registry.plan(op.id(), fp(&op));
        registry.plan(op.id(), fp(&op));
        registry.prepared(op.id());

        let changed = op.clone().criteria("age < :a");
        assert_eq!(
            registry.plan(changed.id(), fp(&changed)),
            ExecutionPlan::DeallocateAndAdHoc { stmt_id: 1 }
        );
    }

    #[test]
    fn test_id_reuse_after_deallocate_with_monotonic_server_seq() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("age > :a");

        // Prepare under id 1.
        registry.plan(op.id(), fp(&op));
        registry.plan(op.id(), fp(&op));
        registry.prepared(op.id());
        assert_eq!(registry.server_seq(), 1);

        // Shape change frees the id.
        let changed = op.clone().criteria("age < :a");
        registry.plan(changed.id(), fp(&changed));
        registry.deallocated(changed.id(), fp(&changed));

        // The next preparation reuses the lowest free id but advances the
        // preparation sequence.
        assert_eq!(
            registry.plan(changed.id(), fp(&changed)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
        registry.prepared(changed.id());
        assert_eq!(registry.server_seq(), 2);
        assert_eq!(
            registry.prepared_for(changed.id()).unwrap().server_seq,
            2
        );
    }

    #[test]
    fn test_ids_are_unique_across_operations() {
        let mut registry = PreparedStatementRegistry::new();
        let a = Operation::find("users").criteria("x = :v");
        let b = Operation::find("orders").criteria("y = :v");

        registry.plan(a.id(), fp(&a));
        registry.plan(b.id(), fp(&b));
        let plan_a = registry.plan(a.id(), fp(&a));
        registry.prepared(a.id());
        let plan_b = registry.plan(b.id(), fp(&b));
        registry.prepared(b.id());

        assert_eq!(plan_a, ExecutionPlan::PrepareAndExecute { stmt_id: 1 });
        assert_eq!(plan_b, ExecutionPlan::PrepareAndExecute { stmt_id: 2 });
    }

    #[test]
    fn test_freed_id_goes_to_next_preparation_of_any_operation() {
        let mut registry = PreparedStatementRegistry::new();
        let a = Operation::find("users").criteria("x = :v");
        let b = Operation::find("orders").criteria("y = :v");

        registry.plan(a.id(), fp(&a));
        registry.plan(a.id(), fp(&a));
        registry.prepared(a.id());

        // a's shape changes, freeing id 1.
        let a = a.criteria("x != :v");
        registry.plan(a.id(), fp(&a));
        registry.deallocated(a.id(), fp(&a));

        // b prepares next and picks up the freed id.
        registry.plan(b.id(), fp(&b));
        assert_eq!(
            registry.plan(b.id(), fp(&b)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
    }

    #[test]
    fn test_resource_rejection_disables_preparation_for_the_session() {
        let mut registry = PreparedStatementRegistry::new();
        let a = Operation::find("users").criteria("x = :v");
        let b = Operation::find("orders").criteria("y = :v");

        registry.plan(a.id(), fp(&a));
        assert_eq!(
            registry.plan(a.id(), fp(&a)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
        registry.prepare_failed(a.id(), true);
        assert!(registry.prepares_disabled());

        // No further prepare attempts, for this or any other operation.
        assert_eq!(registry.plan(a.id(), fp(&a)), ExecutionPlan::AdHoc);
        registry.plan(b.id(), fp(&b));
        assert_eq!(registry.plan(b.id(), fp(&b)), ExecutionPlan::AdHoc);
    }

    #[test]
    fn test_non_resource_rejection_keeps_preparation_enabled() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("x = :v");

        registry.plan(op.id(), fp(&op));
        registry.plan(op.id(), fp(&op));
        registry.prepare_failed(op.id(), false);
        assert!(!registry.prepares_disabled());

        // The freed id is available again for the next attempt.
        assert_eq!(
            registry.plan(op.id(), fp(&op)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
    }

    #[test]
    fn test_clear_resets_id_pool_but_keeps_degraded_flag() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users").criteria("x = :v");

        registry.plan(op.id(), fp(&op));
        registry.plan(op.id(), fp(&op));
        registry.prepared(op.id());
        registry.prepare_failed(op.id(), true);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.prepares_disabled());

        // Ids restart at the lowest value...
        let op2 = Operation::find("other").criteria("x = :v");
        registry.plan(op2.id(), fp(&op2));
        // ...but the degraded flag still suppresses preparation.
        assert_eq!(registry.plan(op2.id(), fp(&op2)), ExecutionPlan::AdHoc);
    }

    #[test]
    fn test_value_only_change_still_prepares() {
        let mut registry = PreparedStatementRegistry::new();
        let op = Operation::find("users")
            .criteria("age > :a")
            .bind(serde_json::Value::from(30));

        registry.plan(op.id(), fp(&op));
        let op = op.bind_all([serde_json::Value::from(60)]);
        assert_eq!(
            registry.plan(op.id(), fp(&op)),
            ExecutionPlan::PrepareAndExecute { stmt_id: 1 }
        );
    }
}
