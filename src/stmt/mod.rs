//! Operations and prepared-statement tracking
//!
//! An [`Operation`] is the caller-held descriptor of a CRUD or SQL
//! statement: a mutable shape (criteria, projection, ordering, limit/offset)
//! plus bound argument values. The [`PreparedStatementRegistry`] watches the
//! shape across repeated executions of the same operation and decides when
//! to send it ad hoc, prepare it, execute the prepared form, or deallocate
//! a stale preparation.

mod fingerprint;
mod operation;
mod registry;

pub use fingerprint::Fingerprint;
pub use operation::{DataModel, Operation, OperationKind, StatementBody};
pub use registry::{ExecutionPlan, PreparedStatement, PreparedStatementRegistry};
