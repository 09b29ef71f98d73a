//! Operation descriptors

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

// Process-wide operation handle counter; ids only need to be unique, not dense.
static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Read documents or rows
    Find,
    /// Insert documents or rows
    Insert,
    /// Update matching documents or rows
    Update,
    /// Delete matching documents or rows
    Delete,
    /// Plain SQL statement
    Sql,
}

/// Data model the operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataModel {
    /// Document collections
    Document,
    /// Relational tables
    Table,
}

/// The wire-facing body of a statement: shape plus bound values.
///
/// For `Prepare` frames the body is sent with `args` empty (the shape is
/// what the server caches); the values follow in each `Execute`.
#[derive(Debug, Clone)]
pub struct StatementBody {
    /// Operation kind
    pub kind: OperationKind,
    /// Data model
    pub data_model: DataModel,
    /// Collection/table name, or the SQL text for [`OperationKind::Sql`]
    pub target: String,
    /// Criteria expression with named placeholders (e.g. `"age > :a"`)
    pub criteria: Option<String>,
    /// Projected fields/columns
    pub projection: Vec<String>,
    /// Ordering expressions
    pub ordering: Vec<String>,
    /// Row limit
    pub limit: Option<u64>,
    /// Row offset
    pub offset: Option<u64>,
    /// Bound argument values
    pub args: Vec<Value>,
}

/// A caller-held operation handle.
///
/// The handle keeps its identity (and therefore its prepared-statement
/// history) across executions while its shape may be changed between them:
///
/// ```ignore
/// let mut op = Operation::find("users").criteria("age > :a").bind(30.into());
/// session.execute(&op).await?;          // ad hoc
/// session.execute(&op).await?;          // prepared
/// op = op.criteria("age < :a");         // shape change
/// session.execute(&op).await?;          // deallocate + ad hoc
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    id: u64,
    kind: OperationKind,
    data_model: DataModel,
    target: String,
    criteria: Option<String>,
    projection: Vec<String>,
    ordering: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    args: Vec<Value>,
}

impl Operation {
    fn new(kind: OperationKind, data_model: DataModel, target: impl Into<String>) -> Self {
        Self {
            id: NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            data_model,
            target: target.into(),
            criteria: None,
            projection: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            args: Vec::new(),
        }
    }

    /// Find documents in a collection
    pub fn find(collection: impl Into<String>) -> Self {
        Self::new(OperationKind::Find, DataModel::Document, collection)
    }

    /// Insert documents into a collection
    pub fn insert(collection: impl Into<String>) -> Self {
        Self::new(OperationKind::Insert, DataModel::Document, collection)
    }

    /// Update documents in a collection
    pub fn update(collection: impl Into<String>) -> Self {
        Self::new(OperationKind::Update, DataModel::Document, collection)
    }

    /// Delete documents from a collection
    pub fn delete(collection: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, DataModel::Document, collection)
    }

    /// Select rows from a table
    pub fn select(table: impl Into<String>) -> Self {
        Self::new(OperationKind::Find, DataModel::Table, table)
    }

    /// Plain SQL statement with placeholders
    pub fn sql(statement: impl Into<String>) -> Self {
        Self::new(OperationKind::Sql, DataModel::Table, statement)
    }

    /// Set the criteria expression
    pub fn criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    /// Set the projected fields/columns
    pub fn project(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the ordering expressions
    pub fn order_by(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ordering = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the row limit
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Append one bound argument value
    pub fn bind(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Replace all bound argument values
    pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Process-unique handle id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Operation kind
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Data model
    pub fn data_model(&self) -> DataModel {
        self.data_model
    }

    /// Target collection/table (or SQL text)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Criteria expression, if set
    pub fn criteria_expr(&self) -> Option<&str> {
        self.criteria.as_deref()
    }

    /// Projected fields
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    /// Ordering expressions
    pub fn ordering(&self) -> &[String] {
        &self.ordering
    }

    /// Row limit, if set
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Row offset, if set
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    /// Bound argument values
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Full wire body: shape plus bound values
    pub fn body(&self) -> StatementBody {
        StatementBody {
            kind: self.kind,
            data_model: self.data_model,
            target: self.target.clone(),
            criteria: self.criteria.clone(),
            projection: self.projection.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            offset: self.offset,
            args: self.args.clone(),
        }
    }

    /// Shape-only wire body for `Prepare` frames (bound values omitted)
    pub fn shape_body(&self) -> StatementBody {
        let mut body = self.body();
        body.args = Vec::new();
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_ids_are_unique() {
        let a = Operation::find("users");
        let b = Operation::find("users");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_shape_mutation_keeps_identity() {
        let op = Operation::find("users").criteria("age > :a");
        let id = op.id();
        let op = op.criteria("age < :a").limit(10);
        assert_eq!(op.id(), id);
        assert_eq!(op.criteria_expr(), Some("age < :a"));
        assert_eq!(op.limit_value(), Some(10));
    }

    #[test]
    fn test_shape_body_drops_args() {
        let op = Operation::find("users")
            .criteria("age > :a")
            .bind(Value::from(30));
        assert_eq!(op.body().args.len(), 1);
        assert!(op.shape_body().args.is_empty());
    }

    #[test]
    fn test_bind_all_replaces() {
        let op = Operation::sql("SELECT ? + ?")
            .bind(Value::from(1))
            .bind_all([Value::from(2), Value::from(3)]);
        assert_eq!(op.args().len(), 2);
    }
}
