//! Logical sessions
//!
//! A [`Session`] owns exactly one channel and serializes request/response
//! pairs over it: the protocol is strict request/response, so a session
//! never has two statements in flight. Each execution consults the
//! per-session [`PreparedStatementRegistry`] to decide between ad hoc,
//! prepare, prepared-execute, and deallocate message sequences.

use crate::auth::AuthMechanism;
use crate::connection::{Channel, SessionState};
use crate::protocol::constants::ER_MAX_PREPARED_STMT_COUNT_REACHED;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::stmt::{ExecutionPlan, Fingerprint, Operation, PreparedStatementRegistry};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Result of one statement execution.
///
/// Column metadata, rows, and notices are opaque to the session layer; the
/// embedding driver decodes them.
#[derive(Debug, Clone, Default)]
pub struct StatementResult {
    columns: Vec<Bytes>,
    rows: Vec<Bytes>,
    notices: Vec<Bytes>,
}

impl StatementResult {
    /// Raw column metadata payloads
    pub fn columns(&self) -> &[Bytes] {
        &self.columns
    }

    /// Raw row payloads
    pub fn rows(&self) -> &[Bytes] {
        &self.rows
    }

    /// Raw notice payloads received during execution
    pub fn notices(&self) -> &[Bytes] {
        &self.notices
    }

    /// Number of rows received
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A logical session over one authenticated channel
pub struct Session {
    id: u64,
    channel: Box<dyn Channel>,
    state: SessionState,
    registry: PreparedStatementRegistry,
    mechanism: AuthMechanism,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("mechanism", &self.mechanism)
            .finish()
    }
}

impl Session {
    /// Create a session from an authenticated channel
    pub fn new(channel: Box<dyn Channel>, mechanism: AuthMechanism) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            state: SessionState::Open,
            registry: PreparedStatementRegistry::new(),
            mechanism,
        }
    }

    /// Process-unique session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The mechanism that authenticated this session
    pub fn auth_mechanism(&self) -> AuthMechanism {
        self.mechanism
    }

    /// Whether the session can execute statements
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Execute an operation.
    ///
    /// The first execution of a shape goes out ad hoc; an unchanged repeat
    /// is prepared and thereafter executed by id; a shape change deallocates
    /// the stale preparation. A server rejection of `Prepare` for resource
    /// reasons is absorbed: the statement still executes ad hoc and the
    /// session stops preparing for its remaining lifetime.
    pub async fn execute(&mut self, op: &Operation) -> Result<StatementResult> {
        if self.state != SessionState::Open {
            return Err(Error::SessionBusy(format!(
                "session in state: {}",
                self.state
            )));
        }

        let fingerprint = Fingerprint::of(op);
        let plan = self.registry.plan(op.id(), fingerprint);
        tracing::debug!(session = self.id, op = op.id(), ?plan, "executing operation");

        let result = self.dispatch(op, plan, fingerprint).await;
        if let Err(err) = &result {
            if err.is_fatal() {
                let _ = self.state.transition(SessionState::Closed);
            }
        }
        result
    }

    async fn dispatch(
        &mut self,
        op: &Operation,
        plan: ExecutionPlan,
        fingerprint: Fingerprint,
    ) -> Result<StatementResult> {
        match plan {
            ExecutionPlan::AdHoc => self.execute_ad_hoc(op).await,
            ExecutionPlan::ExecutePrepared { stmt_id } => {
                self.channel
                    .send(&ClientMessage::PrepareExecute {
                        stmt_id,
                        args: op.args().to_vec(),
                    })
                    .await?;
                self.read_result().await
            }
            ExecutionPlan::PrepareAndExecute { stmt_id } => {
                self.prepare_and_execute(op, stmt_id).await
            }
            ExecutionPlan::DeallocateAndAdHoc { stmt_id } => {
                self.deallocate(stmt_id).await?;
                self.registry.deallocated(op.id(), fingerprint);
                self.execute_ad_hoc(op).await
            }
        }
    }

    async fn execute_ad_hoc(&mut self, op: &Operation) -> Result<StatementResult> {
        self.channel
            .send(&ClientMessage::StmtExecute { stmt: op.body() })
            .await?;
        self.read_result().await
    }

    async fn prepare_and_execute(
        &mut self,
        op: &Operation,
        stmt_id: u32,
    ) -> Result<StatementResult> {
        self.channel
            .send(&ClientMessage::PreparePrepare {
                stmt_id,
                stmt: op.shape_body(),
            })
            .await?;

        match self.channel.recv().await? {
            ServerMessage::Ok => {
                self.registry.prepared(op.id());
                self.channel
                    .send(&ClientMessage::PrepareExecute {
                        stmt_id,
                        args: op.args().to_vec(),
                    })
                    .await?;
                self.read_result().await
            }
            ServerMessage::Error(err) if err.code == ER_MAX_PREPARED_STMT_COUNT_REACHED => {
                // Resource exhaustion is absorbed: run ad hoc, stop preparing.
                self.registry.prepare_failed(op.id(), true);
                self.execute_ad_hoc(op).await
            }
            ServerMessage::Error(err) => {
                self.registry.prepare_failed(op.id(), false);
                Err(err.into())
            }
            other => Err(Error::Protocol(format!(
                "unexpected response to Prepare: {:?}",
                other
            ))),
        }
    }

    async fn deallocate(&mut self, stmt_id: u32) -> Result<()> {
        self.channel
            .send(&ClientMessage::PrepareDeallocate { stmt_id })
            .await?;
        match self.channel.recv().await? {
            ServerMessage::Ok => Ok(()),
            ServerMessage::Error(err) => {
                // The statement is gone either way; the client id is freed by
                // the caller.
                tracing::debug!(stmt_id, error = %err, "deallocate rejected");
                Ok(())
            }
            other => Err(Error::Protocol(format!(
                "unexpected response to Deallocate: {:?}",
                other
            ))),
        }
    }

    async fn read_result(&mut self) -> Result<StatementResult> {
        let mut result = StatementResult::default();
        loop {
            match self.channel.recv().await? {
                ServerMessage::Column(meta) => result.columns.push(meta),
                ServerMessage::Row(data) => result.rows.push(data),
                ServerMessage::Notice(notice) => result.notices.push(notice),
                ServerMessage::FetchDone => {}
                ServerMessage::StmtExecuteOk => return Ok(result),
                ServerMessage::Error(err) => return Err(err.into()),
                other => {
                    return Err(Error::Protocol(format!(
                        "unexpected message in result stream: {:?}",
                        other
                    )))
                }
            }
        }
    }

    /// Reset server-side session state, keeping the transport open.
    ///
    /// Session-scoped variables are cleared on the server. The
    /// prepared-statement table is kept unless `retain_statements` is false.
    pub(crate) async fn reset(&mut self, retain_statements: bool) -> Result<()> {
        self.channel
            .send(&ClientMessage::SessionReset { keep_open: true })
            .await?;
        match self.channel.recv().await? {
            ServerMessage::Ok => {
                if !retain_statements {
                    self.registry.clear();
                }
                Ok(())
            }
            ServerMessage::Error(err) => Err(err.into()),
            other => Err(Error::Protocol(format!(
                "unexpected response to session reset: {:?}",
                other
            ))),
        }
    }

    /// Park the session (pool-side bookkeeping)
    pub(crate) fn mark_idle(&mut self) -> Result<()> {
        self.state.transition(SessionState::Idle)
    }

    /// Hand the session back out (pool-side bookkeeping)
    pub(crate) fn mark_open(&mut self) -> Result<()> {
        self.state.transition(SessionState::Open)
    }

    /// Registry introspection for pool bookkeeping and tests
    pub(crate) fn registry(&self) -> &PreparedStatementRegistry {
        &self.registry
    }

    /// Close the session and tear down the transport.
    ///
    /// Frames are sent best-effort; a dead transport does not make close
    /// fail.
    pub async fn close(mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state.transition(SessionState::Closed)?;
        let _ = self.channel.send(&ClientMessage::SessionClose).await;
        let _ = self.channel.send(&ClientMessage::ConnectionClose).await;
        self.channel.shutdown().await?;
        tracing::debug!(session = self.id, "session closed");
        Ok(())
    }
}
