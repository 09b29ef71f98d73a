//! Shared test doubles: a scripted channel and connector that answer like a
//! healthy server and record every outbound frame.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xsession::auth::AuthMechanism;
use xsession::connection::Channel;
use xsession::pool::Connector;
use xsession::protocol::{ClientMessage, Severity, ServerError, ServerMessage};
use xsession::session::Session;
use xsession::{Error, Result};

/// Channel that acknowledges every request and logs outbound messages
pub struct RecordingChannel {
    log: Arc<Mutex<Vec<ClientMessage>>>,
    pending: VecDeque<ServerMessage>,
    kill: Arc<AtomicBool>,
    out_of_statements: Arc<AtomicBool>,
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        if self.kill.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.log.lock().unwrap().push(msg.clone());
        match msg {
            ClientMessage::StmtExecute { .. } | ClientMessage::PrepareExecute { .. } => {
                self.pending
                    .push_back(ServerMessage::Row(bytes::Bytes::from_static(b"{}")));
                self.pending.push_back(ServerMessage::FetchDone);
                self.pending.push_back(ServerMessage::StmtExecuteOk);
            }
            ClientMessage::PreparePrepare { .. } => {
                if self.out_of_statements.load(Ordering::SeqCst) {
                    self.pending.push_back(ServerMessage::Error(ServerError {
                        severity: Severity::Error,
                        code: 1461,
                        sql_state: "42000".to_string(),
                        message: "Can't create more than max_prepared_stmt_count statements"
                            .to_string(),
                    }));
                } else {
                    self.pending.push_back(ServerMessage::Ok);
                }
            }
            ClientMessage::PrepareDeallocate { .. }
            | ClientMessage::SessionReset { .. }
            | ClientMessage::SessionClose
            | ClientMessage::ConnectionClose => {
                self.pending.push_back(ServerMessage::Ok);
            }
            _ => {}
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerMessage> {
        if self.kill.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.pending.pop_front().ok_or(Error::ConnectionClosed)
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// Connector producing [`RecordingChannel`]-backed sessions
pub struct ScriptedConnector {
    pub built: AtomicUsize,
    pub log: Arc<Mutex<Vec<ClientMessage>>>,
    pub out_of_statements: Arc<AtomicBool>,
    kill_switches: Mutex<Vec<Arc<AtomicBool>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            built: AtomicUsize::new(0),
            log: Arc::new(Mutex::new(Vec::new())),
            out_of_statements: Arc::new(AtomicBool::new(false)),
            kill_switches: Mutex::new(Vec::new()),
        }
    }

    /// Number of sessions built so far
    pub fn built_count(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    /// Kill the transport of the n-th built session
    pub fn kill_session(&self, index: usize) {
        self.kill_switches.lock().unwrap()[index].store(true, Ordering::SeqCst);
    }

    /// Short names of all frames sent so far, across all sessions
    pub fn sent_names(&self) -> Vec<&'static str> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(message_name)
            .collect()
    }

    /// Drop the recorded frames
    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Session> {
        self.built.fetch_add(1, Ordering::SeqCst);
        let kill = Arc::new(AtomicBool::new(false));
        self.kill_switches.lock().unwrap().push(kill.clone());
        let channel = RecordingChannel {
            log: self.log.clone(),
            pending: VecDeque::new(),
            kill,
            out_of_statements: self.out_of_statements.clone(),
        };
        Ok(Session::new(Box::new(channel), AuthMechanism::Plain))
    }
}

/// Short name of a client frame, for sequence assertions
pub fn message_name(msg: &ClientMessage) -> &'static str {
    match msg {
        ClientMessage::CapabilitiesGet => "CapabilitiesGet",
        ClientMessage::CapabilitiesSet { .. } => "CapabilitiesSet",
        ClientMessage::AuthenticateStart { .. } => "AuthenticateStart",
        ClientMessage::AuthenticateContinue { .. } => "AuthenticateContinue",
        ClientMessage::StmtExecute { .. } => "StmtExecute",
        ClientMessage::PreparePrepare { .. } => "Prepare",
        ClientMessage::PrepareExecute { .. } => "Execute",
        ClientMessage::PrepareDeallocate { .. } => "Deallocate",
        ClientMessage::SessionReset { .. } => "SessionReset",
        ClientMessage::SessionClose => "SessionClose",
        ClientMessage::ConnectionClose => "ConnectionClose",
    }
}

/// Install a quiet tracing subscriber for test debugging via RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
