//! Per-request ledger sessions.
//!
//! A [`Session`] is opened for exactly one request and closed on every exit path: explicitly
//! via [`Session::close`], or by `Drop` when the owning future unwinds or is cancelled. Closing
//! happens at most once.

use crate::domain::error::GatewayError;
use crate::infra::config::{ContractTarget, PeerSettings};
use crate::infra::fabric::client::{connect_transport, FabricConnection};
use crate::infra::fabric::identity::load_identity;
use crate::infra::fabric::signer::Signer;
use async_trait::async_trait;

/// One chaincode invocation: operation name plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub operation: String,
    pub arguments: Vec<Vec<u8>>,
}

impl TransactionRequest {
    pub fn new(operation: impl Into<String>) -> Self {
        TransactionRequest {
            operation: operation.into(),
            arguments: Vec::new(),
        }
    }

    pub fn arg(mut self, argument: impl Into<Vec<u8>>) -> Self {
        self.arguments.push(argument.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Ordered, endorsed and committed write.
    Submit,
    /// Read against a single peer's current state.
    Evaluate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionResult {
    Acknowledged,
    Payload(Vec<u8>),
}

/// The ledger-side handle of a session together with the transport it owns.
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    async fn submit(&self, target: &ContractTarget, tx: &TransactionRequest)
        -> Result<(), GatewayError>;

    async fn evaluate(
        &self,
        target: &ContractTarget,
        tx: &TransactionRequest,
    ) -> Result<Vec<u8>, GatewayError>;

    /// Releases the ledger handle, then the transport.
    fn close(&mut self);
}

/// Opens fresh sessions. No pooling: every call builds a new identity, signer and transport.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Session, GatewayError>;
}

pub struct Session {
    connection: Box<dyn LedgerConnection>,
    closed: bool,
}

impl Session {
    pub fn new(connection: Box<dyn LedgerConnection>) -> Self {
        Session {
            connection,
            closed: false,
        }
    }

    pub fn network<'a>(&'a self, channel: &str) -> Network<'a> {
        Network {
            session: self,
            channel: channel.to_string(),
        }
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.connection.close();
            tracing::debug!("ledger session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("ledger session dropped without explicit close; closing now");
            self.release();
        }
    }
}

pub struct Network<'a> {
    session: &'a Session,
    channel: String,
}

impl<'a> Network<'a> {
    pub fn contract(&self, chaincode: &str) -> Contract<'a> {
        Contract {
            session: self.session,
            target: ContractTarget {
                channel: self.channel.clone(),
                chaincode: chaincode.to_string(),
            },
        }
    }
}

pub struct Contract<'a> {
    session: &'a Session,
    target: ContractTarget,
}

impl Contract<'_> {
    pub async fn submit(&self, tx: &TransactionRequest) -> Result<(), GatewayError> {
        self.session.connection.submit(&self.target, tx).await
    }

    pub async fn evaluate(&self, tx: &TransactionRequest) -> Result<Vec<u8>, GatewayError> {
        self.session.connection.evaluate(&self.target, tx).await
    }

    pub async fn invoke(
        &self,
        kind: CallKind,
        tx: &TransactionRequest,
    ) -> Result<TransactionResult, GatewayError> {
        match kind {
            CallKind::Submit => self.submit(tx).await.map(|()| TransactionResult::Acknowledged),
            CallKind::Evaluate => self.evaluate(tx).await.map(TransactionResult::Payload),
        }
    }
}

/// Session factory backed by a Fabric Gateway peer.
#[derive(Debug, Clone)]
pub struct FabricSessionFactory {
    peer: PeerSettings,
}

impl FabricSessionFactory {
    pub fn new(peer: PeerSettings) -> Self {
        FabricSessionFactory { peer }
    }
}

#[async_trait]
impl SessionFactory for FabricSessionFactory {
    async fn open(&self) -> Result<Session, GatewayError> {
        // All settings are checked before any file or socket is touched.
        let settings = self.peer.require()?;
        let identity = load_identity(&settings).await?;
        let signer = Signer::new(&identity.private_key);
        let transport = connect_transport(&settings).await?;
        let connection = FabricConnection::connect(transport, &identity, signer);

        tracing::debug!(peer = %settings.peer_endpoint, msp_id = %identity.msp_id, "ledger session opened");
        Ok(Session::new(Box::new(connection)))
    }
}
