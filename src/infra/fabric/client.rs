// Responsible for all communication with the Fabric Gateway peer.

use crate::domain::error::{describe_failure, GatewayError};
use crate::infra::config::{ConnectionSettings, ContractTarget};
use crate::infra::fabric::identity::Identity;
use crate::infra::fabric::proto::{
    self, paths, ChaincodeHeaderExtension, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec,
    ChaincodeProposalPayload, ChaincodeSpec, ChannelHeader, CommitStatusRequest,
    CommitStatusResponse, EndorseRequest, EndorseResponse, ErrorDetail, EvaluateRequest,
    EvaluateResponse, Header, Proposal, RpcStatus, SignatureHeader, SignedCommitStatusRequest,
    SignedProposal, SubmitRequest, SubmitResponse,
};
use crate::infra::fabric::session::{LedgerConnection, TransactionRequest};
use crate::infra::fabric::signer::Signer;
use async_trait::async_trait;
use http::uri::PathAndQuery;
use prost::Message;
use sha2::{Digest, Sha256};
use std::error::Error as _;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity as TlsIdentity};

const NONCE_LEN: usize = 24;
const ERROR_DETAIL_TYPE: &str = "gateway.ErrorDetail";

/// Opens a TLS channel to the peer, trusting only the configured CA and verifying the peer
/// certificate against the host alias instead of the dialled address.
pub async fn connect_transport(settings: &ConnectionSettings) -> Result<Channel, GatewayError> {
    let ca_pem = tokio::fs::read(&settings.tls_cert_path).await.map_err(|e| {
        GatewayError::connection(
            format!("cannot read TLS CA certificate {}", settings.tls_cert_path.display()),
            Some(e.to_string()),
        )
    })?;

    let mut tls = ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca_pem))
        .domain_name(settings.host_alias.clone());

    if let Some(client_tls) = &settings.client_tls {
        let cert = tokio::fs::read(&client_tls.cert).await;
        let key = tokio::fs::read(&client_tls.key).await;
        match (cert, key) {
            (Ok(cert), Ok(key)) => tls = tls.identity(TlsIdentity::from_pem(cert, key)),
            (Err(e), _) | (_, Err(e)) => {
                return Err(GatewayError::connection(
                    "cannot read TLS client certificate or key",
                    Some(e.to_string()),
                ));
            }
        }
    }

    let uri = if settings.peer_endpoint.contains("://") {
        settings.peer_endpoint.clone()
    } else {
        format!("https://{}", settings.peer_endpoint)
    };

    let endpoint = Endpoint::from_shared(uri)
        .and_then(|endpoint| endpoint.tls_config(tls))
        .map_err(|e| transport_error(&settings.peer_endpoint, &e))?;

    let channel = endpoint
        .connect()
        .await
        .map_err(|e| transport_error(&settings.peer_endpoint, &e))?;

    tracing::debug!(peer = %settings.peer_endpoint, alias = %settings.host_alias, "peer channel established");
    Ok(channel)
}

fn transport_error(peer: &str, e: &tonic::transport::Error) -> GatewayError {
    let mut detail = Vec::new();
    let mut source = e.source();
    while let Some(inner) = source {
        detail.push(inner.to_string());
        source = inner.source();
    }
    GatewayError::connection(
        format!("failed to connect to peer {}: {}", peer, e),
        (!detail.is_empty()).then(|| detail.join(": ")),
    )
}

/// Ledger session bound to one transport channel, one identity and one signer.
pub struct FabricConnection {
    gateway: Option<Grpc<Channel>>,
    transport: Option<Channel>,
    creator: Vec<u8>,
    signer: Signer,
}

impl FabricConnection {
    pub fn connect(transport: Channel, identity: &Identity, signer: Signer) -> Self {
        FabricConnection {
            gateway: Some(Grpc::new(transport.clone())),
            transport: Some(transport),
            creator: identity.serialize(),
            signer,
        }
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, tonic::Status>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self
            .gateway
            .clone()
            .ok_or_else(|| tonic::Status::failed_precondition("ledger session is closed"))?;
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("gateway service not ready: {}", e)))?;

        let codec = ProstCodec::<Req, Resp>::default();
        grpc.unary(tonic::Request::new(request), PathAndQuery::from_static(path), codec)
            .await
            .map(tonic::Response::into_inner)
    }
}

#[async_trait]
impl LedgerConnection for FabricConnection {
    async fn submit(
        &self,
        target: &ContractTarget,
        tx: &TransactionRequest,
    ) -> Result<(), GatewayError> {
        let proposal = build_proposal(&self.creator, &self.signer, target, tx);
        let transaction_id = proposal.transaction_id.clone();

        let endorsed: EndorseResponse = self
            .unary(
                paths::ENDORSE,
                EndorseRequest {
                    transaction_id: transaction_id.clone(),
                    channel_id: target.channel.clone(),
                    proposed_transaction: Some(proposal.signed),
                    endorsing_organizations: Vec::new(),
                },
            )
            .await
            .map_err(|status| ledger_error("endorse", &tx.operation, status))?;

        let mut envelope = endorsed.prepared_transaction.ok_or_else(|| {
            GatewayError::ledger(format!("endorse {}: no prepared transaction returned", tx.operation))
        })?;
        envelope.signature = self.signer.sign(&envelope.payload);

        let _: SubmitResponse = self
            .unary(
                paths::SUBMIT,
                SubmitRequest {
                    transaction_id: transaction_id.clone(),
                    channel_id: target.channel.clone(),
                    prepared_transaction: Some(envelope),
                },
            )
            .await
            .map_err(|status| ledger_error("submit", &tx.operation, status))?;

        let request = CommitStatusRequest {
            transaction_id: transaction_id.clone(),
            channel_id: target.channel.clone(),
            identity: self.creator.clone(),
        }
        .encode_to_vec();
        let signature = self.signer.sign(&request);

        let status: CommitStatusResponse = self
            .unary(paths::COMMIT_STATUS, SignedCommitStatusRequest { request, signature })
            .await
            .map_err(|status| ledger_error("commit status", &tx.operation, status))?;

        if status.result != proto::TX_VALIDATION_VALID {
            return Err(GatewayError::ledger(format!(
                "transaction {} failed to commit with status code {}",
                transaction_id, status.result
            )));
        }

        tracing::debug!(
            operation = %tx.operation,
            transaction_id = %transaction_id,
            block_number = status.block_number,
            "transaction committed"
        );
        Ok(())
    }

    async fn evaluate(
        &self,
        target: &ContractTarget,
        tx: &TransactionRequest,
    ) -> Result<Vec<u8>, GatewayError> {
        let proposal = build_proposal(&self.creator, &self.signer, target, tx);

        let response: EvaluateResponse = self
            .unary(
                paths::EVALUATE,
                EvaluateRequest {
                    transaction_id: proposal.transaction_id,
                    channel_id: target.channel.clone(),
                    proposed_transaction: Some(proposal.signed),
                    target_organizations: Vec::new(),
                },
            )
            .await
            .map_err(|status| ledger_error("evaluate", &tx.operation, status))?;

        let result = response.result.ok_or_else(|| {
            GatewayError::ledger(format!("evaluate {}: no result returned", tx.operation))
        })?;
        if result.status >= 400 {
            return Err(GatewayError::ledger(format!(
                "evaluate {} returned status {}: {}",
                tx.operation, result.status, result.message
            )));
        }
        Ok(result.payload)
    }

    fn close(&mut self) {
        // Ledger handle first, then the channel it rides on.
        self.gateway.take();
        self.transport.take();
    }
}

/// A signed proposal plus the transaction id derived from its nonce and creator.
pub(crate) struct PreparedProposal {
    pub transaction_id: String,
    pub signed: SignedProposal,
}

pub(crate) fn build_proposal(
    creator: &[u8],
    signer: &Signer,
    target: &ContractTarget,
    tx: &TransactionRequest,
) -> PreparedProposal {
    let nonce: [u8; NONCE_LEN] = rand::random();
    let transaction_id = transaction_id(&nonce, creator);
    let chaincode_id = ChaincodeId {
        name: target.chaincode.clone(),
        ..Default::default()
    };

    let now = chrono::Utc::now();
    let channel_header = ChannelHeader {
        r#type: proto::HEADER_TYPE_ENDORSER_TRANSACTION,
        timestamp: Some(prost_types::Timestamp {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos() as i32,
        }),
        channel_id: target.channel.clone(),
        tx_id: transaction_id.clone(),
        extension: ChaincodeHeaderExtension {
            chaincode_id: Some(chaincode_id.clone()),
        }
        .encode_to_vec(),
        ..Default::default()
    };
    let signature_header = SignatureHeader {
        creator: creator.to_vec(),
        nonce: nonce.to_vec(),
    };
    let header = Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: signature_header.encode_to_vec(),
    };

    let mut args = Vec::with_capacity(tx.arguments.len() + 1);
    args.push(tx.operation.clone().into_bytes());
    args.extend(tx.arguments.iter().cloned());

    let invocation = ChaincodeInvocationSpec {
        chaincode_spec: Some(ChaincodeSpec {
            chaincode_id: Some(chaincode_id),
            input: Some(ChaincodeInput { args, is_init: false }),
            ..Default::default()
        }),
    };
    let proposal = Proposal {
        header: header.encode_to_vec(),
        payload: ChaincodeProposalPayload {
            input: invocation.encode_to_vec(),
        }
        .encode_to_vec(),
        extension: Vec::new(),
    };

    let proposal_bytes = proposal.encode_to_vec();
    let signature = signer.sign(&proposal_bytes);
    PreparedProposal {
        transaction_id,
        signed: SignedProposal {
            proposal_bytes,
            signature,
        },
    }
}

pub(crate) fn transaction_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

fn ledger_error(step: &str, operation: &str, status: tonic::Status) -> GatewayError {
    GatewayError::Ledger {
        message: format!("{} {} failed: {}", step, operation, describe_failure(&status)),
        details: peer_error_details(&status),
        cause: status.source().map(|source| source.to_string()),
    }
}

/// Per-peer errors packed into the status details by the gateway.
fn peer_error_details(status: &tonic::Status) -> Vec<String> {
    if status.details().is_empty() {
        return Vec::new();
    }
    let Ok(rpc_status) = RpcStatus::decode(status.details()) else {
        return Vec::new();
    };
    rpc_status
        .details
        .iter()
        .filter(|any| any.type_url.ends_with(ERROR_DETAIL_TYPE))
        .filter_map(|any| ErrorDetail::decode(any.value.as_slice()).ok())
        .map(|d| format!("{} ({}): {}", d.address, d.msp_id, d.message))
        .collect()
}
