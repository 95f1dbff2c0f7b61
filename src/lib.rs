pub mod domain;
pub mod infra;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use domain::error::GatewayError;
pub use infra::config::{ContractTarget, GatewayConfig};
pub use infra::fabric::{
    FabricSessionFactory, LedgerConnection, Session, SessionFactory, TransactionRequest,
};
