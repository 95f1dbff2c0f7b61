pub mod client;
pub mod identity;
pub mod proto;
pub mod session;
pub mod signer;

pub use identity::{load_identity, Identity};
pub use session::{
    CallKind, Contract, FabricSessionFactory, LedgerConnection, Session, SessionFactory,
    TransactionRequest, TransactionResult,
};
pub use signer::Signer;
