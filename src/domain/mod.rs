pub mod decode;
pub mod error;

pub use decode::{decode_payload, truncate_raw, DecodedResponse};
pub use error::{
    classify, describe_failure, ClassifiedError, ErrorChain, FailureReport, GatewayError,
};
