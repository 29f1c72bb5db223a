/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: Normalized HTTP outcomes and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod normalizer;
pub mod signature;
pub mod spot;

pub use error::{GateioError, Result};
pub use normalizer::{
    HttpErrorDetail, MalformedDetail, NormalizedResult, ResponseNormalizer, ResultStatus,
    TransportFailure, TransportFailureKind,
};
pub use signature::{RequestSigner, SignedRequest, encode_query};

pub use client::{API_V4_PREFIX, ClientConfig, DEFAULT_BASE_URL, GateioClient};
