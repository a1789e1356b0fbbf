// External API clients

pub mod lighter_api;
pub mod signing;

// Re-export client types
pub use lighter_api::{classify_status, ApiError, LighterClient, OpenOrder};
pub use signing::{canonical_query, sign_params, HmacSha256Signer, RequestSigner};
