// Request signing for state-mutating venue calls

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::clients::lighter_api::ApiError;

pub const TIMESTAMP_PARAM: &str = "timestamp";
pub const SIGNATURE_PARAM: &str = "signature";

/// Produces the `signature` parameter for a canonical payload.
///
/// The venue's scheme is not final, so the client takes any signer.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, payload: &str) -> Result<String, ApiError>;
}

/// Hex-encoded HMAC-SHA256 keyed with the account secret
pub struct HmacSha256Signer {
    secret: String,
}

impl HmacSha256Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl RequestSigner for HmacSha256Signer {
    fn sign(&self, payload: &str) -> Result<String, ApiError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ApiError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for HmacSha256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Signer").finish_non_exhaustive()
    }
}

/// `k1=v1&k2=v2` with keys in ascending order
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Add `timestamp` and `signature` to `params`.
///
/// The signature covers every parameter including the timestamp.
pub fn sign_params(
    signer: &dyn RequestSigner,
    params: &mut BTreeMap<String, String>,
    timestamp_ms: i64,
) -> Result<(), ApiError> {
    params.remove(SIGNATURE_PARAM);
    params.insert(TIMESTAMP_PARAM.to_string(), timestamp_ms.to_string());
    let signature = signer.sign(&canonical_query(params))?;
    params.insert(SIGNATURE_PARAM.to_string(), signature);
    Ok(())
}
