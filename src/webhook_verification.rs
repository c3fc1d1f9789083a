//! # Webhook Signature Verification
//!
//! Authenticates GitHub deliveries by recomputing the HMAC-SHA256 of the raw
//! body and comparing it to `X-Hub-Signature-256` in constant time.

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors that can occur during webhook signature verification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("Missing required signature header: {header}")]
    MissingSignature { header: String },

    #[error("Invalid signature format: {reason}")]
    InvalidSignatureFormat { reason: String },

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Webhook secret is not configured")]
    NotConfigured,
}

impl VerificationError {
    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerificationError::MissingSignature { .. }
            | VerificationError::InvalidSignatureFormat { .. }
            | VerificationError::VerificationFailed => StatusCode::UNAUTHORIZED,
            VerificationError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            VerificationError::NotConfigured => "WEBHOOK_NOT_CONFIGURED",
            _ => "INVALID_SIGNATURE",
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(error: VerificationError) -> Self {
        ApiError::new(error.status_code(), error.error_code(), error.to_string())
    }
}

/// Result type for webhook verification
pub type VerificationResult<T> = Result<T, VerificationError>;

/// Verifies GitHub webhook signature using HMAC-SHA256
pub fn verify_github_signature(
    body: &[u8],
    signature_header: &str,
    secret: &str,
) -> VerificationResult<()> {
    debug!(
        body_size = body.len(),
        "Starting GitHub signature verification"
    );

    let signature_header = signature_header.trim();
    if signature_header.is_empty() {
        return Err(VerificationError::MissingSignature {
            header: SIGNATURE_HEADER.to_string(),
        });
    }

    let Some(provided_hex) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return Err(VerificationError::InvalidSignatureFormat {
            reason: format!("{SIGNATURE_HEADER} must start with '{SIGNATURE_PREFIX}'"),
        });
    };

    let provided_bytes =
        hex::decode(provided_hex).map_err(|_| VerificationError::InvalidSignatureFormat {
            reason: format!("{SIGNATURE_HEADER} contains invalid hex"),
        })?;

    let expected_bytes = compute_mac(body, secret)?;

    if expected_bytes.ct_eq(&provided_bytes[..]).into() {
        Ok(())
    } else {
        Err(VerificationError::VerificationFailed)
    }
}

fn compute_mac(body: &[u8], secret: &str) -> VerificationResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VerificationError::VerificationFailed)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Produces the `sha256=<hex>` header value a sender with `secret` would attach.
pub fn sign_github_payload(body: &[u8], secret: &str) -> VerificationResult<String> {
    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(compute_mac(body, secret)?)
    ))
}

/// Signature verifier bound to the configured shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks `signature_header` against the body. Fails with
    /// [`VerificationError::NotConfigured`] before looking at the header when no
    /// secret is set.
    pub fn verify(&self, body: &[u8], signature_header: Option<&str>) -> VerificationResult<()> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(VerificationError::NotConfigured)?;
        verify_github_signature(body, signature_header.unwrap_or_default(), secret)
    }
}
