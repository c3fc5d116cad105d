use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Generate an HMAC-SHA256 signature over a raw payload.
///
/// Format: `sha256=<hex digest>`, computed over the unparsed body bytes.
pub fn generate_signature(secret: &str, payload: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(payload);
    let result = mac.finalize();

    Ok(format!("sha256={}", hex::encode(result.into_bytes())))
}

/// Verify an HMAC-SHA256 signature using constant-time comparison.
///
/// The payload must be the raw request body, verified before any parsing.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = generate_signature(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_generation_and_verification() {
        let secret = "my_secret_key";
        let body = br#"{"ref":"refs/heads/main"}"#;

        let signature = generate_signature(secret, body).unwrap();
        assert!(signature.starts_with("sha256="));

        let is_valid = verify_signature(secret, body, &signature).unwrap();
        assert!(is_valid);
    }

    #[test]
    fn test_invalid_signature() {
        let secret = "my_secret_key";
        let body = br#"{"ref":"refs/heads/main"}"#;

        let signature = generate_signature(secret, body).unwrap();
        let invalid_signature = format!("{}a", &signature[..signature.len() - 1]);

        let is_valid = verify_signature(secret, body, &invalid_signature).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_tampered_body() {
        let secret = "my_secret_key";
        let body = br#"{"ref":"refs/heads/main"}"#;

        let signature = generate_signature(secret, body).unwrap();

        let modified_body = br#"{"ref":"refs/heads/feature"}"#;
        let is_valid = verify_signature(secret, modified_body, &signature).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_wrong_secret() {
        let body = br#"{"ref":"refs/heads/main"}"#;

        let signature = generate_signature("secret_a", body).unwrap();
        let is_valid = verify_signature("secret_b", body, &signature).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let body = b"payload";
        let is_valid = verify_signature("secret", body, "sha256=short").unwrap();
        assert!(!is_valid);
    }
}
