//! Verification of the `stripe-signature` header.
//!
//! The header has the form `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
//! Each `v1` value is an HMAC-SHA256 of `"{t}.{raw body}"` keyed with the
//! endpoint's signing secret. Stripe sends several `v1` entries while a secret
//! is being rolled, so any match is accepted.
//! See https://stripe.com/docs/webhooks/signatures

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed payload, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing timestamp in stripe-signature")]
    MissingTimestamp,
    #[error("missing v1 signature in stripe-signature")]
    MissingSignature,
    #[error("timestamp is outside the tolerance window")]
    TimestampOutsideTolerance,
    #[error("no signature matches the payload")]
    NoMatch,
    #[error("webhook signing secret is unusable")]
    InvalidSecret,
}

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = rest.parse::<i64>().ok();
        } else if let Some(rest) = part.strip_prefix("v1=") {
            // Malformed hex entries are skipped rather than failing the whole header.
            if let Ok(bytes) = hex::decode(rest) {
                signatures.push(bytes);
            }
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks `header` against `payload`. `now` is unix seconds.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let parsed = parse_header(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::TimestampOutsideTolerance);
    }

    let mac = mac_for(secret, parsed.timestamp, payload)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::NoMatch)
    }
}

/// Builds a valid header for `payload`. Used by tests and local tooling.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let digest = mac_for(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let payload = br#"{"id":"evt_1","type":"invoice.payment_succeeded"}"#;
        let header = sign(payload, SECRET, NOW).unwrap();
        assert_eq!(verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = sign(b"{\"amount\":100}", SECRET, NOW).unwrap();
        assert_eq!(
            verify(b"{\"amount\":999}", &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let payload = b"{}";
        let header = sign(payload, "whsec_other", NOW).unwrap();
        assert_eq!(
            verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::NoMatch)
        );
    }

    #[test]
    fn rejects_stale_timestamps() {
        let payload = b"{}";
        let header = sign(payload, SECRET, NOW - DEFAULT_TOLERANCE_SECS - 1).unwrap();
        assert_eq!(
            verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::TimestampOutsideTolerance)
        );
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = b"{}";
        let valid = sign(payload, SECRET, NOW).unwrap();
        let valid_sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), valid_sig);
        assert_eq!(verify(payload, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW), Ok(()));
    }

    #[test]
    fn reports_missing_header_parts() {
        assert_eq!(
            verify(b"{}", "v1=abcd", SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify(b"{}", &format!("t={}", NOW), SECRET, DEFAULT_TOLERANCE_SECS, NOW),
            Err(SignatureError::MissingSignature)
        );
    }
}
