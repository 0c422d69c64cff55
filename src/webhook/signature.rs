//! Verification of the `Stripe-Signature` header.
//!
//! The header looks like `t=1700000000,v1=5257a8...,v1=...`. Each `v1` value is the hex HMAC-SHA256
//! of `"{t}.{body}"` keyed with the endpoint secret; any one of them matching is enough.

use crate::error::{typed, ErrorType};
use crate::Result;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the request header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Signatures older (or newer) than this many seconds are refused.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

const SCHEME: &str = "v1";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for pair in header.split(',') {
        let Some((key, value)) = pair.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            SCHEME => {
                // A value that is not hex can never match, skip it.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }
    let Some(timestamp) = timestamp else {
        return Err(typed(
            ErrorType::Signature,
            "Unable to extract timestamp and signatures from header",
        ));
    };
    if signatures.is_empty() {
        return Err(typed(
            ErrorType::Signature,
            "No signatures found with expected scheme",
        ));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| typed(ErrorType::Signature, format!("Invalid signing secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Checks `header` against `payload`, the raw request body, at time `now` (unix seconds).
///
/// Every failure is an `ErrorType::Signature` error whose message says what was wrong.
pub fn verify(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<()> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => {
            return Err(typed(
                ErrorType::Signature,
                "No stripe-signature header value was provided",
            ))
        }
    };
    let parsed = parse_header(header)?;
    let expected = mac(secret, parsed.timestamp, payload)?;
    let matched = parsed
        .signatures
        .iter()
        .any(|sig| expected.clone().verify_slice(sig).is_ok());
    if !matched {
        return Err(typed(
            ErrorType::Signature,
            "No signatures found matching the expected signature for payload",
        ));
    }
    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(typed(
            ErrorType::Signature,
            "Timestamp outside the tolerance zone",
        ));
    }
    Ok(())
}

/// Builds a header value signing `payload` at `timestamp`.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let digest = mac(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(format!("t={timestamp},{SCHEME}={}", hex::encode(digest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_type;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_735_689_600;

    #[test]
    fn test_sign_then_verify() {
        let body = br#"{"type":"invoice.payment_succeeded"}"#;
        let header = sign(body, SECRET, NOW).unwrap();
        assert!(header.starts_with(&format!("t={NOW},v1=")));
        verify(body, Some(&header), SECRET, NOW + 10, DEFAULT_TOLERANCE_SECS).unwrap();
    }

    #[test]
    fn test_known_digest() {
        // hmac-sha256("key", "1.x")
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"1.x");
        let expected = hex::encode(mac.finalize().into_bytes());
        assert_eq!(sign(b"x", "key", 1).unwrap(), format!("t=1,v1={expected}"));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign(b"{}", SECRET, NOW).unwrap();
        let err = verify(b"{ }", Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECS).unwrap_err();
        assert_eq!(error_type(&err), Some(ErrorType::Signature));
        assert!(err.to_string().contains("No signatures found matching"));
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(b"{}", "whsec_other", NOW).unwrap();
        assert!(verify(b"{}", Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn test_any_signature_may_match() {
        let good = sign(b"{}", SECRET, NOW).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v0=abc,v1={good_sig}", "00".repeat(32));
        verify(b"{}", Some(&header), SECRET, NOW, DEFAULT_TOLERANCE_SECS).unwrap();
    }

    #[test]
    fn test_stale_timestamp() {
        let header = sign(b"{}", SECRET, NOW).unwrap();
        let err = verify(b"{}", Some(&header), SECRET, NOW + 301, DEFAULT_TOLERANCE_SECS)
            .unwrap_err();
        assert!(err.to_string().contains("tolerance"));
        verify(b"{}", Some(&header), SECRET, NOW + 300, DEFAULT_TOLERANCE_SECS).unwrap();
    }

    #[test]
    fn test_malformed_headers() {
        for header in [None, Some(""), Some("garbage"), Some("v1=abcd"), Some("t=12")] {
            let err = verify(b"{}", header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).unwrap_err();
            assert_eq!(error_type(&err), Some(ErrorType::Signature), "{header:?}");
        }
    }

    #[test]
    fn test_parse_header() {
        let parsed = parse_header("t=5, v1=00ff ,v1=zz").unwrap();
        assert_eq!(parsed.timestamp, 5);
        assert_eq!(parsed.signatures, vec![vec![0x00, 0xff]]);
    }
}
