use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Wire prefix for encoded attendance codes.
pub const CODE_PREFIX: &str = "rollcall://v1/";

/// Payload format version carried inside the encoded record.
pub const PAYLOAD_VERSION: u8 = 1;

/// Default validity window for a freshly minted token, in seconds.
pub const DEFAULT_VALIDITY_SECONDS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
}

/// The structured record that round-trips through the QR symbology.
/// Field names are kept to one or two characters so the rendered code
/// stays dense enough for small on-screen displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "id")]
    pub token_id: String,
    #[serde(rename = "c")]
    pub class_id: String,
    #[serde(rename = "ts")]
    pub issued_at: String,
    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPoint>,
    #[serde(rename = "x")]
    pub checksum: String,
}

#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("not an attendance code")]
    BadPrefix,
    #[error("malformed attendance code: {0}")]
    Malformed(String),
    #[error("unsupported payload version: {0}")]
    UnsupportedVersion(u8),
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

impl TokenPayload {
    /// Mint a payload for `class_id` at `issued_at` with a fresh token id.
    pub fn mint(class_id: &str, geo: GeoPoint, issued_at: DateTime<Utc>) -> Self {
        let token_id = Uuid::new_v4().to_string();
        let issued_at = issued_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let checksum = digest(&token_id, class_id, &issued_at, Some(&geo));
        TokenPayload {
            version: PAYLOAD_VERSION,
            token_id,
            class_id: class_id.to_string(),
            issued_at,
            geo: Some(geo),
            checksum,
        }
    }

    pub fn encode(&self) -> String {
        // Serialization of this struct cannot fail; keep the signature infallible.
        let json = serde_json::to_vec(self).unwrap_or_default();
        format!("{}{}", CODE_PREFIX, URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(code: &str) -> Result<Self, TokenDecodeError> {
        let Some(encoded) = code.strip_prefix(CODE_PREFIX) else {
            return Err(TokenDecodeError::BadPrefix);
        };
        let json = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| TokenDecodeError::Malformed(e.to_string()))?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|e| TokenDecodeError::Malformed(e.to_string()))?;
        if payload.version != PAYLOAD_VERSION {
            return Err(TokenDecodeError::UnsupportedVersion(payload.version));
        }
        if !payload.verify_checksum() {
            return Err(TokenDecodeError::ChecksumMismatch);
        }
        Ok(payload)
    }

    pub fn verify_checksum(&self) -> bool {
        let expected = digest(
            &self.token_id,
            &self.class_id,
            &self.issued_at,
            self.geo.as_ref(),
        );
        self.checksum == expected
    }
}

// First eight bytes of the SHA-256 over the identity fields, hex encoded.
fn digest(token_id: &str, class_id: &str, issued_at: &str, geo: Option<&GeoPoint>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token_id.as_bytes());
    hasher.update(b"|");
    hasher.update(class_id.as_bytes());
    hasher.update(b"|");
    hasher.update(issued_at.as_bytes());
    hasher.update(b"|");
    if let Some(geo) = geo {
        hasher.update(format!("{},{}", geo.latitude, geo.longitude).as_bytes());
    }
    let out = hasher.finalize();
    out[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// An issued token plus its validity window. The issuer holds at most
/// one of these at a time.
#[derive(Debug, Clone)]
pub struct AttendanceToken {
    pub payload: TokenPayload,
    pub validity_seconds: i64,
}

impl AttendanceToken {
    pub fn new(payload: TokenPayload, validity_seconds: i64) -> Self {
        AttendanceToken {
            payload,
            validity_seconds,
        }
    }
}
