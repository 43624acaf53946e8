//! HMAC-signed update manifests
//!
//! A proposal body carries the group it was created from inside an HTML
//! comment. The manifest is signed so a reopened review request can only
//! replay updates the bot itself proposed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};

use crate::error::UpdateError;
use crate::types::UpdateGroup;

type HmacSha512 = Hmac<Sha512>;

/// Opening marker of the manifest block
pub const MANIFEST_MARKER: &str = "<!--::action-update-go::";
/// Closing marker of the manifest block
pub const MANIFEST_END: &str = "-->";

/// HMAC key material
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Use raw bytes as the key
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Derive the key from a configured secret: the SHA-512 digest of the input
    pub fn from_input(input: &str) -> Self {
        Self(Sha512::digest(input.as_bytes()).to_vec())
    }

    fn mac(&self) -> Result<HmacSha512, UpdateError> {
        HmacSha512::new_from_slice(&self.0).map_err(|e| UpdateError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// An update group with its signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUpdateGroup {
    pub signed: UpdateGroup,
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    pub signature: Vec<u8>,
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s).map_err(serde::de::Error::custom)
}

fn canonical_bytes(group: &UpdateGroup) -> Result<Vec<u8>, UpdateError> {
    Ok(serde_json::to_vec(group)?)
}

/// Sign a group. Updates are sorted by path before signing.
pub fn sign(key: &SigningKey, group: &UpdateGroup) -> Result<SignedUpdateGroup, UpdateError> {
    let signed = group.sorted();
    let mut mac = key.mac()?;
    mac.update(&canonical_bytes(&signed)?);
    Ok(SignedUpdateGroup {
        signed,
        signature: mac.finalize().into_bytes().to_vec(),
    })
}

/// Verify a signed group and return the trusted group, sorted by path
pub fn verify(key: &SigningKey, signed: &SignedUpdateGroup) -> Result<UpdateGroup, UpdateError> {
    let group = signed.signed.sorted();
    let mut mac = key.mac()?;
    mac.update(&canonical_bytes(&group)?);
    mac.verify_slice(&signed.signature)
        .map_err(|_| UpdateError::InvalidSignature)?;
    Ok(group)
}

/// Render the manifest block appended to a review-request body
pub fn encode_block(signed: &SignedUpdateGroup) -> Result<String, UpdateError> {
    let json = serde_json::to_string(signed)?;
    Ok(format!("\n{}\n{}\n{}", MANIFEST_MARKER, json, MANIFEST_END))
}

/// Sign a group and render its manifest block
pub fn sign_block(key: &SigningKey, group: &UpdateGroup) -> Result<String, UpdateError> {
    encode_block(&sign(key, group)?)
}

/// Find the last manifest block in `body`.
///
/// Returns `None` when there is no block or it does not decode.
pub fn extract(body: &str) -> Option<SignedUpdateGroup> {
    let start = body.rfind(MANIFEST_MARKER)? + MANIFEST_MARKER.len();
    let rest = &body[start..];
    let end = rest.find(MANIFEST_END)?;
    serde_json::from_str(rest[..end].trim()).ok()
}

/// Extract and verify the manifest of `body`.
///
/// `Ok(None)` when the body has no manifest; `InvalidSignature` when it has one that fails verification.
pub fn extract_verified(key: &SigningKey, body: &str) -> Result<Option<UpdateGroup>, UpdateError> {
    match extract(body) {
        Some(signed) => verify(key, &signed).map(Some),
        None => Ok(None),
    }
}
