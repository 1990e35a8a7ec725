//! Canonical-form MD5 digests for device status payloads.
//!
//! Two semantically identical payloads must hash identically even when
//! their producers inserted object keys in different orders, so the
//! payload is canonicalized (all object keys recursively sorted, arrays
//! kept in order, compact serialization) before hashing.
//!
//! The digest is an integrity check against transcription bugs, not a
//! security boundary; MD5 is fixed by the fleet's wire contract.
//!
//! The primary path shells out to `openssl md5` and falls back to the
//! in-process implementation when the binary is missing or misbehaves.
//! Both paths produce byte-identical output for the same canonical
//! input -- mixed deployments must agree on every digest.

use std::process::Stdio;

use md5::{Digest, Md5};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Compute the canonical MD5 hex digest of a JSON payload.
pub async fn digest(value: &Value) -> String {
    let bytes = canonical_bytes(value);
    match openssl_md5(&bytes).await {
        Ok(hex) => hex,
        Err(_) => md5_hex(&bytes),
    }
}

/// Verify a payload against an expected digest.
///
/// Never fails; comparison is case-insensitive. Callers treat a `false`
/// result as a soft failure (log and proceed).
pub async fn verify(value: &Value, expected: &str) -> bool {
    digest(value).await.eq_ignore_ascii_case(expected)
}

/// Canonical byte form of a payload.
///
/// Structured values are key-sorted and serialized compactly. String
/// values are parsed as JSON first (the producing side may have
/// pre-serialized the payload); unparseable strings hash raw.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed) => serialize_canonical(&parsed),
            Err(_) => s.as_bytes().to_vec(),
        },
        other => serialize_canonical(other),
    }
}

fn serialize_canonical(value: &Value) -> Vec<u8> {
    serde_json::to_string(&canonicalize(value))
        .expect("canonical JSON value is always serialisable")
        .into_bytes()
}

/// Recursively sort object keys. Array order is significant and kept.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        primitive => primitive.clone(),
    }
}

/// In-process MD5 hex digest.
pub fn md5_hex(data: &[u8]) -> String {
    let hash = Md5::digest(data);
    format!("{hash:x}")
}

/// Pipe bytes through `openssl md5` and parse the hex digest from
/// `(stdin)= <hex>` output.
async fn openssl_md5(data: &[u8]) -> Result<String, std::io::Error> {
    let mut child = Command::new("openssl")
        .arg("md5")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(data).await?;
        stdin.shutdown().await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "openssl md5 exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let digest = stdout
        .rsplit('=')
        .next()
        .map(str::trim)
        .filter(|d| d.len() == 32 && d.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| {
            std::io::Error::other(format!("unexpected openssl md5 output: {stdout:?}"))
        })?;

    Ok(digest.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn known_vector() {
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn canonical_bytes_sorts_keys_recursively() {
        let a = json!({"b": {"y": 2, "x": 1}, "a": [3, 1]});
        let b = json!({"a": [3, 1], "b": {"x": 1, "y": 2}});
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(
            String::from_utf8(canonical_bytes(&a)).unwrap(),
            r#"{"a":[3,1],"b":{"x":1,"y":2}}"#
        );
    }

    #[test]
    fn array_order_is_preserved() {
        let a = json!([1, 2]);
        let b = json!([2, 1]);
        assert_ne!(canonical_bytes(&a), canonical_bytes(&b));
    }

    #[test]
    fn json_string_input_is_parsed_and_canonicalized() {
        let raw = Value::String(r#"{"z":1,"a":2}"#.to_string());
        let structured = json!({"a": 2, "z": 1});
        assert_eq!(canonical_bytes(&raw), canonical_bytes(&structured));
    }

    #[test]
    fn non_json_string_hashes_raw_bytes() {
        let raw = Value::String("not json at all".to_string());
        assert_eq!(canonical_bytes(&raw), b"not json at all".to_vec());
    }

    #[tokio::test]
    async fn digest_round_trip_verifies() {
        let payload = json!({"mac": "AA:BB", "state": "online"});
        let d = digest(&payload).await;
        assert!(verify(&payload, &d).await);
        assert!(verify(&payload, &d.to_uppercase()).await);
    }

    #[tokio::test]
    async fn digest_is_invariant_under_key_order() {
        let a = json!({"mac": "AA:BB", "name": "dev", "ip": "10.0.0.2"});
        let b = json!({"ip": "10.0.0.2", "mac": "AA:BB", "name": "dev"});
        assert_eq!(digest(&a).await, digest(&b).await);
    }

    #[tokio::test]
    async fn digest_changes_when_a_value_changes() {
        let a = json!({"mac": "AA:BB", "state": "online"});
        let b = json!({"mac": "AA:BB", "state": "degraded"});
        assert_ne!(digest(&a).await, digest(&b).await);
    }

    // The external and in-process paths must agree byte-for-byte. On
    // hosts without an openssl binary this still passes because digest()
    // falls back to md5_hex.
    #[tokio::test]
    async fn external_and_fallback_paths_agree() {
        let payload = json!({"a": 1, "b": [true, null, "x"]});
        let via_digest = digest(&payload).await;
        assert_eq!(via_digest, md5_hex(&canonical_bytes(&payload)));
    }
}
