mod common;

use serde_json::{json, Value};
use trueshot_engine as ts;
use ts::adapters::record::{decode, encode, read_record, write_record, RecordError};
use ts::crypto::fingerprint::Digest;
use ts::crypto::signer::sign_with;
use ts::domain::error::EngineError;
use ts::domain::record::SignatureRecord;
use ts::domain::types::{CanonicalProfile, MediaKind, SigAlg};

fn signed_record() -> SignatureRecord {
    let (sk, _) = common::keypair(SigAlg::Ed25519);
    sign_with(
        &Digest::from_bytes([0xcd; 32]),
        CanonicalProfile::ImageRgba8V1,
        &sk,
        &"fixed:2026-01-26T15:30:00.250Z".parse::<ts::Timestamper>().unwrap(),
        "TrueShot",
    )
    .unwrap()
}

fn as_json(record: &SignatureRecord) -> Value {
    serde_json::from_slice(&encode(record).unwrap()).unwrap()
}

fn decode_value(v: &Value) -> Result<SignatureRecord, RecordError> {
    decode(&serde_json::to_vec(v).unwrap())
}

#[test]
fn encode_then_decode_is_identity() {
    let record = signed_record();
    assert_eq!(decode(&encode(&record).unwrap()).unwrap(), record);
}

#[test]
fn reads_records_written_without_optional_fields() {
    let record = signed_record();
    let mut v = as_json(&record);
    let obj = v.as_object_mut().unwrap();
    obj.remove("signatureAlgorithm");
    obj.remove("metadata");

    let decoded = decode_value(&v).unwrap();
    assert_eq!(decoded.signature_alg, SigAlg::Ed25519);
    assert_eq!(decoded.metadata.tool, "unknown");
    assert_eq!(decoded.metadata.format, CanonicalProfile::ImageRgba8V1);
}

#[test]
fn unknown_fields_are_ignored() {
    let record = signed_record();
    let mut v = as_json(&record);
    v["deviceModel"] = json!("Pixel 9");
    v["metadata"]["location"] = json!({"lat": 1.0});
    assert_eq!(decode_value(&v).unwrap(), record);
}

#[test]
fn minor_version_bumps_are_readable() {
    let mut v = as_json(&signed_record());
    v["version"] = json!("1.3");
    assert_eq!(decode_value(&v).unwrap().version, "1.3");

    v["version"] = json!("2.0");
    assert!(matches!(decode_value(&v), Err(RecordError::UnsupportedAlgorithm(_))));
}

#[test]
fn missing_required_fields_are_malformed() {
    let paths: [&[&str]; 6] = [&["hash", "value"], &["signature"], &["timestamp"], &["mediaType"], &["hash"], &["version"]];
    for path in paths {
        let mut v = as_json(&signed_record());
        let (last, parents) = path.split_last().unwrap();
        let mut target = &mut v;
        for p in parents {
            target = &mut target[*p];
        }
        target.as_object_mut().unwrap().remove(*last);
        match decode_value(&v) {
            Err(RecordError::Malformed(msg)) => assert!(msg.contains("missing"), "{msg}"),
            other => panic!("{path:?}: expected Malformed, got {other:?}"),
        }
    }
}

#[test]
fn wrong_lengths_are_malformed() {
    let mut v = as_json(&signed_record());
    v["hash"]["value"] = json!("abcd");
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));

    let mut v = as_json(&signed_record());
    v["hash"]["value"] = json!("zz".repeat(32));
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));

    let mut v = as_json(&signed_record());
    v["signature"] = json!("AAAA");
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));

    let mut v = as_json(&signed_record());
    v["signature"] = json!("not base64 at all!");
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));
}

#[test]
fn unknown_algorithms_are_unsupported() {
    let mut v = as_json(&signed_record());
    v["hash"]["algorithm"] = json!("MD5");
    assert!(matches!(decode_value(&v), Err(RecordError::UnsupportedAlgorithm(_))));

    let mut v = as_json(&signed_record());
    v["signatureAlgorithm"] = json!("RS256");
    assert!(matches!(decode_value(&v), Err(RecordError::UnsupportedAlgorithm(_))));

    let mut v = as_json(&signed_record());
    v["metadata"]["format"] = json!("PNG");
    assert!(matches!(decode_value(&v), Err(RecordError::UnsupportedAlgorithm(_))));
}

#[test]
fn hash_algorithm_spelling_is_lenient() {
    let mut v = as_json(&signed_record());
    v["hash"]["algorithm"] = json!("sha-256");
    assert!(decode_value(&v).is_ok());
}

#[test]
fn format_must_match_media_type() {
    let mut v = as_json(&signed_record());
    v["mediaType"] = json!("video");
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));

    v["mediaType"] = json!("audio");
    assert!(matches!(decode_value(&v), Err(RecordError::Malformed(_))));
}

#[test]
fn hostile_inputs_do_not_panic() {
    for input in [&b""[..], b"null", b"[]", b"{\"hash\": 5}", b"{\"version\": {}}", b"\xff\xff\xff"] {
        assert!(decode(input).is_err());
    }
}

#[test]
fn sidecar_files_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.png.trueshot.json");
    let record = signed_record();
    write_record(&path, &record).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\n  \"mediaType\": \"image\""), "pretty printed: {text}");
    assert_eq!(read_record(&path).unwrap(), record);
}

#[test]
fn sidecar_content_errors_are_record_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, b"{\"version\": \"1.0\"").unwrap();
    assert!(matches!(read_record(&path), Err(EngineError::MalformedRecord(_))));

    assert!(matches!(read_record(&dir.path().join("absent.json")), Err(EngineError::Io(_))));
}

#[test]
fn media_kind_is_written_as_lowercase() {
    let v = as_json(&signed_record());
    assert_eq!(v["mediaType"], json!(MediaKind::Image.as_str()));
}

#[test]
fn only_the_signed_timestamp_spelling_is_accepted() {
    let record = signed_record();
    assert_eq!(as_json(&record)["timestamp"], json!("2026-01-26T15:30:00.250Z"));

    for edited in ["2026-01-26T15:30:00.250999999Z", "2026-01-26T15:30:00.250+00:00", "2026-01-26T15:30:00.25Z"] {
        let mut v = as_json(&record);
        v["timestamp"] = json!(edited);
        match decode_value(&v) {
            Err(RecordError::Malformed(msg)) => assert!(msg.contains("canonical form"), "{msg}"),
            other => panic!("{edited}: expected Malformed, got {other:?}"),
        }
    }
}

#[test]
fn decoded_records_re_encode_to_the_same_record() {
    let bytes = encode(&signed_record()).unwrap();
    let once = decode(&bytes).unwrap();
    let twice = decode(&encode(&once).unwrap()).unwrap();
    assert_eq!(once, twice);
}
