mod common;

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Luma, LumaA, Rgba};
use trueshot_engine as ts;
use ts::adapters::canonical::canonicalize;
use ts::adapters::record::EMBED_KEY;
use ts::crypto::fingerprint::digest;
use ts::crypto::signer::{sign, sign_with, SigningKey};
use ts::crypto::timestamper::Timestamper;
use ts::domain::error::EngineError;
use ts::domain::record::SignatureRecord;
use ts::domain::types::{CanonicalProfile, MediaArtifact, SigAlg, VerifyConfig};
use ts::domain::verify::{InvalidReason, VerdictStatus};
use ts::orchestrator::{FileSource, UploadedFile, VerifySession};
use ts::{decode, embed_record, encode, extract_record, verify_embedded};

fn sign_bytes(bytes: &[u8], key: &SigningKey) -> SignatureRecord {
    let artifact = MediaArtifact::image(bytes.to_vec());
    sign(&digest(&canonicalize(&artifact).unwrap()), artifact.kind(), key).unwrap()
}

fn image_digest(bytes: &[u8]) -> ts::Digest {
    digest(&canonicalize(&MediaArtifact::image(bytes.to_vec())).unwrap())
}

fn encode_png(img: DynamicImage) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png).unwrap();
    out
}

/// 4x4 indexed PNG with a transparent palette entry and one text chunk.
fn palette_png() -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, 4, 4);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255]);
    encoder.set_trns(vec![255, 128, 0]);
    encoder.add_text_chunk("Software".into(), "test rig".into()).unwrap();
    let mut writer = encoder.write_header().unwrap();
    writer
        .write_image_data(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2, 0])
        .unwrap();
    writer.finish().unwrap();
    out
}

fn png_text(bytes: &[u8]) -> Vec<(String, String)> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info().unwrap();
    reader
        .info()
        .uncompressed_latin1_text
        .iter()
        .map(|c| (c.keyword.clone(), c.text.clone()))
        .collect()
}

fn upload(bytes: Vec<u8>) -> Arc<UploadedFile> {
    Arc::new(UploadedFile { bytes, declared_mime: None, name: None })
}

#[test]
fn png_carrier_keeps_its_digest_and_verifies() {
    let (sk, vk) = common::keypair(SigAlg::Ed25519);
    let original = common::make_test_png_bytes();
    let record = sign_bytes(&original, &sk);

    let carrier = embed_record(&original, &record).unwrap();
    assert_ne!(carrier, original);
    assert_eq!(image_digest(&carrier), record.digest);
    assert_eq!(decode(&extract_record(&carrier).unwrap()).unwrap(), record);

    let verdict = verify_embedded(&MediaArtifact::image(carrier), &vk).unwrap();
    assert_eq!(verdict.status, VerdictStatus::Authentic);
    assert_eq!(verdict.timestamp, Some(record.timestamp));
}

#[test]
fn jpeg_carrier_keeps_its_digest_and_verifies() {
    let (sk, vk) = common::keypair(SigAlg::Es256);
    let original = common::make_test_jpeg_bytes();
    let record = sign_bytes(&original, &sk);

    let carrier = embed_record(&original, &record).unwrap();
    assert_eq!(image_digest(&carrier), image_digest(&original));
    assert_eq!(extract_record(&carrier).unwrap(), encode(&record).unwrap());

    let verdict = verify_embedded(&MediaArtifact::image(carrier), &vk).unwrap();
    assert_eq!(verdict.status, VerdictStatus::Authentic);
}

#[test]
fn sample_layouts_survive_embedding() {
    let (sk, _vk) = common::keypair(SigAlg::Ed25519);
    let grey16 = ImageBuffer::from_fn(5, 3, |x, y| Luma([(x * 13_000 + y * 7) as u16]));
    let grey_alpha = ImageBuffer::from_fn(3, 5, |x, y| LumaA([(x * 60) as u8, (y * 50) as u8]));
    let rgba = ImageBuffer::from_fn(7, 2, |x, y| Rgba([x as u8, y as u8, 9, (x * 30) as u8]));
    let cases = [
        encode_png(DynamicImage::ImageLuma16(grey16)),
        encode_png(DynamicImage::ImageLumaA8(grey_alpha)),
        encode_png(DynamicImage::ImageRgba8(rgba)),
        palette_png(),
    ];
    for (i, original) in cases.iter().enumerate() {
        let record = sign_bytes(original, &sk);
        let carrier = embed_record(original, &record).unwrap();
        assert_eq!(image_digest(&carrier), record.digest, "case {i}");
    }
}

#[test]
fn re_embedding_replaces_the_record_and_keeps_other_text() {
    let (sk, _vk) = common::keypair(SigAlg::Ed25519);
    let original = palette_png();
    let d = image_digest(&original);
    let at = |ts: &str| -> SignatureRecord {
        let stamper: Timestamper = format!("fixed:{ts}").parse().unwrap();
        sign_with(&d, CanonicalProfile::ImageRgba8V1, &sk, &stamper, "TrueShot").unwrap()
    };
    let first = at("2026-01-26T15:30:00Z");
    let second = at("2026-02-01T08:00:00Z");

    let once = embed_record(&original, &first).unwrap();
    let twice = embed_record(&once, &second).unwrap();
    assert_eq!(decode(&extract_record(&twice).unwrap()).unwrap(), second);

    let text = png_text(&twice);
    assert_eq!(text.iter().filter(|(k, _)| k == EMBED_KEY).count(), 1);
    assert!(text.contains(&("Software".to_string(), "test rig".to_string())));
}

#[test]
fn record_moved_to_other_content_is_tampered() {
    let (sk, vk) = common::keypair(SigAlg::Ed25519);
    let record = sign_bytes(&common::make_test_png_bytes(), &sk);
    let carrier = embed_record(&common::make_modified_png_bytes(), &record).unwrap();

    let verdict = verify_embedded(&MediaArtifact::image(carrier), &vk).unwrap();
    assert_eq!(verdict.status, VerdictStatus::Tampered);
}

#[test]
fn forged_embedded_record_is_invalid() {
    let (sk, vk) = common::keypair(SigAlg::Ed25519);
    let original = common::make_test_png_bytes();
    let mut record = sign_bytes(&original, &sk);
    record.signature[0] ^= 0x01;
    let carrier = embed_record(&original, &record).unwrap();

    let verdict = verify_embedded(&MediaArtifact::image(carrier), &vk).unwrap();
    assert_eq!(verdict.status, VerdictStatus::Invalid);
    assert_eq!(verdict.reason, Some(InvalidReason::SignatureInvalid));
}

#[test]
fn plain_media_has_no_record() {
    let (_sk, vk) = common::keypair(SigAlg::Ed25519);
    for bytes in [common::make_test_png_bytes(), common::make_test_jpeg_bytes(), common::make_test_bmp_bytes()] {
        assert!(extract_record(&bytes).is_none());
        let verdict = verify_embedded(&MediaArtifact::image(bytes), &vk).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Invalid);
        assert_eq!(verdict.reason, Some(InvalidReason::MissingRecord));
        assert_eq!(verdict.details(), "no signature record found");
    }
}

#[test]
fn only_stills_can_carry_a_record() {
    let (sk, _vk) = common::keypair(SigAlg::Ed25519);
    let record = sign_bytes(&common::make_test_png_bytes(), &sk);
    for bytes in [common::make_test_gif_bytes(&[10, 20], 500), common::make_test_bmp_bytes(), b"????".to_vec()] {
        let err = embed_record(&bytes, &record).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(_)), "{err:?}");
    }
}

#[tokio::test]
async fn session_prefers_the_embedded_record() {
    let (sk, vk) = common::keypair(SigAlg::Ed25519);
    let original = common::make_test_png_bytes();
    let carrier = embed_record(&original, &sign_bytes(&original, &sk)).unwrap();
    let session = VerifySession::new(VerifyConfig::secure_default(vk));

    // The sidecar is never read while a record is embedded.
    let junk: Arc<dyn FileSource> = upload(b"not a record".to_vec());
    let verdict = session.run_embedded(upload(carrier), Some(junk)).await.unwrap();
    assert_eq!(verdict.status, VerdictStatus::Authentic);
}

#[tokio::test]
async fn session_falls_back_to_the_sidecar() {
    let (sk, vk) = common::keypair(SigAlg::Ed25519);
    let original = common::make_test_png_bytes();
    let sidecar: Arc<dyn FileSource> = upload(encode(&sign_bytes(&original, &sk)).unwrap());
    let session = VerifySession::new(VerifyConfig::secure_default(vk));

    let verdict = session
        .run_embedded(upload(original.clone()), Some(sidecar))
        .await
        .unwrap();
    assert_eq!(verdict.status, VerdictStatus::Authentic);

    let verdict = session.run_embedded(upload(original), None).await.unwrap();
    assert_eq!(verdict.status, VerdictStatus::Invalid);
    assert_eq!(verdict.reason, Some(InvalidReason::MissingRecord));
}
