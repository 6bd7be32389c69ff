#![allow(dead_code)]

use std::io::Write;
use std::sync::Mutex;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageBuffer, Rgb, RgbaImage};
use rcgen::KeyPair;
use tempfile::TempDir;
use trueshot_engine::crypto::signer::{generate_keypair, SigningKey, VerifyingKey};
use trueshot_engine::domain::session::{ProgressEvent, ProgressListener};
use trueshot_engine::domain::types::SigAlg;

/// Deterministic 16x16 RGB test pattern.
pub fn test_pattern() -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    ImageBuffer::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8]))
}

fn encode(img: image::DynamicImage, format: image::ImageOutputFormat) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut out);
    img.write_to(&mut cursor, format).expect("encode");
    out
}

/// The test pattern as PNG bytes.
pub fn make_test_png_bytes() -> Vec<u8> {
    encode(image::DynamicImage::ImageRgb8(test_pattern()), image::ImageOutputFormat::Png)
}

/// The same pixels as [`make_test_png_bytes`], in a BMP container.
pub fn make_test_bmp_bytes() -> Vec<u8> {
    encode(image::DynamicImage::ImageRgb8(test_pattern()), image::ImageOutputFormat::Bmp)
}

/// Create a tiny RGB JPEG image and return its bytes.
pub fn make_test_jpeg_bytes() -> Vec<u8> {
    // 8x8 solid color image
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(8, 8, |_x, _y| Rgb([128, 200, 50]));
    encode(image::DynamicImage::ImageRgb8(img), image::ImageOutputFormat::Jpeg(80))
}

/// PNG of the test pattern with one pixel changed.
pub fn make_modified_png_bytes() -> Vec<u8> {
    let mut img = test_pattern();
    let px = img.get_pixel_mut(3, 5);
    px.0[0] = px.0[0].wrapping_add(1);
    encode(image::DynamicImage::ImageRgb8(img), image::ImageOutputFormat::Png)
}

/// Animated GIF whose frames are solid grey at the given levels, each shown
/// for `delay_ms`.
pub fn make_test_gif_bytes(levels: &[u8], delay_ms: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite).expect("repeat");
        let frames = levels.iter().map(|&v| {
            Frame::from_parts(
                RgbaImage::from_pixel(32, 24, image::Rgba([v, v, v, 255])),
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms, 1),
            )
        });
        encoder.encode_frames(frames).expect("gif encode");
    }
    out
}

/// Generate an ES256 key with rcgen; returns the PKCS#8 private key PEM.
pub fn generate_es256_private_pem() -> String {
    let key = KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256).expect("keypair");
    key.serialize_pem()
}

/// Fresh keypair loaded into engine types.
pub fn keypair(alg: SigAlg) -> (SigningKey, VerifyingKey) {
    let (private, _public) = generate_keypair(alg).expect("keygen");
    let signing = SigningKey::from_pem(private.as_bytes()).expect("load key");
    let verifying = signing.verifying_key().expect("public key");
    (signing, verifying)
}

/// Put a fresh Ed25519 key in `var` and return (env key URI, public key).
pub fn setup_env_key(var: &str) -> (String, VerifyingKey) {
    let (private, public) = generate_keypair(SigAlg::Ed25519).expect("keygen");
    std::env::set_var(var, private.as_str());
    (format!("env:{var}"), VerifyingKey::from_pem(public.as_bytes()).expect("public key"))
}

/// Write a fresh key pair to a temp dir; returns (dir, local key URI, public key).
pub fn setup_local_key_files(alg: SigAlg) -> (TempDir, String, VerifyingKey) {
    let (private, public) = generate_keypair(alg).expect("keygen");
    let dir = tempfile::tempdir().expect("tempdir");
    let key_path = dir.path().join("private.pem");
    std::fs::File::create(&key_path)
        .and_then(|mut f| f.write_all(private.as_bytes()))
        .expect("write key");
    let uri = format!("local:{}", key_path.display());
    (dir, uri, VerifyingKey::from_pem(public.as_bytes()).expect("public key"))
}

/// Collects progress events for assertions.
#[derive(Default)]
pub struct RecordingListener(pub Mutex<Vec<ProgressEvent>>);

impl ProgressListener for RecordingListener {
    fn on_progress(&self, event: ProgressEvent) {
        self.0.lock().unwrap().push(event);
    }
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.0.lock().unwrap().clone()
    }
}
