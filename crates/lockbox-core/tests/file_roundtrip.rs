//! End-to-end container tests: encrypt a file, decrypt it back, tamper
//! with the ciphertext, and scan directories.

use std::path::Path;
use std::sync::Arc;

use lockbox_core::{container, Algorithm, CoreError, DirAction, FileProcessor, NullSink};
use lockbox_crypto::sha256;
use tempfile::TempDir;

const KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

fn processor() -> FileProcessor {
    FileProcessor::new(Arc::new(NullSink))
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

#[test]
fn encrypt_decrypt_file_with_hash_in_metadata() {
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "plain.txt", b"hello world\n");
    let encrypted = tmp.path().join("plain.txt.enc");
    let restored = tmp.path().join("restored.txt");

    let metadata = processor()
        .encrypt_file(&plain, &encrypted, Algorithm::LeaPcbc, &KEY)
        .expect("encrypt");

    assert_eq!(metadata.size, 12);
    assert_eq!(
        metadata.hash.as_deref(),
        Some(sha256::hash_hex(b"hello world\n").as_str())
    );
    assert_eq!(metadata.hash_algorithm.as_deref(), Some("SHA-256"));
    assert!(metadata.iv.is_some());

    let parsed = processor()
        .decrypt_file(&encrypted, &restored, &KEY)
        .expect("decrypt");

    assert_eq!(std::fs::read(&restored).unwrap(), b"hello world\n");
    assert_eq!(parsed.filename, plain.display().to_string());
}

#[test]
fn container_layout_on_disk() {
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "data.bin", &[7u8; 100]);
    let encrypted = tmp.path().join("data.bin.enc");

    processor()
        .encrypt_file(&plain, &encrypted, Algorithm::LeaPcbc, &KEY)
        .unwrap();

    let bytes = std::fs::read(&encrypted).unwrap();
    let (metadata, ciphertext) = container::parse(&bytes).expect("valid container");

    // PCBC payload: 16-byte IV + padded plaintext (100 → 112).
    assert_eq!(ciphertext.len(), 16 + 112);
    let iv_hex = metadata.iv.expect("iv recorded");
    assert_eq!(hex::decode(&iv_hex).unwrap(), &ciphertext[..16]);
}

#[test]
fn lea_mode_has_no_iv() {
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "data.bin", &[1u8; 32]);
    let encrypted = tmp.path().join("data.bin.enc");

    let metadata = processor()
        .encrypt_file(&plain, &encrypted, Algorithm::Lea, &KEY)
        .unwrap();
    assert!(metadata.iv.is_none());

    let bytes = std::fs::read(&encrypted).unwrap();
    let (_, ciphertext) = container::parse(&bytes).unwrap();
    assert_eq!(ciphertext.len(), 48, "32 bytes pad to 48, no IV prefix");
}

#[test]
fn tampered_ciphertext_fails_hash_check_and_leaves_no_output() {
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "plain.txt", b"hello world\n");
    let encrypted = tmp.path().join("plain.txt.enc");
    let restored = tmp.path().join("restored.txt");

    processor()
        .encrypt_file(&plain, &encrypted, Algorithm::LeaPcbc, &KEY)
        .unwrap();

    // Flip one byte in the ciphertext region (after the metadata header
    // and the IV). PCBC is unauthenticated, so decryption still completes;
    // only the hash check catches the damage.
    let mut bytes = std::fs::read(&encrypted).unwrap();
    let header_len = 4 + u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let target = header_len + 16 + 3;
    bytes[target] ^= 0x01;
    std::fs::write(&encrypted, &bytes).unwrap();

    let err = processor()
        .decrypt_file(&encrypted, &restored, &KEY)
        .expect_err("tampering must be detected");

    match err {
        CoreError::HashMismatch { expected, actual, .. } => {
            assert_ne!(expected, actual);
            assert_eq!(expected, sha256::hash_hex(b"hello world\n"));
        }
        other => panic!("expected HashMismatch, got {other}"),
    }
    assert!(
        !restored.exists(),
        "unverified plaintext must not reach disk"
    );
}

#[test]
fn wrong_key_fails_hash_check() {
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "plain.txt", b"some content here");
    let encrypted = tmp.path().join("plain.txt.enc");
    let restored = tmp.path().join("restored.txt");

    processor()
        .encrypt_file(&plain, &encrypted, Algorithm::LeaPcbc, &KEY)
        .unwrap();

    let mut wrong = KEY;
    wrong[0] ^= 0xff;
    let err = processor()
        .decrypt_file(&encrypted, &restored, &wrong)
        .expect_err("wrong key must not verify");
    assert!(matches!(err, CoreError::HashMismatch { .. }));
    assert!(!restored.exists());
}

#[test]
fn directory_scan_encrypts_then_decrypts_three_files() {
    let src = TempDir::new().unwrap();
    let enc = TempDir::new().unwrap();
    let back = TempDir::new().unwrap();

    write_file(src.path(), "a", b"alpha");
    write_file(src.path(), "b", b"bravo");
    write_file(src.path(), "c", b"charlie");

    let processed = processor()
        .process_directory(src.path(), enc.path(), Algorithm::LeaPcbc, &KEY, DirAction::Encrypt)
        .expect("encrypt scan");
    assert_eq!(processed.len(), 3);
    for name in ["a.enc", "b.enc", "c.enc"] {
        assert!(enc.path().join(name).exists(), "missing {name}");
    }

    let processed = processor()
        .process_directory(enc.path(), back.path(), Algorithm::LeaPcbc, &KEY, DirAction::Decrypt)
        .expect("decrypt scan");
    assert_eq!(processed.len(), 3);

    assert_eq!(std::fs::read(back.path().join("a")).unwrap(), b"alpha");
    assert_eq!(std::fs::read(back.path().join("b")).unwrap(), b"bravo");
    assert_eq!(std::fs::read(back.path().join("c")).unwrap(), b"charlie");
}

#[test]
fn decrypts_container_without_hash_field() {
    // Legacy containers may omit the hash entirely; decryption proceeds
    // without verification.
    let tmp = TempDir::new().unwrap();
    let plain = write_file(tmp.path(), "plain", b"unverified but intact");
    let encrypted = tmp.path().join("plain.enc");
    let restored = tmp.path().join("restored");

    processor()
        .encrypt_file(&plain, &encrypted, Algorithm::LeaPcbc, &KEY)
        .unwrap();

    // Rewrite the container with the hash fields stripped.
    let bytes = std::fs::read(&encrypted).unwrap();
    let (mut metadata, ciphertext) = container::parse(&bytes).unwrap();
    metadata.hash = None;
    metadata.hash_algorithm = None;
    let stripped = container::emit(&metadata, ciphertext).unwrap();
    std::fs::write(&encrypted, &stripped).unwrap();

    processor()
        .decrypt_file(&encrypted, &restored, &KEY)
        .expect("no hash means no verification");
    assert_eq!(std::fs::read(&restored).unwrap(), b"unverified but intact");
}
