//! File-level orchestration: encrypt/decrypt with metadata, and
//! non-recursive directory scans.
//!
//! Decryption verifies the plaintext hash *before* anything is written, so
//! a failed verification never leaves unverified plaintext on disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use lockbox_crypto::{sha256, Lea, LeaPcbc, OsRandom, RandomSource, Recovered};

use crate::error::DirectoryError;
use crate::sink::{activity, SharedSink};
use crate::{container, Algorithm, CoreError, Metadata};

/// What a directory scan should do to each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirAction {
    Encrypt,
    Decrypt,
}

pub struct FileProcessor {
    sink: SharedSink,
    rng: Arc<dyn RandomSource>,
}

impl FileProcessor {
    pub fn new(sink: SharedSink) -> Self {
        Self::with_random(sink, Arc::new(OsRandom))
    }

    /// Inject a specific randomness source (tests, hardware RNGs).
    pub fn with_random(sink: SharedSink, rng: Arc<dyn RandomSource>) -> Self {
        FileProcessor { sink, rng }
    }

    /// Encrypt `input` into a container at `output`.
    ///
    /// The container records the plaintext SHA-256 and, for PCBC, the hex
    /// IV. The output file is written atomically with owner-only
    /// permissions.
    pub fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        algorithm: Algorithm,
        key: &[u8],
    ) -> Result<Metadata, CoreError> {
        let data = std::fs::read(input)
            .map_err(|e| CoreError::io(format!("reading {}", input.display()), e))?;

        self.sink.info(
            activity::ENCRYPT,
            "starting file encryption",
            json!({
                "input_file": input.display().to_string(),
                "output_file": output.display().to_string(),
                "algorithm": algorithm.as_str(),
                "file_size": data.len(),
                "key_size": key.len() * 8,
            }),
        );

        let digest = sha256::hash_hex(&data);
        debug!(file = %input.display(), hash = %digest, "plaintext hash computed");

        let (ciphertext, iv) = match algorithm {
            Algorithm::Lea => {
                let cipher = Lea::new(key)?;
                (cipher.encrypt_message(&data)?, None)
            }
            Algorithm::LeaPcbc => {
                let cipher = LeaPcbc::new(key, self.rng.as_ref())?;
                let iv = *cipher.iv();
                (cipher.encrypt(&data)?, Some(iv))
            }
        };

        let metadata = Metadata::new(
            input.display().to_string(),
            data.len() as u64,
            algorithm,
            Some(digest.clone()),
            iv.as_ref().map(|iv| iv.as_slice()),
        );

        let bytes = container::emit(&metadata, &ciphertext)?;
        write_private(output, &bytes)?;

        self.sink.info(
            activity::ENCRYPT,
            "file encrypted",
            json!({
                "input_file": input.display().to_string(),
                "output_file": output.display().to_string(),
                "algorithm": algorithm.as_str(),
                "original_size": data.len(),
                "encrypted_size": bytes.len(),
                "hash_algorithm": "SHA-256",
                "iv_used": iv.is_some(),
            }),
        );

        Ok(metadata)
    }

    /// Decrypt the container at `input` into `output`, verifying the
    /// plaintext hash when the metadata carries one.
    pub fn decrypt_file(
        &self,
        input: &Path,
        output: &Path,
        key: &[u8],
    ) -> Result<Metadata, CoreError> {
        let data = std::fs::read(input)
            .map_err(|e| CoreError::io(format!("reading {}", input.display()), e))?;
        let (metadata, ciphertext) = container::parse(&data)?;

        self.sink.info(
            activity::DECRYPT,
            "starting file decryption",
            json!({
                "input_file": input.display().to_string(),
                "output_file": output.display().to_string(),
                "algorithm": metadata.encryption_algorithm.as_str(),
                "original_file": metadata.filename,
                "hash_present": metadata.hash.is_some(),
                "encrypted_size": ciphertext.len(),
            }),
        );

        self.decrypt_payload(&metadata, ciphertext, output, key)?;
        Ok(metadata)
    }

    /// Decrypt an already-parsed container body. The transfer server uses
    /// this directly with the metadata and ciphertext it received.
    pub fn decrypt_payload(
        &self,
        metadata: &Metadata,
        ciphertext: &[u8],
        output: &Path,
        key: &[u8],
    ) -> Result<(), CoreError> {
        let recovered: Recovered = match metadata.encryption_algorithm {
            Algorithm::Lea => Lea::new(key)?.decrypt_message(ciphertext)?,
            Algorithm::LeaPcbc => LeaPcbc::decrypt(key, ciphertext)?,
        };

        if recovered.suspect_padding {
            // Kept for wire compatibility; see the padding module.
            warn!(file = %metadata.filename, "trailing bytes do not look like valid padding");
            self.sink.warning(
                activity::DECRYPT,
                "suspect padding: data left unchanged",
                false,
                json!({ "file": metadata.filename }),
            );
        }

        if let Some(expected) = &metadata.hash {
            let actual = sha256::hash_hex(&recovered.plaintext);
            let matched = &actual == expected;
            self.sink.log_event(
                if matched {
                    crate::Level::Info
                } else {
                    crate::Level::Error
                },
                activity::VERIFY_HASH,
                if matched {
                    "hash verification successful"
                } else {
                    "hash verification failed"
                },
                matched,
                json!({
                    "file": metadata.filename,
                    "expected_hash": expected,
                    "actual_hash": actual,
                    "algorithm": metadata.hash_algorithm,
                }),
            );
            if !matched {
                return Err(CoreError::HashMismatch {
                    filename: metadata.filename.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        } else {
            self.sink.warning(
                activity::VERIFY_HASH,
                "no hash in metadata, skipping verification",
                true,
                json!({ "file": metadata.filename }),
            );
        }

        write_private(output, &recovered.plaintext)?;

        self.sink.info(
            activity::DECRYPT,
            "file decrypted",
            json!({
                "output_file": output.display().to_string(),
                "original_file": metadata.filename,
                "size": recovered.plaintext.len(),
                "hash_verified": metadata.hash.is_some(),
            }),
        );
        Ok(())
    }

    /// Apply `action` to every regular file at the top level of `dir`
    /// (subdirectories are skipped). Encryption appends `.enc` to the
    /// output name; decryption strips it. Stops at the first failure,
    /// reporting the files already processed.
    pub fn process_directory(
        &self,
        dir: &Path,
        output_dir: &Path,
        algorithm: Algorithm,
        key: &[u8],
        action: DirAction,
    ) -> Result<Vec<PathBuf>, DirectoryError> {
        let mut entries = list_files(dir).map_err(|e| DirectoryError {
            path: dir.to_path_buf(),
            processed: Vec::new(),
            source: Box::new(e),
        })?;
        entries.sort();

        debug!(dir = %dir.display(), files = entries.len(), ?action, "processing directory");

        let mut processed = Vec::new();
        for input in entries {
            let name = match input.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let result = match action {
                DirAction::Encrypt => {
                    let output = output_dir.join(format!("{name}.enc"));
                    self.encrypt_file(&input, &output, algorithm, key).map(|_| ())
                }
                DirAction::Decrypt => {
                    let stripped = name.strip_suffix(".enc").unwrap_or(&name);
                    let output = output_dir.join(stripped);
                    self.decrypt_file(&input, &output, key).map(|_| ())
                }
            };
            if let Err(e) = result {
                return Err(DirectoryError {
                    path: input,
                    processed,
                    source: Box::new(e),
                });
            }
            processed.push(input);
        }

        Ok(processed)
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CoreError::io(format!("reading directory {}", dir.display()), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::io("reading directory entry", e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| CoreError::io(format!("stat {}", entry.path().display()), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(files)
}

/// Atomic write with owner-only permissions: temp file in the target
/// directory, then rename over the destination.
fn write_private(path: &Path, data: &[u8]) -> Result<(), CoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .map_err(|e| CoreError::io(format!("creating directory {}", parent.display()), e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| CoreError::io(format!("creating temp file in {}", parent.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
            .map_err(|e| CoreError::io("setting temp file permissions", e))?;
    }

    tmp.write_all(data)
        .map_err(|e| CoreError::io(format!("writing {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| CoreError::io(format!("persisting {}", path.display()), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn processor() -> FileProcessor {
        FileProcessor::new(Arc::new(NullSink))
    }

    const KEY: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    ];

    #[test]
    fn payload_roundtrip_both_algorithms() {
        let dir = tempfile::tempdir().unwrap();
        for algorithm in [Algorithm::Lea, Algorithm::LeaPcbc] {
            let input = dir.path().join(format!("in-{algorithm}"));
            let encrypted = dir.path().join(format!("out-{algorithm}.enc"));
            let restored = dir.path().join(format!("back-{algorithm}"));
            std::fs::write(&input, b"payload roundtrip").unwrap();

            let metadata = processor()
                .encrypt_file(&input, &encrypted, algorithm, &KEY)
                .unwrap();
            assert_eq!(metadata.encryption_algorithm, algorithm);
            assert_eq!(metadata.iv.is_some(), algorithm == Algorithm::LeaPcbc);

            processor().decrypt_file(&encrypted, &restored, &KEY).unwrap();
            assert_eq!(std::fs::read(&restored).unwrap(), b"payload roundtrip");
        }
    }

    #[cfg(unix)]
    #[test]
    fn container_written_with_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out.enc");
        std::fs::write(&input, b"secret").unwrap();

        processor()
            .encrypt_file(&input, &output, Algorithm::LeaPcbc, &KEY)
            .unwrap();
        let mode = std::fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn directory_scan_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b"), b"b").unwrap();

        let processed = processor()
            .process_directory(dir.path(), out.path(), Algorithm::LeaPcbc, &KEY, DirAction::Encrypt)
            .unwrap();

        assert_eq!(processed, vec![dir.path().join("a")]);
        assert!(out.path().join("a.enc").exists());
        assert!(!out.path().join("b.enc").exists());
    }

    #[test]
    fn directory_scan_stops_on_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        // 1-ok.enc is a real container; 2-bad.enc is garbage; 3-never.enc
        // sorts after the failure and must not be touched.
        let plain = dir.path().join("plain");
        std::fs::write(&plain, b"fine").unwrap();
        processor()
            .encrypt_file(&plain, &dir.path().join("1-ok.enc"), Algorithm::LeaPcbc, &KEY)
            .unwrap();
        std::fs::remove_file(&plain).unwrap();
        std::fs::write(dir.path().join("2-bad.enc"), b"not a container").unwrap();
        std::fs::write(dir.path().join("3-never.enc"), b"also not one").unwrap();

        let err = processor()
            .process_directory(dir.path(), out.path(), Algorithm::LeaPcbc, &KEY, DirAction::Decrypt)
            .unwrap_err();

        assert_eq!(err.path, dir.path().join("2-bad.enc"));
        assert_eq!(err.processed, vec![dir.path().join("1-ok.enc")]);
        assert!(out.path().join("1-ok").exists());
        assert!(!out.path().join("3-never").exists());
    }
}
