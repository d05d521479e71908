//! Content-hash verification of installed files
//!
//! Drift detection compares the digest of a file on disk against the digest
//! recorded for its [`FileEntry`]. A missing or unreadable file is drift, not
//! a verifier fault, so [`verify`] never returns an error.

use crate::entry::{FileEntry, HashAlgorithm};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Check whether the installed copy of `entry` under `root` matches its recorded digest
pub fn verify(root: &Path, entry: &FileEntry) -> bool {
    let path = entry.local_path(root);

    match file_digest(&path, entry.hash_algorithm()) {
        Ok(computed) => {
            let matches = computed.eq_ignore_ascii_case(entry.hash_value());
            if !matches {
                debug!(
                    path = %entry.full_path(),
                    expected = %entry.hash_value(),
                    computed = %computed,
                    "checksum mismatch"
                );
            }
            matches
        }
        Err(e) => {
            debug!(path = %entry.full_path(), error = %e, "cannot read file for verification");
            false
        }
    }
}

/// Compute the lowercase hex digest of the file at `path`
pub fn file_digest(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    let file = File::open(path)?;

    match algorithm {
        HashAlgorithm::Sha1 => digest_reader::<Sha1, _>(file),
        HashAlgorithm::Sha256 => digest_reader::<Sha256, _>(file),
    }
}

/// Compute the lowercase hex digest of an in-memory buffer
pub fn bytes_digest(bytes: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Sha1 => format!("{:x}", Sha1::digest(bytes)),
        HashAlgorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String>
where
    sha2::digest::Output<D>: std::fmt::LowerHex,
{
    let mut hasher = D::new();
    let mut buffer = vec![0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use url::Url;

    // sha1("Hello, World!")
    const HELLO_SHA1: &str = "0a0a9f2a6772942557ab5355d76af442f8f65e01";
    // sha256("Hello, World!")
    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    fn entry_for(directory: &str, name: &str, algorithm: HashAlgorithm, hash: &str) -> FileEntry {
        let url = Url::parse("https://files.example.com/file").unwrap();
        FileEntry::new(directory, url, name, algorithm, hash).unwrap()
    }

    #[test]
    fn test_file_digest_known_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hello.txt");
        fs::write(&path, b"Hello, World!").unwrap();

        assert_eq!(file_digest(&path, HashAlgorithm::Sha1).unwrap(), HELLO_SHA1);
        assert_eq!(file_digest(&path, HashAlgorithm::Sha256).unwrap(), HELLO_SHA256);
        assert_eq!(bytes_digest(b"Hello, World!", HashAlgorithm::Sha1), HELLO_SHA1);
    }

    #[test]
    fn test_verify_valid() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("config")).unwrap();
        fs::write(temp_dir.path().join("config/hello.txt"), b"Hello, World!").unwrap();

        let entry = entry_for("config", "hello.txt", HashAlgorithm::Sha1, HELLO_SHA1);
        assert!(verify(temp_dir.path(), &entry));

        let entry = entry_for("config", "hello.txt", HashAlgorithm::Sha256, HELLO_SHA256);
        assert!(verify(temp_dir.path(), &entry));
    }

    #[test]
    fn test_verify_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("hello.txt"), b"Hello, World!").unwrap();

        let upper = HELLO_SHA1.to_uppercase();
        let entry = entry_for("./", "hello.txt", HashAlgorithm::Sha1, &upper);
        assert!(verify(temp_dir.path(), &entry), "Uppercase digest should pass");
    }

    #[test]
    fn test_verify_modified_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("hello.txt"), b"Hello, World?").unwrap();

        let entry = entry_for("./", "hello.txt", HashAlgorithm::Sha1, HELLO_SHA1);
        assert!(!verify(temp_dir.path(), &entry), "Modified file should fail");
    }

    #[test]
    fn test_verify_missing_file_is_drift() {
        let temp_dir = TempDir::new().unwrap();

        let entry = entry_for("mods", "missing.jar", HashAlgorithm::Sha1, HELLO_SHA1);
        assert!(!verify(temp_dir.path(), &entry), "Missing file should fail, not panic");
    }

    #[test]
    fn test_verify_from_many_threads() {
        let temp_dir = TempDir::new().unwrap();
        let mut entries = Vec::new();
        for i in 0..8 {
            let name = format!("file{}.txt", i);
            fs::write(temp_dir.path().join(&name), b"Hello, World!").unwrap();
            entries.push(entry_for("./", &name, HashAlgorithm::Sha1, HELLO_SHA1));
        }

        let root = temp_dir.path();
        std::thread::scope(|scope| {
            let handles: Vec<_> = entries
                .iter()
                .map(|entry| scope.spawn(move || verify(root, entry)))
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap());
            }
        });
    }
}
