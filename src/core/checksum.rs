//! Content hashing for manifests and track files
//!
//! Hashes are hex-encoded SHA-512 digests of the exact file bytes. The reader
//! is rewound before and after hashing, so hashing the same open file twice
//! yields the same value and a following read still sees the whole content.

use sha2::{Digest, Sha512};
use std::io::{self, Read, Seek, SeekFrom};

const BUFFER_SIZE: usize = 64 * 1024;

/// Hashes the full content of a seekable reader
///
/// # Examples
///
/// ```
/// use gpxload::core::checksum::hash_reader;
/// use std::io::Cursor;
///
/// let mut cursor = Cursor::new(b"<gpx/>".to_vec());
/// let first = hash_reader(&mut cursor).unwrap();
/// let second = hash_reader(&mut cursor).unwrap();
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 128);
/// ```
pub fn hash_reader<R: Read + Seek>(reader: &mut R) -> io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;

    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    reader.seek(SeekFrom::Start(0))?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hashes a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha512::digest(data))
}

/// Recomputes the hash of `reader` and compares it with `expected`
///
/// The comparison does not short-circuit on the first differing byte.
pub fn verify_checksum<R: Read + Seek>(reader: &mut R, expected: &str) -> io::Result<bool> {
    let actual = hash_reader(reader)?;
    Ok(constant_time_eq(actual.as_bytes(), expected.as_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_is_idempotent_on_open_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<gpx><trk/></gpx>").unwrap();
        file.flush().unwrap();

        let mut handle = file.reopen().unwrap();
        let first = hash_reader(&mut handle).unwrap();
        let second = hash_reader(&mut handle).unwrap();
        assert_eq!(first, second);

        let mut content = String::new();
        handle.read_to_string(&mut content).unwrap();
        assert_eq!(content, "<gpx><trk/></gpx>");
    }

    #[test]
    fn test_hash_ignores_initial_position() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        cursor.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(hash_reader(&mut cursor).unwrap(), hash_bytes(b"abcdef"));
    }

    #[test]
    fn test_known_digest() {
        // SHA-512 of the empty input
        assert!(hash_bytes(b"").starts_with("cf83e1357eefb8bdf1542850d66d8007"));
    }

    #[test]
    fn test_different_content_differs() {
        assert_ne!(hash_bytes(b"a.gpx"), hash_bytes(b"b.gpx"));
    }

    #[test]
    fn test_verify_checksum() {
        let mut cursor = Cursor::new(b"track".to_vec());
        let expected = hash_bytes(b"track");
        assert!(verify_checksum(&mut cursor, &expected).unwrap());
        assert!(!verify_checksum(&mut cursor, &hash_bytes(b"other")).unwrap());
        assert!(!verify_checksum(&mut cursor, "short").unwrap());
    }
}
