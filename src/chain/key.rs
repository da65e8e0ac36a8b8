//! Cache keys for filter chains and bundle builds (blake3).

use crate::filter::FilterId;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim()).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 16 hex chars
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Key over an ordered list of filter identities and their as-output flags.
///
/// Each identity is hashed as length-prefixed JSON, so equal chains give
/// equal keys and no two different chains share an encoding.
pub fn chain_key<'a, I>(entries: I) -> ContentHash
where
    I: IntoIterator<Item = (&'a FilterId, bool)>,
{
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"assetflow-chain\0");
    for (id, as_output) in entries {
        // FilterId holds only strings and Values; serialization cannot fail.
        let json = serde_json::to_vec(id).unwrap_or_default();
        hasher.update(&(json.len() as u64).to_le_bytes());
        hasher.update(&json);
        hasher.update(&[u8::from(as_output)]);
    }
    ContentHash::new(*hasher.finalize().as_bytes())
}

/// Blake3 hash of a file's contents.
pub fn compute_file_hash(path: &Path) -> io::Result<ContentHash> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Key of one bundle build: the chain key plus every source's content.
pub fn build_key<P: AsRef<Path>>(chain: ContentHash, sources: &[P]) -> io::Result<ContentHash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(chain.as_bytes());
    for source in sources {
        hasher.update(compute_file_hash(source.as_ref())?.as_bytes());
    }
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}
