use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    pub version: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(Uuid);

impl ChunkId {
    /// Same source, version and index always produce the same id.
    pub fn derive(source: &str, version: &str, index: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(version.as_bytes());
        hasher.update([0u8]);
        hasher.update(index.to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Chunk {
    pub fn new(text: String, source: String, version: String, index: usize, offset: usize) -> Self {
        Self {
            id: ChunkId::derive(&source, &version, index),
            text,
            source,
            version,
            offset,
        }
    }
}
