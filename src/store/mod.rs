//! Two-tier cache storage: in-memory entries mirrored into durable blobs.

mod blob;
mod entry;
mod tiered;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, StoreError};
pub use entry::CacheEntry;
pub use tiered::{EntryStore, StoreStats};
