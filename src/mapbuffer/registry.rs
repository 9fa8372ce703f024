//! Buffer registry (`C13`): a process-wide table mapping monotone `u64`
//! ids to `MapBuffer` instances, guarded by its own concurrent map rather
//! than a single coarse mutex (grounded in the lock-free tile cache shape
//! used elsewhere in this codebase's retrieval pack).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::error::{TiffError, TiffResult};
use crate::mapbuffer::frame::Frame;
use crate::mapbuffer::MapBuffer;

/// A registered `MapBuffer`, reference-counted so callers can hold it
/// across calls without re-querying the registry each time.
pub type BufferHandle = Arc<RwLock<MapBuffer>>;

/// Process-wide `u64 -> MapBuffer` table. Keys are monotonically assigned
/// by `initialize` and never reused, even after `remove`.
pub struct BufferRegistry {
    buffers: DashMap<u64, BufferHandle>,
    next_key: AtomicU64,
}

impl BufferRegistry {
    pub fn new() -> Self {
        BufferRegistry {
            buffers: DashMap::new(),
            next_key: AtomicU64::new(1),
        }
    }

    /// The lazily-initialized process-wide default instance.
    pub fn global() -> &'static BufferRegistry {
        static DEFAULT: OnceLock<BufferRegistry> = OnceLock::new();
        DEFAULT.get_or_init(BufferRegistry::new)
    }

    /// Creates a fresh `MapBuffer` and returns its assigned key.
    pub fn initialize(&self, buffer: MapBuffer) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.buffers.insert(key, Arc::new(RwLock::new(buffer)));
        key
    }

    pub fn get(&self, key: u64) -> TiffResult<BufferHandle> {
        self.buffers
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TiffError::InvalidArgument(format!("no MapBuffer registered under key {key}")))
    }

    pub fn add_frame(&self, key: u64, frame: Frame) -> TiffResult<()> {
        self.get(key)?.write().add(frame)
    }

    pub fn clear(&self, key: u64, reset_indexing: bool) -> TiffResult<()> {
        self.get(key)?.write().clear(reset_indexing);
        Ok(())
    }

    pub fn set_capacity(&self, key: u64, capacity: usize) -> TiffResult<()> {
        self.get(key)?.write().set_capacity(capacity);
        Ok(())
    }

    /// Destroys the buffer registered under `key`. A no-op if absent.
    pub fn remove(&self, key: u64) {
        self.buffers.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapbuffer::MapBufferConfig;

    #[test]
    fn keys_are_monotone_and_never_reused() {
        let registry = BufferRegistry::new();
        let a = registry.initialize(MapBuffer::new(MapBufferConfig::default()));
        let b = registry.initialize(MapBuffer::new(MapBufferConfig::default()));
        assert!(b > a);
        registry.remove(a);
        let c = registry.initialize(MapBuffer::new(MapBufferConfig::default()));
        assert!(c > b);
        assert!(registry.get(a).is_err());
    }

    #[test]
    fn add_frame_routes_through_the_registered_handle() {
        let registry = BufferRegistry::new();
        let key = registry.initialize(MapBuffer::new(MapBufferConfig::default()));
        let frame = Frame::new_int32((0, 0), vec![1, 1, 1, 1], 2, 2);
        registry.add_frame(key, frame).unwrap();
        assert_eq!(registry.get(key).unwrap().read().frame_count(), 1);
    }
}
